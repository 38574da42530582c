use crate::cli::ui::{self, StyleType};
use crate::core::cache::{EntrySnapshot, FetchStatus, MarketCache};
use crate::core::format;
use crate::core::market::{Instrument, MarketQuery};
use crate::core::overview::{MarketOverview, OverviewProvider};
use crate::core::refresh::RefreshScheduler;
use anyhow::{Result, bail};
use chrono::Local;
use comfy_table::{Cell, Table};
use console::{Key, Term};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

pub enum DashboardOutcome {
    LoggedOut,
    Quit,
}

/// Interactive market dashboard. Repaints on every cache revision and
/// handles the keymap until the user quits or logs out.
pub async fn dashboard_screen(
    term: &Term,
    keys: &mut UnboundedReceiver<Key>,
    cache: &MarketCache,
    scheduler: &RefreshScheduler,
    overview_provider: &dyn OverviewProvider,
    query: MarketQuery,
) -> Result<DashboardOutcome> {
    let mut revision = cache.changes();
    let (mut snapshot, mut overview) = futures::future::join(
        scheduler.mount(query),
        fetch_overview(overview_provider),
    )
    .await;
    let mut selected: Option<usize> = None;

    render(term, &snapshot, overview.as_ref(), selected)?;

    let outcome = loop {
        tokio::select! {
            changed = revision.changed() => {
                if changed.is_err() {
                    break DashboardOutcome::Quit;
                }
                if let Some(fresh) = cache.peek(query).await {
                    snapshot = fresh;
                }
                render(term, &snapshot, overview.as_ref(), selected)?;
            }
            key = keys.recv() => {
                let Some(key) = key else {
                    break DashboardOutcome::Quit;
                };
                match key {
                    Key::Char('q') => break DashboardOutcome::Quit,
                    Key::Char('l') => break DashboardOutcome::LoggedOut,
                    Key::Escape => {
                        if selected.is_none() {
                            break DashboardOutcome::Quit;
                        }
                        selected = None;
                        render(term, &snapshot, overview.as_ref(), selected)?;
                    }
                    Key::Char('r') => {
                        scheduler.refresh_now(query);
                        overview = fetch_overview(overview_provider).await;
                        render(term, &snapshot, overview.as_ref(), selected)?;
                    }
                    Key::Char(c) if c.is_ascii_digit() => {
                        let rows = snapshot.data.as_deref().map(|d| d.len()).unwrap_or(0);
                        let digit = (c as u8 - b'0') as usize;
                        selected = match digit {
                            0 => None,
                            n if n <= rows => Some(n - 1),
                            _ => selected,
                        };
                        render(term, &snapshot, overview.as_ref(), selected)?;
                    }
                    _ => {}
                }
            }
        }
    };

    scheduler.unmount(query).await;
    Ok(outcome)
}

/// Waits for a usable frame, paints it once, and returns. Errors when no
/// data arrived before the timeout.
pub async fn dashboard_once(
    term: &Term,
    cache: &MarketCache,
    scheduler: &RefreshScheduler,
    overview_provider: &dyn OverviewProvider,
    query: MarketQuery,
    timeout: Duration,
) -> Result<()> {
    let mut revision = cache.changes();
    let spinner = ui::new_spinner("Fetching market data...");
    let (mut snapshot, overview) = futures::future::join(
        scheduler.mount(query),
        fetch_overview(overview_provider),
    )
    .await;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    while snapshot.status == FetchStatus::Loading
        || (snapshot.data.is_none() && snapshot.status != FetchStatus::Error)
    {
        tokio::select! {
            _ = &mut deadline => break,
            changed = revision.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(fresh) = cache.peek(query).await {
                    snapshot = fresh;
                }
            }
        }
    }
    spinner.finish_and_clear();

    render(term, &snapshot, overview.as_ref(), None)?;
    scheduler.unmount(query).await;

    if snapshot.data.is_none() {
        let reason = snapshot
            .last_error
            .unwrap_or_else(|| "timed out waiting for data".to_string());
        bail!("Could not fetch market data: {reason}");
    }
    Ok(())
}

async fn fetch_overview(provider: &dyn OverviewProvider) -> Option<MarketOverview> {
    match provider.fetch_overview().await {
        Ok(overview) => Some(overview),
        Err(e) => {
            warn!("Market overview unavailable: {e}");
            None
        }
    }
}

fn render(
    term: &Term,
    snapshot: &EntrySnapshot,
    overview: Option<&MarketOverview>,
    selected: Option<usize>,
) -> Result<()> {
    term.clear_screen()?;
    term.write_line(&ui::style_text("cryptodash", StyleType::Title))?;
    for line in banner_lines(overview) {
        term.write_line(&line)?;
    }
    term.write_line("")?;

    match snapshot.data.as_deref() {
        Some(instruments) if !instruments.is_empty() => {
            term.write_line(&instrument_table(instruments, selected).to_string())?;
            if let Some(index) = selected.filter(|i| *i < instruments.len()) {
                term.write_line("")?;
                for line in detail_lines(&instruments[index]) {
                    term.write_line(&line)?;
                }
            }
        }
        _ => {
            term.write_line(&ui::style_text(
                "Waiting for market data...",
                StyleType::Subtle,
            ))?;
        }
    }

    term.write_line("")?;
    term.write_line(&status_line(snapshot))?;
    term.write_line(&ui::style_text(
        "r refresh  1-9 details  0/Esc back  l logout  q quit",
        StyleType::Subtle,
    ))?;
    Ok(())
}

fn format_or_na(formatted: Result<String, format::FormatError>) -> String {
    formatted.unwrap_or_else(|_| "N/A".to_string())
}

fn banner_lines(overview: Option<&MarketOverview>) -> Vec<String> {
    let Some(overview) = overview else {
        return vec![ui::style_text(
            "Market overview unavailable",
            StyleType::Subtle,
        )];
    };

    vec![
        format!(
            "{} {}   {} {}",
            ui::style_text("Total market cap:", StyleType::TotalLabel),
            ui::style_text(
                &format_or_na(format::format_large_number(overview.total_market_cap)),
                StyleType::TotalValue,
            ),
            ui::style_text("24h volume:", StyleType::TotalLabel),
            format_or_na(format::format_large_number(overview.total_volume_24h)),
        ),
        format!(
            "{} {:.1}%   {} {:.0}/100",
            ui::style_text("BTC dominance:", StyleType::TotalLabel),
            overview.btc_dominance_pct,
            ui::style_text("Alt season index:", StyleType::TotalLabel),
            overview.alt_season_index(),
        ),
    ]
}

fn instrument_table(instruments: &[Instrument], selected: Option<usize>) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("24h"),
        ui::header_cell("Volume"),
        ui::header_cell("Market Cap"),
    ]);

    for (index, instrument) in instruments.iter().enumerate() {
        let marker = if selected == Some(index) {
            format!("{} *", index + 1)
        } else {
            format!("{}", index + 1)
        };
        table.add_row(vec![
            Cell::new(marker),
            Cell::new(&instrument.symbol),
            Cell::new(&instrument.name),
            ui::money_cell(instrument.price),
            ui::change_cell(instrument.change_24h),
            ui::large_money_cell(instrument.volume),
            ui::large_money_cell(instrument.market_cap),
        ]);
    }

    table
}

fn detail_lines(instrument: &Instrument) -> Vec<String> {
    let change = instrument
        .change_24h
        .map(|c| format!("{c:+.2}%"))
        .unwrap_or_else(|| "N/A".to_string());

    vec![
        ui::style_text(
            &format!("{} ({})", instrument.name, instrument.symbol),
            StyleType::TotalLabel,
        ),
        format!(
            "  Price:      {}",
            format_or_na(format::format_currency(instrument.price))
        ),
        format!("  24h change: {change}"),
        format!(
            "  Volume:     {}",
            format_or_na(format::format_large_number(instrument.volume))
        ),
        format!(
            "  Market cap: {}",
            format_or_na(format::format_large_number(instrument.market_cap))
        ),
    ]
}

fn status_line(snapshot: &EntrySnapshot) -> String {
    let updated = match (snapshot.fetched_at, snapshot.age) {
        (Some(at), Some(age)) => format!(
            "Updated {} ({}s ago)",
            at.with_timezone(&Local).format("%H:%M:%S"),
            age.as_secs()
        ),
        _ => "No data yet".to_string(),
    };

    match snapshot.status {
        FetchStatus::Loading => {
            format!(
                "{updated}  {}",
                ui::style_text("Refreshing...", StyleType::Subtle)
            )
        }
        FetchStatus::Error => {
            let error = snapshot.last_error.as_deref().unwrap_or("unknown error");
            let suffix = if snapshot.data.is_some() {
                ", showing cached data"
            } else {
                ""
            };
            format!(
                "{updated}  {}",
                ui::style_text(
                    &format!(
                        "Refresh failed after {} attempts: {error}{suffix}",
                        snapshot.retry_count
                    ),
                    StyleType::Error,
                )
            )
        }
        _ => updated,
    }
}
