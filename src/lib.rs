pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::dashboard::{self, DashboardOutcome};
use crate::cli::input;
use crate::cli::login::{self, LoginOutcome};
use crate::core::cache::MarketCache;
use crate::core::config::AppConfig;
use crate::core::market::{MarketDataProvider, MarketQuery};
use crate::core::refresh::RefreshScheduler;
use crate::core::router::{self, Route, Screen};
use crate::core::session::SessionStore;
use crate::providers::{CoinGeckoProvider, HttpCredentialValidator};
use anyhow::Result;
use console::{Key, Term};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

/// How long `dashboard --once` waits for a first usable frame.
const ONCE_TIMEOUT: Duration = Duration::from_secs(30);

pub enum AppCommand {
    Login {
        email: Option<String>,
        password: Option<String>,
    },
    Logout,
    Dashboard {
        once: bool,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("cryptodash starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::new(config);
    match command {
        AppCommand::Login { email, password } => app.login(email, password).await,
        AppCommand::Logout => app.logout(),
        AppCommand::Dashboard { once } => app.dashboard(once).await,
    }
}

struct App {
    config: AppConfig,
    session: SessionStore,
    validator: HttpCredentialValidator,
    market: Arc<CoinGeckoProvider>,
}

impl App {
    fn new(config: AppConfig) -> Self {
        let gecko = config.providers.coingecko.as_ref();
        let base_url = gecko.map_or("https://api.coingecko.com/api/v3", |p| &p.base_url);
        let api_key = gecko.and_then(|p| p.api_key.as_deref());
        let market = Arc::new(CoinGeckoProvider::new(base_url, api_key));

        let auth_base = config
            .providers
            .auth
            .as_ref()
            .map_or("http://localhost:8000/api/v1", |p| &p.base_url);
        let validator = HttpCredentialValidator::new(auth_base);

        let session = SessionStore::new(store::open_default(&config));

        Self {
            config,
            session,
            validator,
            market,
        }
    }

    async fn login(&self, email: Option<String>, password: Option<String>) -> Result<()> {
        match (email, password) {
            (Some(email), Some(password)) => {
                login::login_with_flags(&self.validator, &self.session, &email, &password).await
            }
            _ => {
                let term = Term::stdout();
                let mut keys = input::spawn_key_reader(term.clone());
                match login::login_screen(&term, &mut keys, &self.validator, &self.session).await? {
                    LoginOutcome::Authenticated => {
                        println!(
                            "{}",
                            cli::ui::style_text("Signed in.", cli::ui::StyleType::TotalValue)
                        );
                        Ok(())
                    }
                    LoginOutcome::Aborted => {
                        println!("Login cancelled.");
                        Ok(())
                    }
                }
            }
        }
    }

    fn logout(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            println!("Not signed in.");
            return Ok(());
        }
        self.session.logout()?;
        println!("Signed out.");
        Ok(())
    }

    async fn dashboard(&self, once: bool) -> Result<()> {
        let cache = Arc::new(MarketCache::new(self.config.cache.policy()));
        let provider: Arc<dyn MarketDataProvider> = self.market.clone();
        let scheduler =
            RefreshScheduler::new(Arc::clone(&cache), provider, self.config.refresh.policy());
        let query = self.config.query();
        let term = Term::stdout();

        let result = if once {
            match router::resolve(Route::Dashboard, self.session.is_authenticated()) {
                Screen::Dashboard => {
                    dashboard::dashboard_once(
                        &term,
                        &cache,
                        &scheduler,
                        self.market.as_ref(),
                        query,
                        ONCE_TIMEOUT,
                    )
                    .await
                }
                Screen::SessionEntry => {
                    Err(anyhow::anyhow!("Not signed in. Run `cryptodash login` first."))
                }
            }
        } else {
            let mut keys = input::spawn_key_reader(term.clone());
            self.run_screens(&term, &mut keys, &cache, &scheduler, query)
                .await
        };

        scheduler.stop().await;
        result
    }

    /// Screen loop for the interactive app: the router decides what is on
    /// screen, each screen runs until it hands control back.
    async fn run_screens(
        &self,
        term: &Term,
        keys: &mut UnboundedReceiver<Key>,
        cache: &MarketCache,
        scheduler: &RefreshScheduler,
        query: MarketQuery,
    ) -> Result<()> {
        let mut route = Route::Root;

        loop {
            match router::resolve(route, self.session.is_authenticated()) {
                Screen::SessionEntry => {
                    match login::login_screen(term, keys, &self.validator, &self.session).await? {
                        LoginOutcome::Authenticated => route = Route::Dashboard,
                        LoginOutcome::Aborted => return Ok(()),
                    }
                }
                Screen::Dashboard => {
                    let outcome = dashboard::dashboard_screen(
                        term,
                        keys,
                        cache,
                        scheduler,
                        self.market.as_ref(),
                        query,
                    )
                    .await?;
                    match outcome {
                        DashboardOutcome::LoggedOut => {
                            self.session.logout()?;
                            route = Route::SessionEntry;
                        }
                        DashboardOutcome::Quit => return Ok(()),
                    }
                }
            }
        }
    }
}
