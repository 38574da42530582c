use anyhow::Result;
use console::{Key, Term};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;

/// Spawns a blocking reader thread that forwards terminal keys into a
/// channel the async screens can `select!` over. The thread exits once the
/// receiver is dropped and one more key arrives.
pub fn spawn_key_reader(term: Term) -> UnboundedReceiver<Key> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        loop {
            match term.read_key() {
                Ok(key) => {
                    if tx.send(key).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Key reader stopped: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Collects one line from the key stream, echoing `*` per character when
/// masked. `Ok(None)` means the user pressed Escape or the stream closed.
pub async fn read_line(
    term: &Term,
    keys: &mut UnboundedReceiver<Key>,
    masked: bool,
) -> Result<Option<String>> {
    let mut buffer = String::new();

    while let Some(key) = keys.recv().await {
        match key {
            Key::Enter => {
                term.write_line("")?;
                return Ok(Some(buffer));
            }
            Key::Escape => {
                term.write_line("")?;
                return Ok(None);
            }
            Key::Backspace => {
                if buffer.pop().is_some() {
                    term.clear_chars(1)?;
                }
            }
            Key::Char(c) if !c.is_control() => {
                buffer.push(c);
                let echo = if masked { '*' } else { c };
                term.write_str(&echo.to_string())?;
            }
            _ => {}
        }
    }

    Ok(None)
}
