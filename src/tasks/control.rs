use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{ScreenSignal, ScreenState};

/// Unix-socket control surface.
///
/// Clients write one state name per line ("ON", "OFF", "SCREENSAVER") to
/// request it, and receive every state change back as a line. Request
/// validation stays in the screen controller, so a bogus value gets the
/// same warn-and-ignore treatment wherever it comes from.
pub async fn run(
    path: PathBuf,
    signals: mpsc::Sender<ScreenSignal>,
    state_changes: broadcast::Sender<ScreenState>,
    cancel: CancellationToken,
) -> Result<()> {
    // A stale socket file from a previous run would make bind fail.
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    info!(socket = %path.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        tokio::spawn(handle_client(
                            stream,
                            signals.clone(),
                            state_changes.subscribe(),
                            cancel.clone(),
                        ));
                    }
                    Err(err) => warn!(%err, "control socket accept failed"),
                }
            }
        }
    }

    let _ = std::fs::remove_file(&path);
    info!("control socket closed");
    Ok(())
}

async fn handle_client(
    stream: UnixStream,
    signals: mpsc::Sender<ScreenSignal>,
    mut states: broadcast::Receiver<ScreenState>,
    cancel: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let request = line.trim().to_string();
                        if request.is_empty() {
                            continue;
                        }
                        if signals.send(ScreenSignal::SetState(request)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(%err, "control client read failed");
                        break;
                    }
                }
            }
            state = states.recv() => {
                match state {
                    Ok(state) => {
                        let line = format!("{state}\n");
                        if writer.write_all(line.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    // Missing a few intermediate states is fine; the next
                    // change still reaches the client.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
