use anyhow::Result;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EffectCommands;
use crate::events::EffectCommand;

/// Maps abstract effect commands onto the configured shell commands.
///
/// Dispatch is fire-and-forget: the child process is spawned and forgotten,
/// with its exit status only surfacing in the logs. The commands themselves
/// are expected to be idempotent (powering on an already-on panel is fine).
pub async fn run(
    commands: EffectCommands,
    mut inbox: mpsc::UnboundedReceiver<EffectCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe_command = inbox.recv() => {
                let Some(command) = maybe_command else { break };
                dispatch(&commands, command);
            }
        }
    }

    info!("effect dispatcher stopped");
    Ok(())
}

fn dispatch(commands: &EffectCommands, command: EffectCommand) {
    let Some(shell) = commands.command_for(command) else {
        debug!(?command, "no shell command configured; skipping");
        return;
    };

    debug!(?command, %shell, "dispatching effect");
    let shell = shell.to_string();
    tokio::spawn(async move {
        match Command::new("sh").arg("-c").arg(&shell).status().await {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(%shell, %status, "effect command failed"),
            Err(err) => warn!(%shell, %err, "failed to spawn effect command"),
        }
    });
}
