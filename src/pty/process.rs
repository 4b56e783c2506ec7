//! PTY Process Spawning
//!
//! Runs one shell script in a fresh pseudoterminal using portable-pty and
//! bridges the blocking master reads to async code through a channel.

use portable_pty::{native_pty_system, Child, CommandBuilder, PtySize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, warn};

use crate::config::PtyConfig;
use crate::error::{Error, Result};

/// Shell variable holding the command's exit status inside the wrapper script
const STATUS_VAR: &str = "__termpool_status";

/// Wrap `command` so the shell records its final directory in `cwd_file`
pub fn wrap_command(command: &str, cwd_file: &Path) -> String {
    format!(
        "{command}\n{var}=$?\npwd > {file}\nexit ${var}\n",
        command = command,
        var = STATUS_VAR,
        file = shell_quote(&cwd_file.to_string_lossy()),
    )
}

/// Single-quote `text` for a POSIX shell
pub fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Per-run file the wrapper script writes its final directory to
pub fn cwd_file_path() -> PathBuf {
    std::env::temp_dir().join(format!("termpool-{}.cwd", uuid::Uuid::new_v4()))
}

/// Spawn `command` through the configured shell in `cwd`
///
/// Output bytes arrive on the returned channel. The channel closes after
/// the shell exited and `tracked_cwd` was updated from the directory the
/// command finished in.
pub fn spawn_command(
    command: &str,
    cwd: &Path,
    config: &PtyConfig,
    tracked_cwd: Arc<Mutex<PathBuf>>,
) -> Result<UnboundedReceiver<Vec<u8>>> {
    if !cwd.is_dir() {
        return Err(Error::CommandSpawnFailed {
            command: command.to_string(),
            reason: format!("working directory {} does not exist", cwd.display()),
        });
    }

    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::PtyCreationFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    let cwd_file = cwd_file_path();
    let mut cmd_builder = CommandBuilder::new(config.shell_path());
    cmd_builder.arg("-c");
    cmd_builder.arg(wrap_command(command, &cwd_file));
    cmd_builder.cwd(cwd);
    for (key, value) in &config.environment {
        cmd_builder.env(key, value);
    }

    let child = pair
        .slave
        .spawn_command(cmd_builder)
        .map_err(|e| Error::CommandSpawnFailed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
    // Only the child may hold the slave side, otherwise reads never see EOF
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::PtyReaderCloneFailed {
            reason: e.to_string(),
        })?;

    let (output_tx, output_rx) = unbounded_channel::<Vec<u8>>();
    let master = pair.master;
    let command = command.to_string();

    thread::spawn(move || {
        read_until_exit(reader, |bytes| output_tx.send(bytes).is_ok());
        finish_child(&command, child, &cwd_file, &tracked_cwd);
        drop(master);
        // output_tx drops here, ending the stream after the cwd update
    });

    Ok(output_rx)
}

/// Blocking read loop; `forward` returns false once nobody listens
fn read_until_exit(mut reader: Box<dyn Read + Send>, mut forward: impl FnMut(Vec<u8>) -> bool) {
    let mut buf = [0u8; 4096];
    let mut consecutive_errors = 0;
    const MAX_CONSECUTIVE_ERRORS: u32 = 5;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                debug!("PTY read EOF - process terminated");
                break;
            }
            Ok(n) => {
                consecutive_errors = 0;
                if !forward(buf[..n].to_vec()) {
                    debug!("PTY read: receiver dropped, stopping reader thread");
                    break;
                }
            }
            Err(e) => {
                if e.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }

                if e.kind() == std::io::ErrorKind::WouldBlock {
                    thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }

                // Linux reports a closed slave side as EIO rather than EOF
                if cfg!(unix) && e.raw_os_error() == Some(5) {
                    debug!("PTY slave closed");
                    break;
                }

                consecutive_errors += 1;
                warn!(
                    "PTY read error ({}): {} (attempt {}/{})",
                    e.kind(),
                    e,
                    consecutive_errors,
                    MAX_CONSECUTIVE_ERRORS
                );

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    error!("PTY read: too many consecutive errors, stopping reader thread");
                    break;
                }

                thread::sleep(std::time::Duration::from_millis(50));
            }
        }
    }
}

/// Reap the shell and pick up the directory it ended in
fn finish_child(
    command: &str,
    mut child: Box<dyn Child + Send + Sync>,
    cwd_file: &Path,
    tracked_cwd: &Mutex<PathBuf>,
) {
    match child.wait() {
        Ok(status) => debug!("'{}' exited with code {}", command, status.exit_code()),
        Err(e) => warn!("Failed to wait for '{}': {}", command, e),
    }

    match fs::read_to_string(cwd_file) {
        Ok(contents) => {
            let dir = contents.trim_end_matches(['\r', '\n']);
            if !dir.is_empty() {
                let mut cwd = tracked_cwd.lock().unwrap_or_else(|e| e.into_inner());
                *cwd = PathBuf::from(dir);
            }
            let _ = fs::remove_file(cwd_file);
        }
        Err(e) => debug!("No directory recorded for '{}': {}", command, e),
    }
}
