//! Line-oriented control socket so another invocation can reach a running
//! host (`popup-overlay stop`).

use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use futures::channel::mpsc;

use crate::control::ControlCommand;

/// How long a connection may take to send its command line.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound socket; the file is removed again on drop.
pub struct ControlListener {
    path: PathBuf,
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Binds `path` and forwards every recognised line to the returned stream.
/// Each connection gets `ok` or `error: ...` back.
pub fn listen(
    path: &Path,
) -> io::Result<(ControlListener, mpsc::UnboundedReceiver<ControlCommand>)> {
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)?;
    tracing::info!(?path, "control socket listening");
    let (tx, rx) = mpsc::unbounded();
    thread::Builder::new()
        .name("overlay-ipc".into())
        .spawn(move || {
            for stream in listener.incoming().flatten() {
                let reply = match read_command(&stream) {
                    Ok(command) => {
                        if tx.unbounded_send(command).is_err() {
                            break;
                        }
                        "ok".to_string()
                    }
                    Err(err) => {
                        tracing::warn!("control socket: {err}");
                        format!("error: {err}")
                    }
                };
                let _ = writeln!(&stream, "{reply}");
            }
        })?;
    Ok((
        ControlListener {
            path: path.to_path_buf(),
        },
        rx,
    ))
}

fn read_command(stream: &UnixStream) -> Result<ControlCommand, String> {
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .map_err(|err| err.to_string())?;
    let mut line = String::new();
    BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|err| err.to_string())?;
    line.parse()
}

/// Sends one command and returns the host's reply line.
pub fn send(path: &Path, command: ControlCommand) -> io::Result<String> {
    let mut stream = UnixStream::connect(path)?;
    writeln!(stream, "{command}")?;
    let mut reply = String::new();
    BufReader::new(&stream).read_line(&mut reply)?;
    Ok(reply.trim().to_string())
}
