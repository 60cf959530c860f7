//! Collects a child's stdout/stderr while it runs.
//!
//! Output is appended to shared buffers as it arrives, so a child killed on
//! timeout still yields whatever it printed before.

use log::debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::RunOutput;

type SharedBuf = Arc<Mutex<Vec<u8>>>;

pub(super) struct Capture {
    stdout: SharedBuf,
    stderr: SharedBuf,
    pumps: Vec<JoinHandle<()>>,
}

impl Capture {
    /// Takes the child's piped stdout/stderr and starts draining them.
    pub(super) fn start(child: &mut Child) -> Self {
        let stdout = SharedBuf::default();
        let stderr = SharedBuf::default();
        let mut pumps = Vec::with_capacity(2);

        if let Some(out) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(out, Arc::clone(&stdout))));
        }
        if let Some(err) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(err, Arc::clone(&stderr))));
        }

        Self {
            stdout,
            stderr,
            pumps,
        }
    }

    /// Waits for both streams to close. With a `grace` period, pumps still
    /// running once it has passed (e.g. a grandchild holds the pipe) are abandoned.
    pub(super) async fn finish(self, grace: Option<Duration>) -> RunOutput {
        let deadline = grace.map(|grace| Instant::now() + grace);
        for mut pump in self.pumps {
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, &mut pump).await.is_err() {
                        debug!("Output stream still open after {:?}, abandoning", grace);
                        pump.abort();
                    }
                }
                None => {
                    let _ = pump.await;
                }
            }
        }

        RunOutput {
            stdout: decode(&self.stdout),
            stderr: decode(&self.stderr),
        }
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: SharedBuf) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) => {
                debug!("Error reading child output: {}", e);
                break;
            }
        }
    }
}

fn decode(buf: &SharedBuf) -> String {
    match buf.lock() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pump_collects_everything() {
        let sink = SharedBuf::default();
        pump(&b"hello world"[..], Arc::clone(&sink)).await;
        assert_eq!(decode(&sink), "hello world");
    }

    #[test]
    fn test_decode_is_lossy() {
        let sink: SharedBuf = Arc::new(Mutex::new(vec![b'o', b'k', 0xff]));
        assert_eq!(decode(&sink), "ok\u{fffd}");
    }
}
