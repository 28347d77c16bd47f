//! The control surface transport: two Unix domain sockets, `cmd`
//! (push/pull) and `status` (pub/sub), fed from the engine's shared state.
//!
//! Uses a `tokio::sync::broadcast` fan-out for the status side, generalized
//! from HTTP/SSE framing to newline-delimited `"K:V"` frames.

use super::protocol::{Frame, Key};
use crate::engine::SharedState;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// How often the publish loop wakes to compare last-published values
/// against current ones.
const PUBLISH_INTERVAL: Duration = Duration::from_millis(50);

/// Buffer fill change that crosses this many percentage points triggers a
/// publish.
const BUFFER_PCT_THRESHOLD: i64 = 1;

/// Current-delay change that crosses this many ms triggers a publish.
const CURRENT_DELAY_MS_THRESHOLD: i64 = 11;

pub struct ControlSurface {
    shared: Arc<SharedState>,
    status_tx: broadcast::Sender<String>,
}

impl ControlSurface {
    pub fn new(shared: Arc<SharedState>) -> Arc<Self> {
        let (status_tx, _) = broadcast::channel(64);
        Arc::new(ControlSurface { shared, status_tx })
    }

    /// Binds both sockets and runs the command listener, status listener,
    /// and publish loop concurrently. Returns only on a bind failure; the
    /// three inner tasks otherwise run until the caller aborts them (the
    /// main thread's job once it observes `STOP`, see `main.rs`).
    pub async fn run(
        self: Arc<Self>,
        cmd_path: PathBuf,
        status_path: PathBuf,
    ) -> Result<(), ConfigError> {
        let cmd_listener = bind_unix(&cmd_path, "cmd")?;
        let status_listener = bind_unix(&status_path, "status")?;

        let cmd = self.clone().run_cmd_listener(cmd_listener);
        let status = self.clone().run_status_listener(status_listener);
        let publisher = self.run_publisher();

        tokio::join!(cmd, status, publisher);
        Ok(())
    }

    async fn run_cmd_listener(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let this = self.clone();
                    tokio::spawn(async move { this.handle_cmd_connection(stream).await });
                }
                Err(e) => warn!(error = %e, "cmd socket accept failed"),
            }
        }
    }

    async fn handle_cmd_connection(&self, stream: UnixStream) {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return, // peer closed
                Err(e) => {
                    warn!(error = %e, "cmd connection read error");
                    return;
                }
            };
            if let Some(response) = self.handle_frame(&line) {
                if write_half.write_all(format!("{response}\n").as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Parses and applies one command frame, returning an encoded response
    /// frame when the command is a query. Set commands and protocol errors
    /// produce no response — logged and ignored.
    fn handle_frame(&self, line: &str) -> Option<String> {
        let frame = match Frame::parse(line.trim_end()) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, frame = %line, "malformed control frame, ignoring");
                return None;
            }
        };
        match (frame.key, frame.value) {
            (Key::Delay, Some(ms)) => {
                if !self.shared.set_delay_ms(ms) {
                    warn!(ms, "set-delay out of range, ignoring");
                }
                None
            }
            (Key::Delay, None) => Some(Frame::with_value(Key::Delay, self.shared.get_delay_setting_ms()).encode()),
            (Key::Buffer, None) => Some(Frame::with_value(Key::Buffer, self.shared.get_buffer_percent()).encode()),
            (Key::Current, None) => {
                Some(Frame::with_value(Key::Current, self.shared.get_current_delay_ms()).encode())
            }
            // B and C carry no client-settable value, only queries. Treat a
            // stray value as malformed.
            (Key::Buffer, Some(_)) | (Key::Current, Some(_)) => {
                warn!(frame = %line, "query key carries a value, ignoring");
                None
            }
        }
    }

    async fn run_status_listener(self: Arc<Self>, listener: UnixListener) {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let tx = self.status_tx.clone();
                    let rx = tx.subscribe();
                    tokio::spawn(feed_status_subscriber(stream, tx, rx));
                }
                Err(e) => warn!(error = %e, "status socket accept failed"),
            }
        }
    }

    async fn run_publisher(&self) {
        let mut last_delay_ms: Option<i64> = None;
        let mut last_buffer_pct: Option<i64> = None;
        let mut last_current_ms: Option<i64> = None;
        loop {
            tokio::time::sleep(PUBLISH_INTERVAL).await;

            let delay_ms = self.shared.get_delay_setting_ms();
            let buffer_pct = self.shared.get_buffer_percent();
            let current_ms = self.shared.get_current_delay_ms();

            if last_delay_ms != Some(delay_ms) {
                self.publish(Frame::with_value(Key::Delay, delay_ms));
                last_delay_ms = Some(delay_ms);
            }
            if last_buffer_pct.map_or(true, |last| (buffer_pct - last).abs() > BUFFER_PCT_THRESHOLD) {
                self.publish(Frame::with_value(Key::Buffer, buffer_pct));
                last_buffer_pct = Some(buffer_pct);
            }
            if last_current_ms.map_or(true, |last| (current_ms - last).abs() > CURRENT_DELAY_MS_THRESHOLD) {
                self.publish(Frame::with_value(Key::Current, current_ms));
                last_current_ms = Some(current_ms);
            }
        }
    }

    fn publish(&self, frame: Frame) {
        // A send failure just means no subscribers are connected right
        // now, which is expected, not an error.
        let _ = self.status_tx.send(frame.encode());
        debug!(frame = %frame.encode(), "published status frame");
    }
}

async fn feed_status_subscriber(
    stream: UnixStream,
    tx: broadcast::Sender<String>,
    mut rx: broadcast::Receiver<String>,
) {
    let (_, mut write_half) = stream.into_split();
    loop {
        match rx.recv().await {
            Ok(frame) => {
                if write_half.write_all(format!("{frame}\n").as_bytes()).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // A lagged receiver has already missed frames permanently; a
                // fresh subscription (dropping the stale backlog rather than
                // replaying it) is the only way to resume cleanly.
                warn!(skipped = n, "status subscriber lagged, resubscribing");
                rx = tx.subscribe();
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn bind_unix(path: &Path, role: &'static str) -> Result<UnixListener, ConfigError> {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    UnixListener::bind(path).map_err(|source| ConfigError::ControlBusBind {
        path: path.to_path_buf(),
        source,
    })
    .map_err(|e| {
        warn!(%role, "failed to bind control-bus socket");
        e
    })
}
