//! One established TCP session.
//!
//! Each session is split into a reader task and a writer task.  The reader
//! turns every successful read into a [`PeerEvent::DataReceived`] and reports
//! [`PeerEvent::PeerClosed`] once on EOF or error.  The writer drains a
//! bounded queue of outgoing buffers so a slow peer never blocks the service.
//!
//! There is no framing: one read is one message.  Two quick writes may arrive
//! as one buffer, and a long line may be split across reads.

use lanlink_core::{SessionId, SessionInfo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::NetworkError;
use crate::application::events::PeerEvent;

const READ_BUFFER_SIZE: usize = 4096;
const OUTBOUND_QUEUE: usize = 64;

/// Owner handle of a running session.  Dropping it closes the socket.
#[derive(Debug)]
pub struct SessionHandle {
    info: SessionInfo,
    outbound: mpsc::Sender<Vec<u8>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl SessionHandle {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Queues `bytes` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SessionClosed`] when the writer has stopped,
    /// and [`NetworkError::SessionBusy`] when its queue is full.  Only the
    /// first means the session is gone.
    pub fn send(&self, bytes: &[u8]) -> Result<(), NetworkError> {
        self.outbound
            .try_send(bytes.to_vec())
            .map_err(|e| match e {
                TrySendError::Full(_) => NetworkError::SessionBusy(self.info.id),
                TrySendError::Closed(_) => NetworkError::SessionClosed(self.info.id),
            })
    }

    #[cfg(test)]
    pub(crate) fn abort_writer(&self) {
        self.writer.abort();
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Splits `stream` and starts the reader and writer tasks.
pub fn spawn_session(
    stream: TcpStream,
    info: SessionInfo,
    events: mpsc::Sender<PeerEvent>,
) -> SessionHandle {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("session {}: TCP_NODELAY not set: {e}", info.id);
    }
    let (read_half, write_half) = stream.into_split();
    let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE);

    let reader = tokio::spawn(read_loop(read_half, info.id, events));
    let writer = tokio::spawn(write_loop(write_half, info.id, queue));

    SessionHandle {
        info,
        outbound,
        reader,
        writer,
    }
}

async fn read_loop(mut half: OwnedReadHalf, session: SessionId, events: mpsc::Sender<PeerEvent>) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match half.read(&mut buf).await {
            Ok(0) => {
                debug!("session {session}: peer closed");
                break;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]).into_owned();
                if events
                    .send(PeerEvent::DataReceived { session, text })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                warn!("session {session}: read failed: {e}");
                break;
            }
        }
    }
    let _ = events.send(PeerEvent::PeerClosed { session }).await;
}

async fn write_loop(mut half: OwnedWriteHalf, session: SessionId, mut queue: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = queue.recv().await {
        if let Err(e) = half.write_all(&bytes).await {
            warn!("session {session}: write failed: {e}");
            break;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
