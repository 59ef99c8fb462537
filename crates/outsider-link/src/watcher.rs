//! Background watcher task
//!
//! Reads packets from an [`AmpConnection`], decodes them, runs them through a
//! [`Reassembler`] and publishes complete [`AmpUpdate`]s on a channel.
//!
//! The task owns the only reassembler for its connection. Each iteration
//! waits for one read attempt to resolve (packet or timeout) and only then
//! checks for a shutdown request, so a packet already read is never lost.

use outsider_protocol::{decode_packet, AmpUpdate, Reassembler};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::connection::AmpConnection;
use crate::error::TransportError;
use crate::transport::Transport;

/// Commands that can be sent to the watcher task
#[derive(Debug, Clone)]
pub enum WatcherCommand {
    /// Stop after the current read attempt
    Shutdown,
}

/// Why the watcher stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherExit {
    /// Shutdown was requested or the command channel closed
    Shutdown,
    /// Nobody is listening for updates any more
    ReceiverDropped,
    /// The amplifier stream ended
    StreamClosed,
}

/// Run the watcher until shutdown, stream end or receiver drop
///
/// Malformed packets are logged and skipped. Read timeouts are routine.
/// Any other transport error ends the task.
pub async fn run_watcher<T>(
    connection: AmpConnection<T>,
    mut cmd_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: mpsc::Sender<AmpUpdate>,
) -> Result<WatcherExit, TransportError>
where
    T: Transport,
{
    let mut reassembler = Reassembler::new();
    info!("Watcher task starting");

    let result = loop {
        match cmd_rx.try_recv() {
            Ok(WatcherCommand::Shutdown) => {
                info!("Shutdown requested for watcher");
                break Ok(WatcherExit::Shutdown);
            }
            Err(mpsc::error::TryRecvError::Disconnected) => {
                debug!("Command channel closed for watcher");
                break Ok(WatcherExit::Shutdown);
            }
            Err(mpsc::error::TryRecvError::Empty) => {}
        }

        let packet = match connection.read_packet().await {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(TransportError::Closed) => {
                info!("Amplifier stream closed");
                break Ok(WatcherExit::StreamClosed);
            }
            Err(e) => {
                error!("Watcher read failed: {}", e);
                break Err(e);
            }
        };

        let event = match decode_packet(&packet) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed packet: {}", e);
                continue;
            }
        };

        if let Some(update) = reassembler.feed(event) {
            debug!("Amp update: {:?}", update);
            if update_tx.send(update).await.is_err() {
                debug!("Update receiver dropped");
                break Ok(WatcherExit::ReceiverDropped);
            }
        }
    };

    reassembler.reset();
    info!("Watcher task ended");
    result
}
