//! Amplifier connection
//!
//! [`AmpConnection`] carries 64-byte packets over a [`Transport`]: a HID
//! device opened with [`open_device`](crate::open_device), or one end of a
//! `tokio::io::duplex` pipe connected to a virtual amplifier.
//!
//! The transport and its framer sit behind one lock. Requests that expect a
//! reply ([`AmpConnection::query_preset`] and friends) hold the lock from
//! the write until the reply is read, so a background watcher sharing the
//! connection cannot swallow the reply.

use std::sync::Arc;
use std::time::Duration;

use outsider_protocol::codec::{PRESET_MAX, PRESET_MIN};
use outsider_protocol::{
    decode_packet, encode_control, encode_control_by_name, preset_name_request,
    preset_settings_request, startup_request, Control, DecodedEvent, Packet, Preset,
    PACKET_LEN,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::TransportError;
use crate::framer::PacketFramer;
use crate::transport::Transport;

/// Default time to wait for a packet before reporting no data
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Bytes read from the transport per call
const READ_CHUNK: usize = PACKET_LEN * 4;

struct Inner<T> {
    transport: T,
    framer: PacketFramer,
}

/// Shared handle to an amplifier
///
/// Cloning is cheap; every clone talks to the same transport.
pub struct AmpConnection<T> {
    inner: Arc<Mutex<Inner<T>>>,
    read_timeout: Duration,
}

impl<T> Clone for AmpConnection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            read_timeout: self.read_timeout,
        }
    }
}

impl<T: Transport> AmpConnection<T> {
    /// Wrap a transport using the default read timeout
    pub fn new(transport: T) -> Self {
        Self::with_read_timeout(transport, DEFAULT_READ_TIMEOUT)
    }

    /// Wrap a transport with a specific read timeout
    pub fn with_read_timeout(transport: T, read_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                transport,
                framer: PacketFramer::new(),
            })),
            read_timeout,
        }
    }

    /// Read timeout used by [`read_packet`](Self::read_packet)
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Write one packet
    ///
    /// A buffer that is not 64 bytes long is logged and sent anyway. A
    /// short write fails with [`TransportError::IncompleteWrite`] and is
    /// not retried.
    pub async fn send_packet(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().await;
        self.write_locked(&mut inner, bytes).await
    }

    /// Set a control
    pub async fn set_control(&self, control: Control, value: i32) -> Result<(), TransportError> {
        let packet = encode_control(control, value)?;
        self.send_packet(&packet).await?;
        debug!("Set control: {} to value {}", control, value);
        Ok(())
    }

    /// Set a control given by name
    pub async fn set_control_by_name(&self, name: &str, value: i32) -> Result<(), TransportError> {
        let packet = encode_control_by_name(name, value)?;
        self.send_packet(&packet).await?;
        debug!("Set control: {} to value {}", name, value);
        Ok(())
    }

    /// Send the startup request
    ///
    /// The three reply packets are left for the reader; drain first so
    /// stale packets are not mistaken for them.
    pub async fn startup(&self) -> Result<(), TransportError> {
        debug!("Sending startup packet");
        self.send_packet(&startup_request()).await?;
        debug!("Startup packet sent");
        Ok(())
    }

    /// Read the next packet
    ///
    /// Returns `Ok(None)` when nothing arrives within the read timeout.
    pub async fn read_packet(&self) -> Result<Option<Packet>, TransportError> {
        let mut inner = self.inner.lock().await;
        self.read_locked(&mut inner).await
    }

    /// Discard packets until the amp goes quiet, returning how many were dropped
    pub async fn drain(&self) -> Result<usize, TransportError> {
        let mut inner = self.inner.lock().await;
        let mut drained = 0;
        while let Some(packet) = self.read_locked(&mut inner).await? {
            debug!("Drained packet\n{}", packet.hex_dump());
            drained += 1;
        }
        inner.framer.clear();
        Ok(drained)
    }

    /// Ask for the name stored in a preset slot
    pub async fn query_preset_name(&self, preset: i32) -> Result<String, TransportError> {
        let request = preset_name_request(preset)?;
        let mut inner = self.inner.lock().await;
        self.write_locked(&mut inner, &request).await?;

        while let Some(packet) = self.read_locked(&mut inner).await? {
            match decode_packet(&packet) {
                Ok(DecodedEvent::PresetName { number, name }) if i32::from(number) == preset => {
                    return Ok(name);
                }
                Ok(other) => debug!("Skipping {:?} while waiting for preset name", other),
                Err(e) => warn!("Skipping malformed packet: {}", e),
            }
        }
        Err(TransportError::NoReply("preset name"))
    }

    /// Ask for the names of every preset slot
    pub async fn query_preset_names(&self) -> Result<Vec<(u8, String)>, TransportError> {
        let mut names = Vec::with_capacity(usize::from(PRESET_MAX));
        for number in PRESET_MIN..=PRESET_MAX {
            let name = self.query_preset_name(i32::from(number)).await?;
            names.push((number, name));
        }
        Ok(names)
    }

    /// Ask for the full contents of a preset slot
    pub async fn query_preset(&self, preset: i32) -> Result<Preset, TransportError> {
        let request = preset_settings_request(preset)?;
        let mut inner = self.inner.lock().await;
        self.write_locked(&mut inner, &request).await?;

        while let Some(packet) = self.read_locked(&mut inner).await? {
            match decode_packet(&packet) {
                Ok(DecodedEvent::PresetSettings(settings))
                    if i32::from(settings.number) == preset =>
                {
                    debug!("Preset settings for preset {}\n{}", preset, packet.hex_dump());
                    return Ok(*settings);
                }
                Ok(other) => debug!("Skipping {:?} while waiting for preset settings", other),
                Err(e) => warn!("Skipping malformed packet: {}", e),
            }
        }
        Err(TransportError::NoReply("preset settings"))
    }

    async fn write_locked(&self, inner: &mut Inner<T>, bytes: &[u8]) -> Result<(), TransportError> {
        if bytes.len() != PACKET_LEN {
            warn!("bytes length is {} which is not {}", bytes.len(), PACKET_LEN);
        }

        let written = inner.transport.write_report(bytes).await?;
        if written != bytes.len() {
            error!("Wrote {} of {} bytes to amplifier", written, bytes.len());
            return Err(TransportError::IncompleteWrite {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }

    async fn read_locked(&self, inner: &mut Inner<T>) -> Result<Option<Packet>, TransportError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(packet) = inner.framer.next_packet() {
                return Ok(Some(packet));
            }
            match inner.transport.read_chunk(&mut buf, deadline).await {
                Ok(None) => return Ok(None),
                Ok(Some(0)) => return Err(TransportError::Closed),
                Ok(Some(n)) => inner.framer.push_bytes(&buf[..n]),
                Err(e) => {
                    error!("Read error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn pair() -> (AmpConnection<DuplexStream>, DuplexStream) {
        let (ours, theirs) = duplex(1024);
        (AmpConnection::new(ours), theirs)
    }

    #[tokio::test]
    async fn test_set_control_writes_packet() {
        let (conn, mut amp) = pair();
        conn.set_control(Control::Gain, 0x40).await.unwrap();

        let mut buf = [0u8; PACKET_LEN];
        amp.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..5], &[0x03, 0x02, 0x00, 0x01, 0x40]);
    }

    #[tokio::test]
    async fn test_invalid_control_sends_nothing() {
        let (conn, mut amp) = pair();
        let err = conn.set_control(Control::Gain, 500).await.unwrap_err();
        assert!(matches!(err, TransportError::Validation(_)));

        drop(conn);
        let mut rest = Vec::new();
        amp.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_read_timeout_is_none() {
        let (conn, _amp) = pair();
        assert!(conn.read_packet().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_split_packet() {
        let (conn, mut amp) = pair();
        let packet = Packet::with_header(&[0x09, 0x06, 0x32]);
        amp.write_all(&packet[..20]).await.unwrap();
        amp.write_all(&packet[20..]).await.unwrap();
        assert_eq!(conn.read_packet().await.unwrap(), Some(packet));
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (conn, amp) = pair();
        drop(amp);
        assert!(matches!(
            conn.read_packet().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_incomplete_write() {
        // A pipe with room for less than one packet accepts a partial write
        let (ours, _theirs) = duplex(16);
        let conn = AmpConnection::new(ours);
        let err = conn.startup().await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::IncompleteWrite {
                written: 16,
                expected: 64
            }
        ));
    }

    #[tokio::test]
    async fn test_drain_counts_packets() {
        let (conn, mut amp) = pair();
        for i in 0..3u8 {
            amp.write_all(&Packet::with_header(&[0x09, i])).await.unwrap();
        }
        assert_eq!(conn.drain().await.unwrap(), 3);
        assert!(conn.read_packet().await.unwrap().is_none());
    }
}
