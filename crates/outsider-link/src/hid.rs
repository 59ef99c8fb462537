//! USB HID access through hidapi
//!
//! hidapi calls block, so every read and write runs on the blocking pool.
//! A read is bounded by the connection's read timeout inside hidapi itself,
//! which means a timed out read really has ended before the next write.
//! If the future waiting on a read is dropped, the read keeps its place and
//! the next call collects its result, so an inbound report is never lost.

use std::ffi::CString;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hidapi::{HidApi, HidDevice, HidError};
use outsider_protocol::PACKET_LEN;
use tokio::task::{spawn_blocking, JoinHandle};
use tokio::time::Instant;
use tracing::{error, info};

use crate::connection::AmpConnection;
use crate::error::TransportError;
use crate::transport::Transport;
use crate::{USB_PRODUCT_ID, USB_VENDOR_ID};

/// Blocking report I/O, as offered by [`HidDevice`]
pub trait ReportDevice: Send + 'static {
    /// Read one input report, returning 0 when the timeout expires
    fn read_input(&self, buf: &mut [u8], timeout_ms: i32) -> io::Result<usize>;

    /// Write one output report; `data[0]` is the report number
    fn write_output(&self, data: &[u8]) -> io::Result<usize>;
}

impl ReportDevice for HidDevice {
    fn read_input(&self, buf: &mut [u8], timeout_ms: i32) -> io::Result<usize> {
        self.read_timeout(buf, timeout_ms).map_err(hid_error)
    }

    fn write_output(&self, data: &[u8]) -> io::Result<usize> {
        self.write(data).map_err(hid_error)
    }
}

fn hid_error(e: HidError) -> io::Error {
    io::Error::other(e.to_string())
}

/// Transport over a HID device
///
/// The amplifier uses unnumbered reports, so writes carry a leading zero
/// report number that is not counted in the returned length.
pub struct HidTransport<D = HidDevice> {
    device: Arc<Mutex<D>>,
    pending_read: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl<D: ReportDevice> HidTransport<D> {
    /// Wrap an open device
    pub fn new(device: D) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            pending_read: None,
        }
    }

    fn start_read(&self, deadline: Instant) -> JoinHandle<io::Result<Vec<u8>>> {
        let device = Arc::clone(&self.device);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let timeout_ms = i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX);

        spawn_blocking(move || {
            let device = device
                .lock()
                .map_err(|_| io::Error::other("HID device lock poisoned"))?;
            let mut report = vec![0u8; PACKET_LEN];
            let n = device.read_input(&mut report, timeout_ms)?;
            report.truncate(n);
            Ok(report)
        })
    }
}

impl<D: ReportDevice> Transport for HidTransport<D> {
    async fn write_report(&mut self, report: &[u8]) -> io::Result<usize> {
        let device = Arc::clone(&self.device);
        let mut data = Vec::with_capacity(report.len() + 1);
        data.push(0x00);
        data.extend_from_slice(report);

        let written = spawn_blocking(move || {
            let device = device
                .lock()
                .map_err(|_| io::Error::other("HID device lock poisoned"))?;
            device.write_output(&data)
        })
        .await
        .map_err(io::Error::other)??;
        Ok(written.saturating_sub(1))
    }

    async fn read_chunk(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<Option<usize>> {
        loop {
            if self.pending_read.is_none() {
                self.pending_read = Some(self.start_read(deadline));
            }
            let result = match self.pending_read.as_mut() {
                Some(handle) => handle.await,
                None => return Ok(None),
            };
            self.pending_read = None;

            let report = result.map_err(io::Error::other)??;
            if !report.is_empty() {
                let n = report.len().min(buf.len());
                buf[..n].copy_from_slice(&report[..n]);
                return Ok(Some(n));
            }
            // A resumed read may have timed out against an older deadline
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}

/// Open the first amplifier found by its USB IDs
pub async fn open_first_amp(
    read_timeout: Duration,
) -> Result<AmpConnection<HidTransport>, TransportError> {
    let device = spawn_blocking(|| {
        let api = HidApi::new()?;
        api.open(USB_VENDOR_ID, USB_PRODUCT_ID)
    })
    .await
    .map_err(io::Error::other)?
    .map_err(|e| {
        error!(
            "Failed to open USB device {:04x}:{:04x}: {}",
            USB_VENDOR_ID, USB_PRODUCT_ID, e
        );
        hid_error(e)
    })?;
    info!(
        "Amplifier connected as USB device {:04x}:{:04x}",
        USB_VENDOR_ID, USB_PRODUCT_ID
    );
    Ok(AmpConnection::with_read_timeout(
        HidTransport::new(device),
        read_timeout,
    ))
}

/// Open an amplifier by its hidraw node or platform HID path
pub async fn open_device(
    path: impl AsRef<Path>,
    read_timeout: Duration,
) -> Result<AmpConnection<HidTransport>, TransportError> {
    let path = path.as_ref().to_path_buf();
    let c_path = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let device = spawn_blocking(move || {
        let api = HidApi::new()?;
        api.open_path(&c_path)
    })
    .await
    .map_err(io::Error::other)?
    .map_err(|e| {
        error!("Failed to open {}: {}", path.display(), e);
        hid_error(e)
    })?;
    info!("Amplifier connected on {}", path.display());
    Ok(AmpConnection::with_read_timeout(
        HidTransport::new(device),
        read_timeout,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use outsider_protocol::{Control, Packet};
    use std::sync::mpsc;

    /// Device whose reads block until a report arrives or the timeout ends
    struct FakeAmp {
        inbound: mpsc::Receiver<Vec<u8>>,
        written: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ReportDevice for FakeAmp {
        fn read_input(&self, buf: &mut [u8], timeout_ms: i32) -> io::Result<usize> {
            let timeout = Duration::from_millis(u64::try_from(timeout_ms).unwrap_or(0));
            match self.inbound.recv_timeout(timeout) {
                Ok(report) => {
                    buf[..report.len()].copy_from_slice(&report);
                    Ok(report.len())
                }
                Err(_) => Ok(0),
            }
        }

        fn write_output(&self, data: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }
    }

    fn fake_amp(
        read_timeout: Duration,
    ) -> (
        AmpConnection<HidTransport<FakeAmp>>,
        mpsc::Sender<Vec<u8>>,
        Arc<Mutex<Vec<Vec<u8>>>>,
    ) {
        let (tx, rx) = mpsc::channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let device = FakeAmp {
            inbound: rx,
            written: Arc::clone(&written),
        };
        let conn = AmpConnection::with_read_timeout(HidTransport::new(device), read_timeout);
        (conn, tx, written)
    }

    #[tokio::test]
    async fn test_write_after_drain_is_prompt() {
        let (conn, amp_tx, written) = fake_amp(Duration::from_millis(30));
        assert_eq!(conn.drain().await.unwrap(), 0);

        tokio::time::timeout(Duration::from_secs(1), conn.set_control(Control::Gain, 10))
            .await
            .expect("write blocked behind a finished read")
            .unwrap();
        {
            let written = written.lock().unwrap();
            assert_eq!(written.len(), 1);
            assert_eq!(&written[0][..6], &[0x00, 0x03, 0x02, 0x00, 0x01, 0x0A]);
            assert_eq!(written[0].len(), PACKET_LEN + 1);
        }

        let tuner = Packet::with_header(&[0x09, 0x06, 0x32]);
        amp_tx.send(tuner.as_bytes().to_vec()).unwrap();
        assert_eq!(conn.read_packet().await.unwrap(), Some(tuner));
    }

    #[tokio::test]
    async fn test_abandoned_read_keeps_its_report() {
        let (conn, amp_tx, _written) = fake_amp(Duration::from_millis(300));

        // Give up on a read while hidapi is still waiting
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), conn.read_packet()).await;
        assert!(abandoned.is_err());

        let tuner = Packet::with_header(&[0x09, 0x02, 0x40]);
        amp_tx.send(tuner.as_bytes().to_vec()).unwrap();
        assert_eq!(conn.read_packet().await.unwrap(), Some(tuner));
    }

    #[tokio::test]
    async fn test_timeout_is_none_not_closed() {
        let (conn, _amp_tx, _written) = fake_amp(Duration::from_millis(10));
        assert!(conn.read_packet().await.unwrap().is_none());
        assert!(conn.read_packet().await.unwrap().is_none());
    }
}
