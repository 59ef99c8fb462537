//! Byte transports under an [`AmpConnection`](crate::AmpConnection)
//!
//! Any tokio stream is a transport, which is how the virtual amplifier is
//! wired up. Real hardware goes through [`HidTransport`](crate::HidTransport).

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout_at, Instant};

/// Packet carrier for a connection
pub trait Transport: Send + 'static {
    /// Write one report, returning how many bytes were accepted
    fn write_report(&mut self, report: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Read what arrives before `deadline`
    ///
    /// `Ok(None)` means nothing arrived in time, `Ok(Some(0))` means the
    /// transport has closed.
    fn read_chunk(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> impl Future<Output = io::Result<Option<usize>>> + Send;
}

impl<S> Transport for S
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_report(&mut self, report: &[u8]) -> io::Result<usize> {
        let written = self.write(report).await?;
        self.flush().await?;
        Ok(written)
    }

    async fn read_chunk(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<Option<usize>> {
        match timeout_at(deadline, self.read(buf)).await {
            Err(_) => Ok(None),
            Ok(result) => result.map(Some),
        }
    }
}
