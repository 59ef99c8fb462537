//! Blackstar ID Amplifier Transport
//!
//! This crate moves packets between the host and an amplifier:
//!
//! - [`PacketFramer`]: cuts a byte stream into 64-byte packets
//! - [`AmpConnection`]: shared connection with command, read and query
//!   operations over any [`Transport`]
//! - [`HidTransport`]: the USB HID transport, opened with [`open_device`]
//!   or [`open_first_amp`]
//! - [`run_watcher`]: background task publishing reassembled updates
//!
//! Protocol details live in `outsider_protocol`; this crate adds no
//! interpretation of its own.
//!
//! # Example
//!
//! ```rust,no_run
//! use outsider_link::{open_device, DEFAULT_READ_TIMEOUT};
//! use outsider_protocol::Control;
//!
//! # async fn example() -> Result<(), outsider_link::TransportError> {
//! let amp = open_device("/dev/hidraw0", DEFAULT_READ_TIMEOUT).await?;
//! amp.set_control(Control::Volume, 64).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod framer;
pub mod hid;
pub mod transport;
pub mod watcher;

pub use connection::{AmpConnection, DEFAULT_READ_TIMEOUT};
pub use error::TransportError;
pub use framer::PacketFramer;
pub use hid::{open_device, open_first_amp, HidTransport, ReportDevice};
pub use transport::Transport;
pub use watcher::{run_watcher, WatcherCommand, WatcherExit};

/// USB vendor ID of Blackstar amplifiers
pub const USB_VENDOR_ID: u16 = 0x27D4;

/// USB product ID of the ID series
pub const USB_PRODUCT_ID: u16 = 0x0001;
