//! Blackstar ID Amplifier Simulation Library
//!
//! This crate provides a virtual amplifier for exercising the protocol and
//! transport layers without hardware:
//!
//! - **VirtualAmp**: tracks control, preset and mode state, answers host
//!   requests and produces front panel packets
//! - **run_virtual_amp_task**: drives a `VirtualAmp` over an async stream
//!
//! # Example
//!
//! ```rust
//! use outsider_protocol::{decode_packet, encode_control, Control};
//! use outsider_sim::VirtualAmp;
//!
//! let mut amp = VirtualAmp::new();
//!
//! // Host sets the gain
//! amp.process_packet(&encode_control(Control::Gain, 90).unwrap());
//! assert_eq!(amp.value(Control::Gain), Some(90));
//!
//! // The player turns the volume knob
//! for packet in amp.turn_knob(Control::Volume, 40).unwrap() {
//!     println!("Amp output: {:?}", decode_packet(&packet).unwrap());
//! }
//! ```

pub mod amplifier;
pub mod amplifier_task;

pub use amplifier::VirtualAmp;
pub use amplifier_task::{run_virtual_amp_task, VirtualAmpCommand};
