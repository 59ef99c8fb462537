//! Virtual amplifier actor task
//!
//! This module provides an async task that owns a [`VirtualAmp`] and talks to
//! the host over an async stream. The task uses a select! loop to:
//! - Read host packets from the stream, process them and write replies
//! - Apply front panel actions from a command channel and write the packets
//!   the amp emits for them
//! - Stop on shutdown, channel close or stream end

use std::io;

use outsider_protocol::{Control, Packet, TunerReading, PACKET_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::VirtualAmp;

/// Front panel actions and control commands for the virtual amplifier
#[derive(Debug, Clone)]
pub enum VirtualAmpCommand {
    /// Turn a knob or flip a switch
    TurnKnob { control: Control, value: u16 },
    /// Change delay time with the split fine/coarse packet sequence
    TurnDelayTimeSplit(u16),
    /// Select a preset from the front panel
    SelectPreset(u8),
    /// Toggle manual mode
    SetManualMode(bool),
    /// Toggle tuner mode
    SetTunerMode(bool),
    /// Report a tuner reading
    Tuner(TunerReading),
    /// Shutdown the virtual amplifier actor
    Shutdown,
}

/// Run the virtual amplifier actor task
///
/// Returns the amplifier when the task ends so callers can inspect its
/// final state.
pub async fn run_virtual_amp_task<S>(
    mut stream: S,
    mut amp: VirtualAmp,
    mut cmd_rx: mpsc::Receiver<VirtualAmpCommand>,
) -> io::Result<VirtualAmp>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; PACKET_LEN * 4];
    let mut pending: Vec<u8> = Vec::with_capacity(PACKET_LEN * 2);

    info!("Starting virtual amplifier task");

    loop {
        tokio::select! {
            // Read host packets from the connection stream
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual amplifier stream closed");
                        break;
                    }
                    Ok(n) => {
                        pending.extend_from_slice(&buf[..n]);
                        while pending.len() >= PACKET_LEN {
                            let packet: Vec<u8> = pending.drain(..PACKET_LEN).collect();
                            let replies = amp.process_packet(&packet);
                            write_packets(&mut stream, &replies).await?;
                        }
                    }
                    Err(e) => {
                        warn!("Virtual amplifier stream error: {}", e);
                        return Err(e);
                    }
                }
            }

            // Handle commands from the channel
            cmd = cmd_rx.recv() => {
                let packets = match cmd {
                    Some(VirtualAmpCommand::Shutdown) => {
                        info!("Shutdown requested for virtual amplifier");
                        break;
                    }
                    None => {
                        debug!("Command channel closed for virtual amplifier");
                        break;
                    }
                    Some(cmd) => apply_command(&mut amp, cmd),
                };
                write_packets(&mut stream, &packets).await?;
            }
        }
    }

    info!("Virtual amplifier task ended");
    Ok(amp)
}

/// Apply a front panel action, returning the packets the amp emits
fn apply_command(amp: &mut VirtualAmp, cmd: VirtualAmpCommand) -> Vec<Packet> {
    debug!("Virtual amplifier command: {:?}", cmd);
    let result = match cmd {
        VirtualAmpCommand::TurnKnob { control, value } => amp.turn_knob(control, value),
        VirtualAmpCommand::TurnDelayTimeSplit(ms) => amp.turn_delay_time_split(ms),
        VirtualAmpCommand::SelectPreset(number) => {
            return amp.select_preset(number).unwrap_or_else(|| {
                warn!("Virtual amplifier has no preset {}", number);
                Vec::new()
            })
        }
        VirtualAmpCommand::SetManualMode(on) => return vec![amp.set_manual_mode(on)],
        VirtualAmpCommand::SetTunerMode(on) => return vec![amp.set_tuner_mode(on)],
        VirtualAmpCommand::Tuner(reading) => return amp.tuner_reading(reading).into_iter().collect(),
        VirtualAmpCommand::Shutdown => return Vec::new(),
    };
    result.unwrap_or_else(|e| {
        warn!("Virtual amplifier rejected knob turn: {}", e);
        Vec::new()
    })
}

async fn write_packets<S>(stream: &mut S, packets: &[Packet]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    for packet in packets {
        stream.write_all(packet.as_ref()).await?;
    }
    if !packets.is_empty() {
        stream.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outsider_protocol::{decode_packet, encode_control, startup_request, DecodedEvent};
    use std::time::Duration;

    async fn read_event<S: AsyncRead + Unpin>(stream: &mut S) -> DecodedEvent {
        let mut buf = [0u8; PACKET_LEN];
        tokio::time::timeout(Duration::from_millis(500), stream.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        decode_packet(&buf).unwrap()
    }

    #[tokio::test]
    async fn test_virtual_amp_answers_startup() {
        let (mut host, amp_stream) = tokio::io::duplex(1024);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(run_virtual_amp_task(amp_stream, VirtualAmp::new(), cmd_rx));

        host.write_all(&startup_request()).await.unwrap();
        assert!(matches!(read_event(&mut host).await, DecodedEvent::Unhandled { .. }));
        assert!(matches!(read_event(&mut host).await, DecodedEvent::Snapshot(_)));
        assert!(matches!(read_event(&mut host).await, DecodedEvent::Unhandled { .. }));

        drop(host);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_virtual_amp_applies_split_writes() {
        let (mut host, amp_stream) = tokio::io::duplex(1024);
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(run_virtual_amp_task(amp_stream, VirtualAmp::new(), cmd_rx));

        let packet = encode_control(Control::Bass, 12).unwrap();
        host.write_all(&packet[..30]).await.unwrap();
        host.write_all(&packet[30..]).await.unwrap();
        drop(host);

        let amp = task.await.unwrap().unwrap();
        assert_eq!(amp.value(Control::Bass), Some(12));
    }

    #[tokio::test]
    async fn test_virtual_amp_knob_command() {
        let (mut host, amp_stream) = tokio::io::duplex(1024);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(run_virtual_amp_task(amp_stream, VirtualAmp::new(), cmd_rx));

        cmd_tx
            .send(VirtualAmpCommand::TurnKnob {
                control: Control::Volume,
                value: 90,
            })
            .await
            .unwrap();
        match read_event(&mut host).await {
            DecodedEvent::Control(change) => {
                assert_eq!(change.control, Control::Volume);
                assert_eq!(change.value, 90);
            }
            other => panic!("expected control change, got {:?}", other),
        }

        cmd_tx.send(VirtualAmpCommand::Shutdown).await.unwrap();
        let amp = tokio::time::timeout(Duration::from_millis(500), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(amp.value(Control::Volume), Some(90));
    }
}
