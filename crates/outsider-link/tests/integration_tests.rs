//! Integration tests for the amplifier transport
//!
//! These tests connect an `AmpConnection` to a virtual amplifier over an
//! in-memory duplex stream and verify:
//! - Commands reach the amplifier and change its state
//! - The startup handshake and preset queries round-trip
//! - The watcher publishes reassembled updates and stops cooperatively
//! - Inline queries are not disturbed by a running watcher

use std::time::Duration;

use outsider_link::{run_watcher, AmpConnection, TransportError, WatcherCommand, WatcherExit};
use outsider_protocol::{AmpUpdate, Control, Note, TunerReading};
use outsider_sim::{run_virtual_amp_task, VirtualAmp, VirtualAmpCommand};
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    pub struct Bench {
        pub connection: AmpConnection<DuplexStream>,
        pub amp_tx: mpsc::Sender<VirtualAmpCommand>,
        pub amp_task: JoinHandle<std::io::Result<VirtualAmp>>,
    }

    /// Connect a fresh virtual amplifier
    pub fn bench() -> Bench {
        bench_with(VirtualAmp::new())
    }

    pub fn bench_with(amp: VirtualAmp) -> Bench {
        let (host, device) = tokio::io::duplex(16 * 1024);
        let (amp_tx, amp_rx) = mpsc::channel(16);
        let amp_task = tokio::spawn(run_virtual_amp_task(device, amp, amp_rx));
        Bench {
            connection: AmpConnection::with_read_timeout(host, Duration::from_millis(50)),
            amp_tx,
            amp_task,
        }
    }

    /// Stop the virtual amplifier and return its final state
    pub async fn finish(bench: Bench) -> VirtualAmp {
        bench.amp_tx.send(VirtualAmpCommand::Shutdown).await.unwrap();
        bench.amp_task.await.unwrap().unwrap()
    }

    /// Wait for the next update matching `pred`
    pub async fn next_update(
        rx: &mut mpsc::Receiver<AmpUpdate>,
        pred: impl Fn(&AmpUpdate) -> bool,
    ) -> AmpUpdate {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let update = rx.recv().await.unwrap();
                if pred(&update) {
                    return update;
                }
            }
        })
        .await
        .unwrap()
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn test_set_control_reaches_amp() {
        let bench = helpers::bench();
        bench.connection.set_control(Control::Middle, 33).await.unwrap();
        bench
            .connection
            .set_control_by_name("delay_time", 750)
            .await
            .unwrap();
        // Let the amp task consume the writes before stopping it
        tokio::time::sleep(Duration::from_millis(50)).await;

        let amp = helpers::finish(bench).await;
        assert_eq!(amp.value(Control::Middle), Some(33));
        assert_eq!(amp.value(Control::DelayTime), Some(750));
    }

    #[tokio::test]
    async fn test_startup_handshake() {
        let bench = helpers::bench();
        bench.connection.startup().await.unwrap();

        let mut classes = Vec::new();
        while let Some(packet) = bench.connection.read_packet().await.unwrap() {
            classes.push(packet[0]);
        }
        assert_eq!(classes, vec![0x07, 0x03, 0x08]);
        helpers::finish(bench).await;
    }

    #[tokio::test]
    async fn test_query_preset_name_and_settings() {
        let mut amp = VirtualAmp::new();
        let mut preset = amp.preset(9).unwrap().clone();
        preset.info.name = "Blues Lead".to_string();
        preset.delay.time = 640;
        assert!(amp.store_preset(preset));

        let bench = helpers::bench_with(amp);
        let name = bench.connection.query_preset_name(9).await.unwrap();
        assert_eq!(name, "Blues Lead");

        let preset = bench.connection.query_preset(9).await.unwrap();
        assert_eq!(preset.number, 9);
        assert_eq!(preset.delay.time, 640);
        helpers::finish(bench).await;
    }

    #[tokio::test]
    async fn test_query_preset_names() {
        let bench = helpers::bench();
        let names = bench.connection.query_preset_names().await.unwrap();
        assert_eq!(names.len(), 128);
        assert_eq!(names[0], (1, "Preset 1".to_string()));
        assert_eq!(names[127], (128, "Preset 128".to_string()));
        helpers::finish(bench).await;
    }

    #[tokio::test]
    async fn test_query_rejects_bad_preset() {
        let bench = helpers::bench();
        assert!(matches!(
            bench.connection.query_preset(0).await,
            Err(TransportError::Validation(_))
        ));
        assert!(matches!(
            bench.connection.query_preset_name(129).await,
            Err(TransportError::Validation(_))
        ));
        helpers::finish(bench).await;
    }

    #[tokio::test]
    async fn test_query_without_reply() {
        // Nothing answers on the far end
        let (host, _device) = tokio::io::duplex(1024);
        let connection = AmpConnection::with_read_timeout(host, Duration::from_millis(20));
        assert!(matches!(
            connection.query_preset_name(1).await,
            Err(TransportError::NoReply(_))
        ));
    }
}

// ============================================================================
// Watcher Tests
// ============================================================================

mod watcher_tests {
    use super::*;

    #[tokio::test]
    async fn test_watcher_reports_front_panel() {
        let bench = helpers::bench();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (update_tx, mut update_rx) = mpsc::channel(64);
        let watcher = tokio::spawn(run_watcher(bench.connection.clone(), cmd_rx, update_tx));

        bench
            .amp_tx
            .send(VirtualAmpCommand::TurnKnob {
                control: Control::DelayType,
                value: 2,
            })
            .await
            .unwrap();
        bench
            .amp_tx
            .send(VirtualAmpCommand::TurnDelayTimeSplit(1500))
            .await
            .unwrap();

        let update = helpers::next_update(&mut update_rx, |u| {
            u.settings().is_some_and(|s| s.contains(Control::DelayTime))
        })
        .await;
        assert_eq!(update.settings().unwrap().get(Control::DelayTime), Some(1500));

        bench.amp_tx.send(VirtualAmpCommand::SetTunerMode(true)).await.unwrap();
        bench
            .amp_tx
            .send(VirtualAmpCommand::Tuner(TunerReading::new(Note::E, -4)))
            .await
            .unwrap();
        let update = helpers::next_update(&mut update_rx, |u| matches!(u, AmpUpdate::Tuner(_))).await;
        assert_eq!(update, AmpUpdate::Tuner(TunerReading::new(Note::E, -4)));

        cmd_tx.send(WatcherCommand::Shutdown).await.unwrap();
        assert_eq!(watcher.await.unwrap().unwrap(), WatcherExit::Shutdown);
        helpers::finish(bench).await;
    }

    #[tokio::test]
    async fn test_startup_through_watcher_yields_snapshot() {
        let bench = helpers::bench();
        let (_cmd_tx, cmd_rx) = mpsc::channel(4);
        let (update_tx, mut update_rx) = mpsc::channel(64);
        let watcher = tokio::spawn(run_watcher(bench.connection.clone(), cmd_rx, update_tx));

        bench.connection.startup().await.unwrap();
        let update = helpers::next_update(&mut update_rx, |_| true).await;
        match update {
            AmpUpdate::Snapshot(settings) => assert!(settings.is_complete()),
            other => panic!("expected snapshot, got {:?}", other),
        }

        helpers::finish(bench).await;
        assert_eq!(watcher.await.unwrap().unwrap(), WatcherExit::StreamClosed);
    }

    #[tokio::test]
    async fn test_query_while_watching() {
        let bench = helpers::bench();
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (update_tx, mut update_rx) = mpsc::channel(64);
        let watcher = tokio::spawn(run_watcher(bench.connection.clone(), cmd_rx, update_tx));

        let name = bench.connection.query_preset_name(5).await.unwrap();
        assert_eq!(name, "Preset 5");

        cmd_tx.send(WatcherCommand::Shutdown).await.unwrap();
        watcher.await.unwrap().unwrap();

        // The reply went to the query, not the watcher
        while let Ok(update) = update_rx.try_recv() {
            assert!(!matches!(update, AmpUpdate::PresetName { .. }));
        }
        helpers::finish(bench).await;
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use outsider_link::PacketFramer;
    use outsider_protocol::PACKET_LEN;
    use proptest::prelude::*;

    proptest! {
        /// Chunk boundaries never change the packets that come out
        #[test]
        fn test_framer_ignores_chunking(
            packets in prop::collection::vec(prop::collection::vec(any::<u8>(), PACKET_LEN), 1..8),
            cuts in prop::collection::vec(1usize..100, 1..40),
        ) {
            let stream: Vec<u8> = packets.concat();
            let mut framer = PacketFramer::new();
            let mut out = Vec::new();

            let mut pos = 0;
            let mut cuts = cuts.into_iter().cycle();
            while pos < stream.len() {
                let end = (pos + cuts.next().unwrap_or(1)).min(stream.len());
                framer.push_bytes(&stream[pos..end]);
                while let Some(packet) = framer.next_packet() {
                    out.push(packet.as_bytes().to_vec());
                }
                pos = end;
            }

            prop_assert_eq!(out, packets);
            prop_assert_eq!(framer.pending(), 0);
        }
    }
}
