//! Integration tests for the amplifier protocol
//!
//! These tests drive the public API end to end:
//! - Encoding commands and decoding the amp's echo of them
//! - Reassembling split delay time sequences from raw packets
//! - Snapshot and preset packets against the registry
//! - Range and round-trip properties over every control

use outsider_protocol::{
    decode_packet, encode_control, encode_control_by_name, encode_event, snapshot_from_packet,
    snapshot_to_packet, AmpUpdate, Control, ControlRegistry, DecodedEvent, Packet, Preset,
    ProtocolError, Reassembler, SettingsMap, ValidationError,
};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Decode raw packets and feed them through one reassembler
    pub fn reassemble(packets: &[Packet]) -> Vec<AmpUpdate> {
        let mut reassembler = Reassembler::new();
        packets
            .iter()
            .filter_map(|p| reassembler.feed(decode_packet(p).unwrap()))
            .collect()
    }

    /// Control packet with arbitrary shape and payload
    pub fn control_packet(id: u8, shape: u8, payload: &[u8]) -> Packet {
        let mut header = vec![0x03, id, 0x00, shape];
        header.extend_from_slice(payload);
        Packet::with_header(&header)
    }

    /// A settings map with every settable control at its minimum
    pub fn minimum_settings() -> SettingsMap {
        Control::ALL
            .iter()
            .filter(|c| !c.is_wire_only())
            .map(|c| (*c, c.range().0))
            .collect()
    }
}

// ============================================================================
// Wire Format Tests
// ============================================================================

mod wire_tests {
    use super::*;

    #[test]
    fn test_delay_time_1500() {
        let packet = encode_control(Control::DelayTime, 1500).unwrap();
        assert_eq!(&packet[..6], &[0x03, 0x1B, 0x00, 0x02, 0xDC, 0x05]);
        assert_eq!(packet.len(), 64);
    }

    #[test]
    fn test_short_packet_rejected() {
        let bytes = [0u8; 63];
        let err = decode_packet(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPacket { len: 63, .. }));
        assert_eq!(err.bytes().len(), 63);
    }

    #[test]
    fn test_long_packet_rejected() {
        let bytes = [0u8; 65];
        assert!(matches!(
            decode_packet(&bytes),
            Err(ProtocolError::MalformedPacket { len: 65, .. })
        ));
    }

    #[test]
    fn test_validation_before_encoding() {
        assert!(matches!(
            encode_control_by_name("gain", 128),
            Err(ValidationError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            encode_control_by_name("sustain", 1),
            Err(ValidationError::UnknownControl(_))
        ));
    }

    #[test]
    fn test_command_echo_decodes() {
        for spec in ControlRegistry::global().iter() {
            if spec.control.is_wire_only() {
                continue;
            }
            for value in [spec.min, (spec.min + spec.max) / 2, spec.max] {
                let packet = encode_control(spec.control, i32::from(value)).unwrap();
                let event = decode_packet(&packet).unwrap();
                let settings = event.settings().unwrap();
                assert_eq!(settings.get(spec.control), Some(value), "{}", spec.name);
            }
        }
    }
}

// ============================================================================
// Reassembly Tests
// ============================================================================

mod reassembly_tests {
    use super::*;

    #[test]
    fn test_knob_sequence_from_raw_packets() {
        // Delay level knob held with tap: low byte, a reverb pair, then the
        // delay type pair carrying the high byte
        let updates = helpers::reassemble(&[
            helpers::control_packet(0x1B, 0x01, &[220]),
            helpers::control_packet(0x1D, 0x02, &[1, 9]),
            helpers::control_packet(0x17, 0x02, &[2, 5]),
        ]);

        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[0].settings().unwrap().get(Control::ReverbType),
            Some(1)
        );
        let combined = updates[1].settings().unwrap();
        assert_eq!(combined.get(Control::DelayType), Some(2));
        assert_eq!(combined.get(Control::DelayTime), Some(1500));
    }

    #[test]
    fn test_explicit_coarse_sequence() {
        let updates = helpers::reassemble(&[
            helpers::control_packet(0x1B, 0x01, &[0x90]),
            helpers::control_packet(0x02, 0x01, &[64]),
            helpers::control_packet(0x1C, 0x02, &[0x01]),
        ]);
        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[1],
            AmpUpdate::Settings(SettingsMap::from([(Control::DelayTime, 400)]))
        );
    }

    #[test]
    fn test_encode_event_feeds_back() {
        let events = [
            DecodedEvent::DelayTimeFine(0xF4),
            DecodedEvent::DelayTimeCoarse(0x01),
        ];
        let packets: Vec<Packet> = events.iter().map(encode_event).collect();
        let updates = helpers::reassemble(&packets);
        assert_eq!(
            updates,
            vec![AmpUpdate::Settings(SettingsMap::from([(Control::DelayTime, 500)]))]
        );
    }
}

// ============================================================================
// Snapshot and Preset Tests
// ============================================================================

mod snapshot_tests {
    use super::*;

    #[test]
    fn test_snapshot_is_complete() {
        let packet = snapshot_to_packet(&helpers::minimum_settings());
        let event = decode_packet(&packet).unwrap();
        let settings = match event {
            DecodedEvent::Snapshot(settings) => settings,
            other => panic!("expected snapshot, got {:?}", other),
        };
        assert!(settings.is_complete());
        assert!(!settings.contains(Control::DelayTimeCoarse));
    }

    #[test]
    fn test_preset_packet_decodes_to_preset() {
        let mut preset = Preset::default();
        preset.number = 42;
        preset.amplifier.gain = 99;
        preset.delay.time = 1999;
        let packet = preset.to_full_packet();

        match decode_packet(&packet).unwrap() {
            DecodedEvent::PresetSettings(decoded) => {
                assert_eq!(decoded.number, 42);
                assert_eq!(decoded.amplifier.gain, 99);
                assert_eq!(decoded.delay.time, 1999);
            }
            other => panic!("expected preset settings, got {:?}", other),
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn settable_control() -> impl Strategy<Value = Control> {
        proptest::sample::select(
            Control::ALL
                .iter()
                .copied()
                .filter(|c| !c.is_wire_only())
                .collect::<Vec<_>>(),
        )
    }

    fn complete_settings() -> impl Strategy<Value = SettingsMap> {
        let controls: Vec<Control> = Control::ALL
            .iter()
            .copied()
            .filter(|c| !c.is_wire_only())
            .collect();
        let values: Vec<_> = controls
            .iter()
            .map(|c| {
                let (min, max) = c.range();
                min..=max
            })
            .collect();
        values.prop_map(move |values| controls.iter().copied().zip(values).collect())
    }

    proptest! {
        #[test]
        fn in_range_values_roundtrip(control in settable_control(), offset in 0u32..4096) {
            let (min, max) = control.range();
            let value = min + (offset % u32::from(max - min + 1)) as u16;
            let packet = encode_control(control, i32::from(value)).unwrap();
            prop_assert_eq!(packet.len(), 64);
            prop_assert_eq!(packet[1], control.protocol_id());

            let event = decode_packet(&packet).unwrap();
            prop_assert_eq!(
                event.settings().and_then(|s| s.get(control)),
                Some(value),
                "{} did not decode back to {}",
                control,
                value
            );
        }

        #[test]
        fn out_of_range_values_rejected(control in settable_control(), excess in 1i32..1000) {
            let (min, max) = control.range();
            let above = encode_control(control, i32::from(max) + excess);
            let below = encode_control(control, i32::from(min) - excess);
            prop_assert!(
                matches!(above, Err(ValidationError::ValueOutOfRange { .. })),
                "above range was accepted"
            );
            prop_assert!(
                matches!(below, Err(ValidationError::ValueOutOfRange { .. })),
                "below range was accepted"
            );
        }

        #[test]
        fn delay_time_roundtrip(ms in 100i32..=2000) {
            let packet = encode_control(Control::DelayTime, ms).unwrap();
            let event = decode_packet(&packet).unwrap();
            prop_assert_eq!(
                event.settings().and_then(|s| s.get(Control::DelayTime)),
                Some(ms as u16)
            );
        }

        #[test]
        fn snapshot_decode_is_idempotent(settings in complete_settings()) {
            let packet = snapshot_to_packet(&settings);
            let decoded = snapshot_from_packet(&packet);
            prop_assert_eq!(&decoded, &settings);
            prop_assert_eq!(snapshot_to_packet(&decoded), packet);
        }

        #[test]
        fn split_delay_reassembles(ms in 100u16..=2000, noise in 0u8..=127) {
            let [fine, coarse] = ms.to_le_bytes();
            let updates = helpers::reassemble(&[
                helpers::control_packet(0x1B, 0x01, &[fine]),
                helpers::control_packet(0x03, 0x01, &[noise]),
                helpers::control_packet(0x17, 0x02, &[1, coarse]),
            ]);
            prop_assert_eq!(updates.len(), 2);
            prop_assert_eq!(updates[1].settings().unwrap().get(Control::DelayTime), Some(ms));
        }
    }
}
