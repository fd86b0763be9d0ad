//! Property tests for the payload codec and frame format.

use std::collections::BTreeMap;

use govee_protocol::{
    assemble, checksum, command_frame, decode, encode, from_base64, to_base64, BitFlag,
    CodecError, Direction, FieldKind, FieldSpec, FieldValue, FieldValues, Frame, OpCode,
    OpCodeDefinition, Rgb, Schedule, TimeOfDay, FRAME_SIZE,
};
use proptest::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

/// One field of every kind plus a constant tag, packed into a full 17-byte payload.
fn every_kind() -> OpCodeDefinition {
    let mut table = BTreeMap::new();
    table.insert(0x0001, "off".to_string());
    table.insert(0x0102, "scene".to_string());
    table.insert(0xFFFF, "max".to_string());

    OpCodeDefinition::new(
        OpCode::new(0x33),
        Direction::Both,
        "all",
        17,
        vec![
            FieldSpec::new("level", 0, 2, FieldKind::uint()),
            FieldSpec::new(
                "flags",
                2,
                1,
                FieldKind::Bitfield {
                    flags: vec![
                        BitFlag::new("a", 0),
                        BitFlag::new("b", 3),
                        BitFlag::new("c", 7),
                    ],
                },
            ),
            FieldSpec::new("color", 3, 3, FieldKind::RgbTriple),
            FieldSpec::new("mode", 6, 2, FieldKind::Enum { values: table }),
            FieldSpec::new("timer", 8, 5, FieldKind::Schedule),
            FieldSpec::new("blob", 13, 3, FieldKind::Raw),
            FieldSpec::new(
                "tag",
                16,
                1,
                FieldKind::Uint {
                    min: None,
                    max: None,
                    constant: Some(0xA5),
                },
            ),
        ],
    )
    .expect("fixture layout is valid")
}

fn time_of_day() -> impl Strategy<Value = TimeOfDay> {
    (0u8..=23, 0u8..=59).prop_map(|(h, m)| TimeOfDay::new(h, m))
}

fn valid_values() -> impl Strategy<Value = FieldValues> {
    (
        any::<u16>(),
        any::<(bool, bool, bool)>(),
        any::<(u8, u8, u8)>(),
        prop::sample::select(vec!["off", "scene", "max"]),
        (time_of_day(), time_of_day(), any::<u8>()),
        prop::collection::vec(any::<u8>(), 3),
    )
        .prop_map(|(level, (a, b, c), (r, g, bl), mode, (start, end, repeat), blob)| {
            let mut flags = BTreeMap::new();
            flags.insert("a".to_string(), a);
            flags.insert("b".to_string(), b);
            flags.insert("c".to_string(), c);

            let mut v = FieldValues::new();
            v.insert("level".into(), FieldValue::Uint(u64::from(level)));
            v.insert("flags".into(), FieldValue::Flags(flags));
            v.insert("color".into(), FieldValue::Rgb(Rgb::new(r, g, bl)));
            v.insert("mode".into(), FieldValue::Enum(mode.to_string()));
            v.insert(
                "timer".into(),
                FieldValue::Schedule(Schedule { start, end, repeat }),
            );
            v.insert("blob".into(), FieldValue::Raw(blob));
            v
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn test_roundtrip_every_kind(values in valid_values()) {
        let def = every_kind();
        let bytes = encode(&def, &values).unwrap();
        prop_assert_eq!(bytes.len(), 17);
        prop_assert_eq!(bytes[16], 0xA5);
        prop_assert_eq!(decode(&def, &bytes).unwrap(), values);
    }

    #[test]
    fn test_decode_never_panics(raw in prop::collection::vec(any::<u8>(), 0..32)) {
        let def = every_kind();
        match decode(&def, &raw) {
            Ok(values) => {
                prop_assert_eq!(values.len(), 6);
            }
            Err(CodecError::LengthMismatch { expected, actual }) => {
                prop_assert_eq!(expected, 17);
                prop_assert!(actual < 17);
            }
            Err(CodecError::UnknownEnumValue { field, .. }) => {
                prop_assert_eq!(field, "mode");
            }
            Err(CodecError::ConstantMismatch { field, expected, actual }) => {
                prop_assert_eq!(field, "tag");
                prop_assert_eq!(expected, 0xA5);
                prop_assert_ne!(actual, 0xA5);
            }
            Err(other) => {
                prop_assert!(false, "unexpected error {:?}", other);
            }
        }
    }

    #[test]
    fn test_frames_always_verify(op in any::<u8>(), payload in prop::collection::vec(any::<u8>(), 0..=17)) {
        let bytes = command_frame(OpCode::new(op), &payload).unwrap();
        prop_assert_eq!(bytes.len(), FRAME_SIZE);
        prop_assert_eq!(checksum(&bytes), 0);

        let frame = Frame::parse(&bytes).unwrap();
        prop_assert_eq!(&frame.payload[..payload.len()], &payload[..]);

        let relayed = from_base64(&to_base64(&bytes)).unwrap();
        prop_assert_eq!(relayed, bytes);
    }
}

#[test]
fn test_assemble_pads_with_extra() {
    let frame = assemble(&[0x33, 0x05], &[0x02], &[0xFF, 0x00, 0x00]).unwrap();
    assert_eq!(&frame[..6], &[0x33, 0x05, 0x02, 0xFF, 0x00, 0x00]);
    assert!(frame[6..19].iter().all(|b| *b == 0));
    assert_eq!(frame[19], 0x33 ^ 0x05 ^ 0x02 ^ 0xFF);
}
