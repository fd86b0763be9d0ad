//! End-to-end tests for report reconciliation, notification and commands.

use std::sync::{Arc, Once};
use std::thread;

use govee_catalogue::{Catalogue, RegistryError};
use govee_protocol::{report_frame, FieldValue, OpCode, Rgb, StateValue};
use govee_state::{
    ChangeFilter, CommandErrorKind, Engine, EngineConfig, Report, StateError, StateErrorKind,
};
use proptest::prelude::*;
use serde_json::json;

static INIT_TRACING: Once = Once::new();

fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

fn engine() -> Engine {
    init_tracing();
    Engine::new(Catalogue::builtin().expect("builtin catalogue"), EngineConfig::default())
}

fn brightness(level: u8, seq: u64) -> Report {
    Report::new("lamp", "H6072", OpCode::new(0x04), vec![level], seq)
}

fn uint(n: u64) -> StateValue {
    StateValue::Single(FieldValue::Uint(n))
}

// ============================================================================
// Reconciliation
// ============================================================================

#[test]
fn test_color_report_and_command() {
    let engine = engine();
    let rx = engine.subscribe();

    let frame = report_frame(OpCode::new(0x05), &[255, 0, 128]).unwrap();
    let report = Report::from_ble_frame("lamp", "H6072", &frame, 1).unwrap();
    engine.apply_report(&report).unwrap();

    let expected = StateValue::Single(FieldValue::Rgb(Rgb::new(255, 0, 128)));
    assert_eq!(engine.get("lamp", "color").unwrap(), expected);

    let changes: Vec<_> = rx.try_iter().collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].state_key, "color");
    assert_eq!(changes[0].old_value, None);
    assert_eq!(changes[0].new_value, expected);

    let command = engine
        .build("lamp", "color", &json!({"r": 255, "g": 0, "b": 128}))
        .unwrap();
    assert_eq!(command.op_code, OpCode::new(0x05));
    assert_eq!(command.payload, vec![255, 0, 128]);
}

#[test]
fn test_duplicate_report_is_idempotent() {
    let engine = engine();
    let rx = engine.subscribe();

    engine.apply_report(&brightness(40, 3)).unwrap();
    let first = engine.snapshot("lamp").unwrap();

    let outcome = engine.apply_report(&brightness(40, 3)).unwrap();
    assert_eq!(outcome.stale, vec!["brightness".to_string()]);
    assert!(outcome.changed.is_empty());

    assert_eq!(*engine.snapshot("lamp").unwrap(), *first);
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn test_older_sequence_never_wins() {
    let engine = engine();
    engine.apply_report(&brightness(50, 5)).unwrap();
    let outcome = engine.apply_report(&brightness(30, 3)).unwrap();
    assert_eq!(outcome.stale, vec!["brightness".to_string()]);
    assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(50));

    let engine = self::engine();
    engine.apply_report(&brightness(30, 3)).unwrap();
    engine.apply_report(&brightness(50, 5)).unwrap();
    assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(50));
    assert_eq!(engine.snapshot("lamp").unwrap().sequence("brightness"), Some(5));
}

#[test]
fn test_same_value_advances_sequence_silently() {
    let engine = engine();
    let rx = engine.subscribe();
    engine.apply_report(&brightness(40, 1)).unwrap();
    engine.apply_report(&brightness(40, 2)).unwrap();

    assert_eq!(rx.try_iter().count(), 1);
    assert_eq!(engine.snapshot("lamp").unwrap().sequence("brightness"), Some(2));
    assert!(engine.history("lamp", "brightness").unwrap().is_empty());

    // Sequence 2 is now stored, so a late sequence-2 change is stale.
    engine.apply_report(&brightness(90, 2)).unwrap();
    assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(40));
}

#[test]
fn test_short_payload_rejected() {
    let engine = engine();
    engine.apply_report(&brightness(40, 1)).unwrap();
    let before = engine.snapshot("lamp").unwrap();

    let err = engine
        .apply_report(&Report::new("lamp", "H6072", OpCode::new(0x05), vec![1, 2], 2))
        .unwrap_err();
    assert_eq!(err.kind(), StateErrorKind::Codec);
    assert_eq!(*engine.snapshot("lamp").unwrap(), *before);
}

#[test]
fn test_undecodable_report_creates_no_device() {
    let engine = engine();
    let err = engine
        .apply_report(&Report::new("ghost", "H0000", OpCode::new(0x01), vec![1], 1))
        .unwrap_err();
    assert!(matches!(
        err,
        StateError::Registry(RegistryError::UnknownDeviceType(_))
    ));
    assert!(engine.snapshot("ghost").is_err());
    assert!(engine.store().devices().is_empty());
}

#[test]
fn test_device_type_is_fixed() {
    let engine = engine();
    engine.apply_report(&brightness(40, 1)).unwrap();
    let err = engine
        .apply_report(&Report::new("lamp", "H6199", OpCode::new(0x04), vec![10], 2))
        .unwrap_err();
    assert_eq!(err.kind(), StateErrorKind::DeviceTypeMismatch);
    assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(40));
}

#[test]
fn test_filtered_subscribers() {
    let engine = engine();
    let lamp_color = engine.subscribe_filtered(ChangeFilter::device("lamp").with_state_key("color"));
    let strip = engine.subscribe_filtered(ChangeFilter::device("strip"));

    engine.apply_report(&brightness(40, 1)).unwrap();
    engine
        .apply_report(&Report::new("lamp", "H6072", OpCode::new(0x05), vec![1, 2, 3], 2))
        .unwrap();
    engine
        .apply_report(&Report::new("strip", "H6199", OpCode::new(0x01), vec![1], 1))
        .unwrap();

    assert_eq!(lamp_color.try_iter().count(), 1);
    let strip_changes: Vec<_> = strip.try_iter().collect();
    assert_eq!(strip_changes.len(), 1);
    assert_eq!(strip_changes[0].state_key, "power");
}

#[test]
fn test_history_and_previous() {
    let engine = engine();
    for (seq, level) in [10u8, 20, 30, 40, 50, 60, 70].iter().enumerate() {
        engine.apply_report(&brightness(*level, seq as u64 + 1)).unwrap();
    }
    let history = engine.history("lamp", "brightness").unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].value, uint(20));
    assert_eq!(history[4].value, uint(60));

    let command = engine.build_previous("lamp", "brightness").unwrap();
    assert_eq!(command.payload, vec![60]);
}

// ============================================================================
// Commands
// ============================================================================

#[test]
fn test_invalid_command_changes_nothing() {
    let engine = engine();
    engine
        .apply_report(&Report::new("lamp", "H6072", OpCode::new(0x05), vec![1, 2, 3], 1))
        .unwrap();
    let before = engine.snapshot("lamp").unwrap();

    let err = engine
        .build("lamp", "color", &json!({"r": 300, "g": 0, "b": 0}))
        .unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::ValidationFailed);
    assert!(err.to_string().contains("color.r"));
    assert_eq!(*engine.snapshot("lamp").unwrap(), *before);
    assert!(engine.pending_commands("lamp").unwrap().is_empty());
}

#[test]
fn test_command_confirmed_by_report() {
    let engine = engine();
    engine.register("lamp", "H6072").unwrap();
    let rx = engine.subscribe();

    let command = engine.build("lamp", "power", &json!("on")).unwrap();
    let frame = report_frame(command.op_code, &command.payload).unwrap();
    engine
        .apply_report(&Report::from_ble_frame("lamp", "H6072", &frame, 1).unwrap())
        .unwrap();

    let change = rx.try_recv().unwrap();
    assert_eq!(change.confirmed_command, Some(command.id));
    assert!(engine.pending_commands("lamp").unwrap().is_empty());
}

// ============================================================================
// Catalogue Reload
// ============================================================================

#[test]
fn test_reload_drops_device_type() {
    let engine = engine();
    engine.apply_report(&brightness(40, 1)).unwrap();

    let reduced = Catalogue::from_json(r#"{"deviceTypes": []}"#).unwrap();
    engine.reload(reduced);

    let err = engine.apply_report(&brightness(60, 2)).unwrap_err();
    assert_eq!(err.kind(), StateErrorKind::Registry);
    // The stored snapshot survives a reload.
    assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(40));

    let err = engine.build("lamp", "brightness", &json!(10)).unwrap_err();
    assert_eq!(err.kind(), CommandErrorKind::Registry);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_devices_update_independently() {
    let engine = Arc::new(engine());
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let id = format!("lamp-{}", n);
                for seq in 1..=50u64 {
                    let level = (seq + n) % 101;
                    engine
                        .apply_report(&Report::new(&id, "H6072", OpCode::new(0x04), vec![level as u8], seq))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for n in 0..8u64 {
        let id = format!("lamp-{}", n);
        assert_eq!(engine.get(&id, "brightness").unwrap(), uint((50 + n) % 101));
        assert_eq!(engine.snapshot(&id).unwrap().sequence("brightness"), Some(50));
    }
}

const SPLIT_COLOR_CATALOGUE: &str = r#"{
  "deviceTypes": [{
    "deviceType": "T1",
    "stateKeys": ["color", "colorTemp"],
    "opCodes": [
      {"code": "0x07", "direction": "REPORT", "stateKey": "colorTemp", "layout": [
        {"field": "kelvin", "offset": 0, "width": 2, "kind": "uint"}
      ]},
      {"code": "0x05", "direction": "REPORT", "stateKey": "color", "layout": [
        {"field": "color", "offset": 0, "width": 3, "kind": "rgbTriple"},
        {"field": "kelvin", "offset": 3, "width": 2, "kind": "uint", "stateKey": "colorTemp"}
      ]}
    ]
  }]
}"#;

#[test]
fn test_partial_update_keeps_newer_key() {
    init_tracing();
    let engine = Engine::new(
        Catalogue::from_json(SPLIT_COLOR_CATALOGUE).unwrap(),
        EngineConfig::default(),
    );
    engine
        .apply_report(&Report::new("t1", "T1", OpCode::new(0x07), vec![0x0A, 0x8C], 5))
        .unwrap();
    let rx = engine.subscribe();

    let outcome = engine
        .apply_report(&Report::new("t1", "T1", OpCode::new(0x05), vec![1, 2, 3, 0x19, 0x64], 3))
        .unwrap();
    assert_eq!(outcome.changed, vec!["color".to_string()]);
    assert_eq!(outcome.stale, vec!["colorTemp".to_string()]);

    let snap = engine.snapshot("t1").unwrap();
    assert_eq!(engine.get("t1", "colorTemp").unwrap(), uint(2700));
    assert_eq!(snap.sequence("colorTemp"), Some(5));
    assert_eq!(
        engine.get("t1", "color").unwrap(),
        StateValue::Single(FieldValue::Rgb(Rgb::new(1, 2, 3)))
    );
    assert_eq!(snap.sequence("color"), Some(3));

    let changes: Vec<_> = rx.try_iter().collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].state_key, "color");
}

#[test]
fn test_readers_never_see_half_applied_report() {
    let engine = Arc::new(engine());
    engine.register("bulb", "H6008").unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for seq in 1..=200u64 {
                let n = seq as u8;
                let kelvin = 2700 + seq as u16;
                let [hi, lo] = kelvin.to_be_bytes();
                engine
                    .apply_report(&Report::new("bulb", "H6008", OpCode::new(0x05), vec![n, n, n, hi, lo], seq))
                    .unwrap();
            }
        })
    };
    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut checked = 0;
            loop {
                let snap = engine.snapshot("bulb").unwrap();
                if let (Some(color), Some(temp)) = (snap.sequence("color"), snap.sequence("colorTemp")) {
                    assert_eq!(color, temp);
                    checked += 1;
                    if color == 200 {
                        return checked;
                    }
                }
                thread::yield_now();
            }
        })
    };

    writer.join().unwrap();
    assert!(reader.join().unwrap() >= 1);
    assert_eq!(engine.get("bulb", "colorTemp").unwrap(), uint(2900));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_highest_sequence_wins(levels in proptest::collection::vec((0u8..=100, 1u64..1000), 1..40)) {
        let engine = engine();
        for (level, seq) in &levels {
            engine.apply_report(&brightness(*level, *seq)).unwrap();
        }

        // The first report carrying the highest sequence is the one kept.
        let max_seq = levels.iter().map(|(_, s)| *s).max().unwrap();
        let (winner, _) = levels.iter().find(|(_, s)| *s == max_seq).unwrap();
        prop_assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(u64::from(*winner)));
        prop_assert_eq!(engine.snapshot("lamp").unwrap().sequence("brightness"), Some(max_seq));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_concurrent_devices_isolated(
        lamp in proptest::collection::vec(0u8..=100, 1..30),
        strip in proptest::collection::vec(0u8..=100, 1..30),
    ) {
        let engine = Arc::new(engine());
        let spawn = |id: &'static str, device_type: &'static str, levels: Vec<u8>| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for (seq, level) in levels.iter().enumerate() {
                    let report = Report::new(id, device_type, OpCode::new(0x04), vec![*level], seq as u64 + 1);
                    engine.apply_report(&report).unwrap();
                }
            })
        };
        let a = spawn("lamp", "H6072", lamp.clone());
        let b = spawn("strip", "H6199", strip.clone());
        a.join().unwrap();
        b.join().unwrap();

        let lamp_last = u64::from(*lamp.last().unwrap());
        let strip_last = u64::from(*strip.last().unwrap());
        prop_assert_eq!(engine.get("lamp", "brightness").unwrap(), uint(lamp_last));
        prop_assert_eq!(engine.get("strip", "brightness").unwrap(), uint(strip_last));
        let lamp_snapshot = engine.snapshot("lamp").unwrap();
        prop_assert_eq!(lamp_snapshot.device_type.as_str(), "H6072");
        prop_assert_eq!(engine.snapshot("strip").unwrap().sequence("brightness"), Some(strip.len() as u64));
    }
}
