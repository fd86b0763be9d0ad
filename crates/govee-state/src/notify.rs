//! State change feed.

use crossbeam_channel::{Receiver, Sender};
use govee_protocol::{OpCode, StateValue};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// A key whose value changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub device_id: String,
    pub device_type: String,
    pub state_key: String,
    /// `None` the first time a key is observed.
    pub old_value: Option<StateValue>,
    pub new_value: StateValue,
    pub sequence: u64,
    pub source_op_code: OpCode,
    /// Pending command this report confirmed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_command: Option<Uuid>,
}

/// Restricts a subscription to one device and/or one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub device_id: Option<String>,
    pub state_key: Option<String>,
}

impl ChangeFilter {
    /// Matches every change.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            state_key: None,
        }
    }

    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    pub fn matches(&self, change: &StateChange) -> bool {
        self.device_id
            .as_deref()
            .map_or(true, |id| id == change.device_id)
            && self
                .state_key
                .as_deref()
                .map_or(true, |key| key == change.state_key)
    }
}

#[derive(Clone)]
struct Subscriber {
    filter: ChangeFilter,
    tx: Sender<StateChange>,
}

/// Fan-out of change notifications to unbounded subscriber channels.
///
/// Sends never block. The subscriber list is locked only to copy it, so
/// publishers for different devices do not wait on each other's sends.
/// Subscribers whose receiver was dropped are pruned after the publish
/// that finds them gone.
#[derive(Default)]
pub(crate) struct ChangeFeed {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeFeed {
    pub(crate) fn subscribe(&self, filter: ChangeFilter) -> Receiver<StateChange> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(Subscriber { filter, tx });
        rx
    }

    pub(crate) fn publish(&self, changes: &[StateChange]) {
        if changes.is_empty() {
            return;
        }
        let subscribers = self.subscribers.lock().clone();
        let gone: Vec<Sender<StateChange>> = subscribers
            .into_iter()
            .filter(|sub| {
                !changes
                    .iter()
                    .filter(|change| sub.filter.matches(change))
                    .all(|change| sub.tx.send(change.clone()).is_ok())
            })
            .map(|sub| sub.tx)
            .collect();
        if !gone.is_empty() {
            self.subscribers
                .lock()
                .retain(|sub| !gone.iter().any(|tx| tx.same_channel(&sub.tx)));
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govee_protocol::FieldValue;
    use std::sync::Arc;
    use std::thread;

    fn change(device_id: &str, state_key: &str) -> StateChange {
        StateChange {
            device_id: device_id.into(),
            device_type: "H6072".into(),
            state_key: state_key.into(),
            old_value: None,
            new_value: StateValue::Single(FieldValue::Uint(1)),
            sequence: 1,
            source_op_code: OpCode::new(0x04),
            confirmed_command: None,
        }
    }

    #[test]
    fn test_filtered_subscription() {
        let feed = ChangeFeed::default();
        let all = feed.subscribe(ChangeFilter::all());
        let lamp = feed.subscribe(ChangeFilter::device("lamp"));
        let lamp_color = feed.subscribe(ChangeFilter::device("lamp").with_state_key("color"));

        feed.publish(&[
            change("lamp", "brightness"),
            change("lamp", "color"),
            change("strip", "color"),
        ]);

        assert_eq!(all.try_iter().count(), 3);
        assert_eq!(lamp.try_iter().count(), 2);
        let got: Vec<_> = lamp_color.try_iter().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].state_key, "color");
    }

    #[test]
    fn test_disconnected_subscribers_pruned() {
        let feed = ChangeFeed::default();
        let keep = feed.subscribe(ChangeFilter::all());
        let dropped = feed.subscribe(ChangeFilter::all());
        drop(dropped);
        assert_eq!(feed.subscriber_count(), 2);

        feed.publish(&[change("lamp", "power")]);
        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(keep.try_iter().count(), 1);
    }

    #[test]
    fn test_concurrent_publishers_keep_per_device_order() {
        let feed = Arc::new(ChangeFeed::default());
        let rx = feed.subscribe(ChangeFilter::all());

        let handles: Vec<_> = ["lamp", "strip", "bulb"]
            .iter()
            .map(|id| {
                let feed = Arc::clone(&feed);
                thread::spawn(move || {
                    for seq in 1..=100 {
                        let mut c = change(id, "brightness");
                        c.sequence = seq;
                        feed.publish(&[c]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 300);
        for id in ["lamp", "strip", "bulb"] {
            let seqs: Vec<u64> = received
                .iter()
                .filter(|c| c.device_id == id)
                .map(|c| c.sequence)
                .collect();
            assert_eq!(seqs, (1..=100).collect::<Vec<u64>>());
        }
        assert_eq!(feed.subscriber_count(), 1);
    }
}
