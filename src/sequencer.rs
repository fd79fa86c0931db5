//! Turns a matched rule into timed key presses and releases

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::keys::{KeyAction, KeySink};
use crate::midi::Status;
use crate::rules::Rule;

/// Pause between the press and release phases of a full stroke
pub const STROKE_DELAY: Duration = Duration::from_millis(10);

/// What a trigger does with the rule's keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    PressOnly,
    ReleaseOnly,
    PressThenRelease,
}

impl ActionKind {
    /// Derive the action from the trigger's original (non-normalized) status.
    ///
    /// Note Off releases what the matching Note On pressed. Controllers have
    /// no "off" message, so each movement produces a full stroke.
    pub fn for_trigger(status: Status) -> Self {
        match status {
            Status::NoteOff => ActionKind::ReleaseOnly,
            Status::ControllerChange => ActionKind::PressThenRelease,
            _ => ActionKind::PressOnly,
        }
    }

    fn presses(self) -> bool {
        matches!(self, ActionKind::PressOnly | ActionKind::PressThenRelease)
    }

    fn releases(self) -> bool {
        matches!(self, ActionKind::ReleaseOnly | ActionKind::PressThenRelease)
    }
}

/// Drives a [`KeySink`] for matched rules
pub struct ActionSequencer {
    sink: Arc<dyn KeySink>,
    stroke_delay: Duration,
}

impl ActionSequencer {
    pub fn new(sink: Arc<dyn KeySink>) -> Self {
        Self {
            sink,
            stroke_delay: STROKE_DELAY,
        }
    }

    /// Run the key actions for `rule`, triggered by an event with `trigger` status.
    ///
    /// Key failures are logged and skipped; there is no rollback, so a failed
    /// release can leave a key held down.
    pub async fn dispatch(&self, rule: &Rule, trigger: Status) -> ActionKind {
        let kind = ActionKind::for_trigger(trigger);
        debug!("Rule '{}' triggered by {} -> {:?}", rule.name, trigger, kind);

        if kind.presses() {
            self.run_phase(KeyAction::Press, &rule.keys);
        }

        if kind == ActionKind::PressThenRelease {
            debug!("delay {:?}", self.stroke_delay);
            tokio::time::sleep(self.stroke_delay).await;
        }

        if kind.releases() {
            self.run_phase(KeyAction::Release, &rule.keys);
        }

        kind
    }

    fn run_phase(&self, action: KeyAction, keys: &[String]) {
        for key in keys {
            info!("{}: {}", action, key);
            if let Err(e) = self.sink.apply(action, key) {
                error!("Key {} failed for '{}': {}", action, key, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyError;
    use crate::rules::RuleData;
    use parking_lot::Mutex;
    use tokio::time::Instant;

    /// Records every call with the (virtual) time it happened
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(KeyAction, String, Instant)>>,
        failing: Vec<String>,
    }

    impl RecordingSink {
        fn failing(keys: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing: keys.iter().map(|k| k.to_string()).collect(),
            }
        }

        fn actions(&self) -> Vec<(KeyAction, String)> {
            self.calls
                .lock()
                .iter()
                .map(|(a, k, _)| (*a, k.clone()))
                .collect()
        }

        fn record(&self, action: KeyAction, key: &str) -> Result<(), KeyError> {
            self.calls.lock().push((action, key.to_string(), Instant::now()));
            if self.failing.iter().any(|k| k == key) {
                return Err(KeyError::Unbound(key.to_string()));
            }
            Ok(())
        }
    }

    impl KeySink for RecordingSink {
        fn press(&self, key: &str) -> Result<(), KeyError> {
            self.record(KeyAction::Press, key)
        }

        fn release(&self, key: &str) -> Result<(), KeyError> {
            self.record(KeyAction::Release, key)
        }
    }

    fn rule_with_keys(keys: &[&str]) -> Rule {
        Rule {
            name: "test".to_string(),
            description: String::new(),
            status: Status::NoteOn,
            channel: None,
            data: RuleData::Any,
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_action_kind_for_trigger() {
        assert_eq!(ActionKind::for_trigger(Status::NoteOff), ActionKind::ReleaseOnly);
        assert_eq!(
            ActionKind::for_trigger(Status::ControllerChange),
            ActionKind::PressThenRelease
        );
        assert_eq!(ActionKind::for_trigger(Status::NoteOn), ActionKind::PressOnly);
        assert_eq!(ActionKind::for_trigger(Status::ProgramChange), ActionKind::PressOnly);
        assert_eq!(ActionKind::for_trigger(Status::Other(0xF3)), ActionKind::PressOnly);
    }

    #[tokio::test]
    async fn test_press_only_keeps_key_order() {
        let sink = Arc::new(RecordingSink::default());
        let sequencer = ActionSequencer::new(sink.clone());

        let kind = sequencer
            .dispatch(&rule_with_keys(&["LCtrl", "LShift", "F5"]), Status::NoteOn)
            .await;

        assert_eq!(kind, ActionKind::PressOnly);
        assert_eq!(
            sink.actions(),
            vec![
                (KeyAction::Press, "LCtrl".to_string()),
                (KeyAction::Press, "LShift".to_string()),
                (KeyAction::Press, "F5".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_release_only_uses_listed_order() {
        let sink = Arc::new(RecordingSink::default());
        let sequencer = ActionSequencer::new(sink.clone());

        sequencer
            .dispatch(&rule_with_keys(&["LCtrl", "F5"]), Status::NoteOff)
            .await;

        assert_eq!(
            sink.actions(),
            vec![
                (KeyAction::Release, "LCtrl".to_string()),
                (KeyAction::Release, "F5".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_stroke_waits_between_phases() {
        let sink = Arc::new(RecordingSink::default());
        let sequencer = ActionSequencer::new(sink.clone());

        let kind = sequencer
            .dispatch(&rule_with_keys(&["A", "B"]), Status::ControllerChange)
            .await;

        assert_eq!(kind, ActionKind::PressThenRelease);
        let calls = sink.calls.lock();
        let order: Vec<_> = calls.iter().map(|(a, k, _)| (*a, k.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (KeyAction::Press, "A"),
                (KeyAction::Press, "B"),
                (KeyAction::Release, "A"),
                (KeyAction::Release, "B"),
            ]
        );

        let last_press = calls[1].2;
        let first_release = calls[2].2;
        assert!(first_release.duration_since(last_press) >= STROKE_DELAY);
    }

    #[tokio::test]
    async fn test_failing_key_does_not_stop_sequence() {
        let sink = Arc::new(RecordingSink::failing(&["Bogus"]));
        let sequencer = ActionSequencer::new(sink.clone());

        sequencer
            .dispatch(&rule_with_keys(&["A", "Bogus", "C"]), Status::ControllerChange)
            .await;

        let actions = sink.actions();
        assert_eq!(actions.len(), 6);
        assert_eq!(actions[2], (KeyAction::Press, "C".to_string()));
        assert_eq!(actions[5], (KeyAction::Release, "C".to_string()));
    }
}
