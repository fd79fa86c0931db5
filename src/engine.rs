//! Event dispatch: decode → match → act
//!
//! The engine handles one MIDI message at a time. Dispatches are serialized
//! through a stroke lock so two messages can never interleave their press and
//! release phases, even if the engine is shared between tasks.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::keys::KeySink;
use crate::matcher::Matcher;
use crate::midi::{format_hex, DecodedEvent};
use crate::rules::{Rule, RuleSet};
use crate::sequencer::{ActionKind, ActionSequencer};

/// Outcome of a handled message that matched a rule
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub rule: Arc<Rule>,
    pub action: ActionKind,
}

pub struct Engine {
    matcher: Matcher,
    sequencer: ActionSequencer,
    stroke_lock: Mutex<()>,
}

impl Engine {
    pub fn new(rules: Arc<RuleSet>, sink: Arc<dyn KeySink>) -> Self {
        Self {
            matcher: Matcher::new(rules),
            sequencer: ActionSequencer::new(sink),
            stroke_lock: Mutex::new(()),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Handle one raw MIDI message
    pub async fn handle_raw(&self, data: &[u8]) -> Option<Dispatch> {
        let Some(event) = DecodedEvent::decode(data) else {
            debug!("Ignoring empty MIDI message");
            return None;
        };

        debug!("{} | {}", event, format_hex(data));
        self.handle_event(&event).await
    }

    /// Match a decoded event and run its rule, if any
    pub async fn handle_event(&self, event: &DecodedEvent) -> Option<Dispatch> {
        let Some(rule) = self.matcher.lookup_event(event) else {
            debug!("no rule for {}", event);
            return None;
        };

        let _stroke = self.stroke_lock.lock().await;
        let action = self.sequencer.dispatch(&rule, event.status).await;

        Some(Dispatch { rule, action })
    }
}
