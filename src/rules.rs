//! Dispatch rules and the rule set
//!
//! A [`RuleSet`] is built once from configuration and never changes while
//! the listener runs, so it can be shared behind an `Arc` without locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::midi::Status;

/// Data bytes a rule requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleData {
    /// No data constraint
    Any,
    /// First data byte must equal this value
    Single(u8),
    /// First and second data bytes must equal these values
    Pair(u8, u8),
}

impl RuleData {
    /// Check the event's data bytes against this constraint
    pub fn matches(&self, data1: Option<u8>, data2: Option<u8>) -> bool {
        match *self {
            RuleData::Any => true,
            RuleData::Single(value) => data1 == Some(value),
            RuleData::Pair(first, second) => data1 == Some(first) && data2 == Some(second),
        }
    }
}

/// Number of data values a rule of a given status must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataArity {
    Single,
    Pair,
    /// Raw statuses accept either form
    Either,
}

impl DataArity {
    pub fn for_status(status: Status) -> Self {
        match status {
            Status::NoteOn | Status::NoteOff | Status::ProgramChange | Status::ChannelPressure => {
                DataArity::Single
            }
            Status::ControllerChange | Status::PolyPressure | Status::PitchBend => DataArity::Pair,
            Status::Other(_) => DataArity::Either,
        }
    }

    /// Whether `data` is acceptable for this arity
    pub fn accepts(self, data: &RuleData) -> bool {
        matches!(
            (self, data),
            (_, RuleData::Any)
                | (DataArity::Single, RuleData::Single(_))
                | (DataArity::Pair, RuleData::Pair(..))
                | (DataArity::Either, _)
        )
    }
}

/// Bucket a controller value into the low (63) or high (65) half.
///
/// 64 is left alone and only matches rules that name it explicitly.
pub fn controller_bucket(value: u8) -> u8 {
    match value {
        v if v < 64 => 63,
        v if v > 64 => 65,
        v => v,
    }
}

/// A single MIDI → keystroke rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub description: String,
    pub status: Status,
    /// MIDI channel (1-16), None matches any channel
    pub channel: Option<u8>,
    pub data: RuleData,
    /// Keys pressed in order and released in the same order
    pub keys: Vec<String>,
}

impl Rule {
    /// Check channel and data constraints (status is matched by the caller)
    pub fn matches(&self, channel: Option<u8>, data1: Option<u8>, data2: Option<u8>) -> bool {
        let channel_ok = match self.channel {
            None => true,
            Some(wanted) => channel == Some(wanted),
        };

        channel_ok && self.data.matches(data1, data2)
    }
}

/// Rules grouped by normalized status, in configuration order
#[derive(Debug, Default, Clone)]
pub struct RuleSet {
    by_status: HashMap<Status, Vec<Arc<Rule>>>,
    len: usize,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule under its normalized status
    pub fn push(&mut self, rule: Rule) {
        self.by_status
            .entry(rule.status.normalized())
            .or_default()
            .push(Arc::new(rule));
        self.len += 1;
    }

    /// Rules for a normalized status, in insertion order
    pub fn rules_for(&self, status: Status) -> &[Arc<Rule>] {
        self.by_status
            .get(&status)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}
