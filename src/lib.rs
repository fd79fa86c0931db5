//! midi-keystroke - send keystrokes when configured MIDI messages arrive
//!
//! Incoming messages are decoded ([`midi`]), matched against the rules of a
//! [`rules::RuleSet`] ([`matcher`]) and turned into key presses and releases
//! ([`sequencer`]) on a [`keys::KeySink`]. [`engine::Engine`] ties the steps
//! together; [`config`] and [`input`] are the file and MIDI port plumbing.

pub mod config;
pub mod engine;
pub mod input;
pub mod keys;
pub mod matcher;
pub mod midi;
pub mod rules;
pub mod sequencer;

pub use engine::{Dispatch, Engine};
pub use midi::{DecodedEvent, Status};
pub use rules::{Rule, RuleData, RuleSet};
