//! Key injection
//!
//! The sequencer talks to a [`KeySink`]; concrete sinks resolve key names
//! through a [`KeyBindings`] table and synthesize the key at OS level (or just
//! log it, for dry runs).

mod bindings;
mod console;
#[cfg(windows)]
mod win32;
#[cfg(all(target_os = "linux", feature = "uinput"))]
mod linux;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use bindings::{KeyBindings, ScanCode};
pub use console::ConsoleKeys;

/// Key injection failure
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no key binding for '{0}'")]
    Unbound(String),
    #[error("failed to {action} key '{key}': {reason}")]
    Injection {
        key: String,
        action: KeyAction,
        reason: String,
    },
}

/// Direction of a single key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press => write!(f, "press"),
            KeyAction::Release => write!(f, "release"),
        }
    }
}

/// Something that can press and release named keys
pub trait KeySink: Send + Sync {
    fn press(&self, key: &str) -> Result<(), KeyError>;
    fn release(&self, key: &str) -> Result<(), KeyError>;

    /// Apply a press or release
    fn apply(&self, action: KeyAction, key: &str) -> Result<(), KeyError> {
        match action {
            KeyAction::Press => self.press(key),
            KeyAction::Release => self.release(key),
        }
    }
}

/// Open the key sink for this platform.
///
/// `dry_run` always yields a [`ConsoleKeys`]. Platforms without an injection
/// backend in this build fall back to it with a warning.
pub fn open_sink(bindings: KeyBindings, dry_run: bool) -> anyhow::Result<Arc<dyn KeySink>> {
    if dry_run {
        info!("Dry run: key actions will be logged only");
        return Ok(Arc::new(ConsoleKeys::new(bindings)));
    }

    platform_sink(bindings)
}

#[cfg(windows)]
fn platform_sink(bindings: KeyBindings) -> anyhow::Result<Arc<dyn KeySink>> {
    info!("Injecting keys with SendInput");
    Ok(Arc::new(win32::SendInputKeys::new(bindings)))
}

#[cfg(all(target_os = "linux", feature = "uinput"))]
fn platform_sink(bindings: KeyBindings) -> anyhow::Result<Arc<dyn KeySink>> {
    use anyhow::Context;

    let sink = linux::UinputKeys::open(bindings).context("Failed to open uinput device")?;
    info!("Injecting keys through uinput");
    Ok(Arc::new(sink))
}

#[cfg(not(any(windows, all(target_os = "linux", feature = "uinput"))))]
fn platform_sink(bindings: KeyBindings) -> anyhow::Result<Arc<dyn KeySink>> {
    tracing::warn!("No key injection backend in this build, key actions will be logged only");
    Ok(Arc::new(ConsoleKeys::new(bindings)))
}
