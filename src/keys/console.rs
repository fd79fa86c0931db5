//! Console key sink - logs key actions instead of injecting them
//!
//! Used for `--dry-run` and on platforms without an injection backend. Key
//! names are still resolved, so unbound keys fail the same way they would
//! with a real backend.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::{KeyAction, KeyBindings, KeyError, KeySink};

pub struct ConsoleKeys {
    bindings: KeyBindings,
    /// Number of key actions logged so far
    actions: AtomicU64,
}

impl ConsoleKeys {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            actions: AtomicU64::new(0),
        }
    }

    pub fn action_count(&self) -> u64 {
        self.actions.load(Ordering::Relaxed)
    }

    fn log(&self, action: KeyAction, key: &str) -> Result<(), KeyError> {
        let code = self
            .bindings
            .resolve(key)
            .ok_or_else(|| KeyError::Unbound(key.to_string()))?;

        let count = self.actions.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "⌨️  [{}] {} {} (scan 0x{:02X}) [#{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            action,
            key,
            code.0,
            count
        );
        Ok(())
    }
}

impl KeySink for ConsoleKeys {
    fn press(&self, key: &str) -> Result<(), KeyError> {
        self.log(KeyAction::Press, key)
    }

    fn release(&self, key: &str) -> Result<(), KeyError> {
        self.log(KeyAction::Release, key)
    }
}
