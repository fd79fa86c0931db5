//! Status name table used when reading rule files

use std::collections::HashMap;

use super::RuleError;
use crate::midi::Status;

/// Immutable mapping of configuration status names to statuses
#[derive(Debug, Clone)]
pub struct StatusNames {
    names: HashMap<&'static str, Status>,
}

impl StatusNames {
    pub fn standard() -> Self {
        let names = [
            ("noteon", Status::NoteOn),
            ("noteoff", Status::NoteOff),
            ("programchange", Status::ProgramChange),
            ("controllerchange", Status::ControllerChange),
            ("pitchbend", Status::PitchBend),
            ("polypressure", Status::PolyPressure),
            ("channelpressure", Status::ChannelPressure),
        ]
        .into_iter()
        .collect();

        Self { names }
    }

    /// Resolve a status name or numeric status byte (decimal or `0x` hex)
    pub fn resolve(&self, text: &str) -> Result<Status, RuleError> {
        let text = text.trim();
        if let Some(status) = self.names.get(text.to_lowercase().as_str()) {
            return Ok(*status);
        }

        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => text.parse::<i64>(),
        };
        match parsed {
            Ok(code) => status_from_code(code),
            Err(_) => Err(RuleError::UnknownStatus {
                name: text.to_string(),
                known: self.known_names().join(", "),
            }),
        }
    }

    /// Configured names, sorted
    pub fn known_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.names.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for StatusNames {
    fn default() -> Self {
        Self::standard()
    }
}

/// Validate a numeric status byte from configuration
pub fn status_from_code(code: i64) -> Result<Status, RuleError> {
    let byte = u8::try_from(code)
        .ok()
        .filter(|b| *b >= 0x80)
        .ok_or(RuleError::NotAStatusByte(code))?;

    if byte < 0xF0 && byte & 0x0F != 0 {
        return Err(RuleError::StatusHasChannel {
            byte,
            base: byte & 0xF0,
            channel: (byte & 0x0F) + 1,
        });
    }

    Ok(Status::from_byte(byte))
}
