//! Key name → scan code table
//!
//! Codes use PC set 1 scan codes in DirectInput numbering: values with the
//! high bit set (0x80..) stand for E0-prefixed extended keys.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Binding file picked up from the working directory when none is given
pub const DEFAULT_BINDINGS_FILE: &str = "keybindings.json";

/// Hardware scan code of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanCode(pub u16);

impl ScanCode {
    /// E0-prefixed key (arrows, navigation block, right-hand modifiers)
    pub fn is_extended(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Scan code without the extended marker, as sent on the wire
    pub fn wire_code(self) -> u16 {
        self.0 & 0x7F
    }

    /// Linux input event code for this key.
    ///
    /// Linux keycodes equal set 1 scan codes for the non-extended block;
    /// extended keys are mapped explicitly.
    pub fn linux_keycode(self) -> Option<u16> {
        if !self.is_extended() {
            return Some(self.0);
        }
        let code = match self.0 {
            0x9C => 96,  // KEY_KPENTER
            0x9D => 97,  // KEY_RIGHTCTRL
            0xB5 => 98,  // KEY_KPSLASH
            0xB8 => 100, // KEY_RIGHTALT
            0xC7 => 102, // KEY_HOME
            0xC8 => 103, // KEY_UP
            0xC9 => 104, // KEY_PAGEUP
            0xCB => 105, // KEY_LEFT
            0xCD => 106, // KEY_RIGHT
            0xCF => 107, // KEY_END
            0xD0 => 108, // KEY_DOWN
            0xD1 => 109, // KEY_PAGEDOWN
            0xD2 => 110, // KEY_INSERT
            0xD3 => 111, // KEY_DELETE
            0xDB => 125, // KEY_LEFTMETA
            0xDC => 126, // KEY_RIGHTMETA
            _ => return None,
        };
        Some(code)
    }
}

const DEFAULT_BINDINGS: &[(&str, u16)] = &[
    ("escape", 0x01),
    ("esc", 0x01),
    ("1", 0x02),
    ("2", 0x03),
    ("3", 0x04),
    ("4", 0x05),
    ("5", 0x06),
    ("6", 0x07),
    ("7", 0x08),
    ("8", 0x09),
    ("9", 0x0A),
    ("0", 0x0B),
    ("minus", 0x0C),
    ("equals", 0x0D),
    ("backspace", 0x0E),
    ("back", 0x0E),
    ("tab", 0x0F),
    ("q", 0x10),
    ("w", 0x11),
    ("e", 0x12),
    ("r", 0x13),
    ("t", 0x14),
    ("y", 0x15),
    ("u", 0x16),
    ("i", 0x17),
    ("o", 0x18),
    ("p", 0x19),
    ("lbracket", 0x1A),
    ("rbracket", 0x1B),
    ("return", 0x1C),
    ("enter", 0x1C),
    ("lcontrol", 0x1D),
    ("lctrl", 0x1D),
    ("ctrl", 0x1D),
    ("a", 0x1E),
    ("s", 0x1F),
    ("d", 0x20),
    ("f", 0x21),
    ("g", 0x22),
    ("h", 0x23),
    ("j", 0x24),
    ("k", 0x25),
    ("l", 0x26),
    ("semicolon", 0x27),
    ("apostrophe", 0x28),
    ("grave", 0x29),
    ("lshift", 0x2A),
    ("shift", 0x2A),
    ("backslash", 0x2B),
    ("z", 0x2C),
    ("x", 0x2D),
    ("c", 0x2E),
    ("v", 0x2F),
    ("b", 0x30),
    ("n", 0x31),
    ("m", 0x32),
    ("comma", 0x33),
    ("period", 0x34),
    ("slash", 0x35),
    ("rshift", 0x36),
    ("multiply", 0x37),
    ("lmenu", 0x38),
    ("lalt", 0x38),
    ("alt", 0x38),
    ("space", 0x39),
    ("capital", 0x3A),
    ("capslock", 0x3A),
    ("f1", 0x3B),
    ("f2", 0x3C),
    ("f3", 0x3D),
    ("f4", 0x3E),
    ("f5", 0x3F),
    ("f6", 0x40),
    ("f7", 0x41),
    ("f8", 0x42),
    ("f9", 0x43),
    ("f10", 0x44),
    ("numlock", 0x45),
    ("scroll", 0x46),
    ("numpad7", 0x47),
    ("numpad8", 0x48),
    ("numpad9", 0x49),
    ("subtract", 0x4A),
    ("numpad4", 0x4B),
    ("numpad5", 0x4C),
    ("numpad6", 0x4D),
    ("add", 0x4E),
    ("numpad1", 0x4F),
    ("numpad2", 0x50),
    ("numpad3", 0x51),
    ("numpad0", 0x52),
    ("decimal", 0x53),
    ("f11", 0x57),
    ("f12", 0x58),
    ("numpadenter", 0x9C),
    ("rcontrol", 0x9D),
    ("rctrl", 0x9D),
    ("divide", 0xB5),
    ("rmenu", 0xB8),
    ("ralt", 0xB8),
    ("home", 0xC7),
    ("up", 0xC8),
    ("prior", 0xC9),
    ("pageup", 0xC9),
    ("left", 0xCB),
    ("right", 0xCD),
    ("end", 0xCF),
    ("down", 0xD0),
    ("next", 0xD1),
    ("pagedown", 0xD1),
    ("insert", 0xD2),
    ("delete", 0xD3),
    ("lwin", 0xDB),
    ("rwin", 0xDC),
];

/// Binding file on disk: `{"keybindings": {"F1": "0x3B", ...}}`
#[derive(Debug, Deserialize)]
struct BindingFile {
    keybindings: HashMap<String, CodeValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeValue {
    Number(u16),
    Text(String),
}

impl CodeValue {
    fn parse(&self) -> Result<u16> {
        let code = match self {
            CodeValue::Number(n) => *n,
            CodeValue::Text(text) => {
                let text = text.trim();
                let parsed = match text
                    .strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                {
                    Some(hex) => u16::from_str_radix(hex, 16),
                    None => text.parse(),
                };
                parsed.with_context(|| format!("Invalid scan code '{}'", text))?
            }
        };
        // Set 1 codes are one byte; the high bit already marks extended keys
        if code > 0xFF {
            bail!("Scan code 0x{:X} out of range (must be 0x00-0xFF)", code);
        }
        Ok(code)
    }
}

/// Immutable key name table, built once at startup
#[derive(Debug, Clone)]
pub struct KeyBindings {
    codes: HashMap<String, ScanCode>,
}

impl KeyBindings {
    /// Built-in table (letters, digits, F1-F12, modifiers, navigation keys)
    pub fn standard() -> Self {
        let codes = DEFAULT_BINDINGS
            .iter()
            .map(|(name, code)| (name.to_string(), ScanCode(*code)))
            .collect();
        Self { codes }
    }

    /// Empty table, mostly useful in tests
    pub fn empty() -> Self {
        Self {
            codes: HashMap::new(),
        }
    }

    /// Built-in table with the entries of a JSON binding file layered on top
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key bindings: {}", path.display()))?;
        let mut bindings = Self::standard();
        bindings
            .merge_json(&contents)
            .with_context(|| format!("Failed to parse key bindings: {}", path.display()))?;
        info!("Loaded key bindings from {}", path.display());
        Ok(bindings)
    }

    /// Table for startup: the explicit file if given, else `keybindings.json`
    /// in `dir` if present, else the built-in table
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match binding_file(explicit, dir) {
            Some(path) => Self::load(&path),
            None => {
                debug!("No key binding file, using the built-in table");
                Ok(Self::standard())
            }
        }
    }

    /// Merge bindings from a JSON document, overriding existing names
    pub fn merge_json(&mut self, json: &str) -> Result<()> {
        let file: BindingFile = serde_json::from_str(json)?;
        for (name, value) in file.keybindings {
            let code = value
                .parse()
                .with_context(|| format!("Invalid binding for key '{}'", name))?;
            debug!("Key binding {} = 0x{:02X}", name, code);
            self.insert(&name, ScanCode(code));
        }
        Ok(())
    }

    pub fn insert(&mut self, name: &str, code: ScanCode) {
        self.codes.insert(name.trim().to_lowercase(), code);
    }

    /// Resolve a key name (case-insensitive)
    pub fn resolve(&self, name: &str) -> Option<ScanCode> {
        self.codes.get(&name.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

fn binding_file(explicit: Option<&Path>, dir: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let fallback = dir.join(DEFAULT_BINDINGS_FILE);
    fallback.is_file().then_some(fallback)
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_standard_lookup_is_case_insensitive() {
        let bindings = KeyBindings::standard();

        assert_eq!(bindings.resolve("F1"), Some(ScanCode(0x3B)));
        assert_eq!(bindings.resolve("f1"), Some(ScanCode(0x3B)));
        assert_eq!(bindings.resolve(" Space "), Some(ScanCode(0x39)));
        assert_eq!(bindings.resolve("NoSuchKey"), None);
    }

    #[test]
    fn test_merge_json_overrides_and_adds() {
        let mut bindings = KeyBindings::standard();
        bindings
            .merge_json(r#"{"keybindings": {"F1": "0x3C", "Pedal": 71, "Boost": "0X2A"}}"#)
            .unwrap();

        assert_eq!(bindings.resolve("f1"), Some(ScanCode(0x3C)));
        assert_eq!(bindings.resolve("pedal"), Some(ScanCode(71)));
        assert_eq!(bindings.resolve("BOOST"), Some(ScanCode(0x2A)));
    }

    #[test]
    fn test_merge_json_rejects_bad_code() {
        let mut bindings = KeyBindings::empty();
        let result = bindings.merge_json(r#"{"keybindings": {"F1": "zz"}}"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_merge_json_rejects_codes_above_one_byte() {
        let mut bindings = KeyBindings::standard();

        let err = bindings
            .merge_json(r#"{"keybindings": {"Wide": "0x147"}}"#)
            .unwrap_err();
        assert!(format!("{err:#}").contains("out of range"));
        assert!(format!("{err:#}").contains("'Wide'"));

        assert!(bindings
            .merge_json(r#"{"keybindings": {"Wide": 327}}"#)
            .is_err());
        assert_eq!(bindings.resolve("wide"), None);

        bindings
            .merge_json(r#"{"keybindings": {"Top": "0xFF"}}"#)
            .unwrap();
        assert_eq!(bindings.resolve("top"), Some(ScanCode(0xFF)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"keybindings": {{"Panel1": "0x47"}}}}"#).unwrap();

        let bindings = KeyBindings::load(file.path()).unwrap();
        assert_eq!(bindings.resolve("panel1"), Some(ScanCode(0x47)));
        assert_eq!(bindings.resolve("F2"), Some(ScanCode(0x3C)));
    }

    #[test]
    fn test_demo_bindings_merge() {
        let mut bindings = KeyBindings::standard();
        bindings
            .merge_json(include_str!("../../demos/keybindings.json"))
            .unwrap();

        assert_eq!(bindings.resolve("panel2"), Some(ScanCode(0x48)));
        assert_eq!(bindings.resolve("boost"), Some(ScanCode(42)));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(KeyBindings::load(Path::new("/nonexistent/bindings.json")).is_err());
    }

    #[test]
    fn test_discover_falls_back_to_working_directory_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_BINDINGS_FILE),
            r#"{"keybindings": {"Pedal": "0x47"}}"#,
        )
        .unwrap();

        let bindings = KeyBindings::discover(None, dir.path()).unwrap();
        assert_eq!(bindings.resolve("pedal"), Some(ScanCode(0x47)));
        assert_eq!(bindings.resolve("f1"), Some(ScanCode(0x3B)));
    }

    #[test]
    fn test_discover_without_file_uses_standard_table() {
        let dir = tempfile::tempdir().unwrap();

        let bindings = KeyBindings::discover(None, dir.path()).unwrap();
        assert_eq!(bindings.len(), KeyBindings::standard().len());
        assert_eq!(bindings.resolve("pedal"), None);
    }

    #[test]
    fn test_discover_prefers_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_BINDINGS_FILE),
            r#"{"keybindings": {"Pedal": "0x47"}}"#,
        )
        .unwrap();
        let explicit = dir.path().join("custom.json");
        std::fs::write(&explicit, r#"{"keybindings": {"Pedal": "0x48"}}"#).unwrap();

        let bindings = KeyBindings::discover(Some(&explicit), dir.path()).unwrap();
        assert_eq!(bindings.resolve("pedal"), Some(ScanCode(0x48)));

        let missing = dir.path().join("missing.json");
        assert!(KeyBindings::discover(Some(&missing), dir.path()).is_err());
    }

    #[test]
    fn test_extended_codes() {
        let up = KeyBindings::standard().resolve("up").unwrap();

        assert!(up.is_extended());
        assert_eq!(up.wire_code(), 0x48);
        assert_eq!(up.linux_keycode(), Some(103));

        let f12 = ScanCode(0x58);
        assert!(!f12.is_extended());
        assert_eq!(f12.linux_keycode(), Some(88));
        assert_eq!(ScanCode(0xEE).linux_keycode(), None);
    }
}
