//! Windows key sink using `SendInput` with scan codes

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP,
    KEYEVENTF_SCANCODE, VIRTUAL_KEY,
};

use super::{KeyAction, KeyBindings, KeyError, KeySink, ScanCode};

pub struct SendInputKeys {
    bindings: KeyBindings,
}

impl SendInputKeys {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    fn send(&self, action: KeyAction, key: &str) -> Result<(), KeyError> {
        let code = self
            .bindings
            .resolve(key)
            .ok_or_else(|| KeyError::Unbound(key.to_string()))?;

        let input = keyboard_input(code, action);
        // SAFETY: `input` is a fully initialized keyboard INPUT and the size
        // passed matches the element type of the slice.
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(KeyError::Injection {
                key: key.to_string(),
                action,
                reason: format!("SendInput inserted {} events", sent),
            });
        }
        Ok(())
    }
}

fn keyboard_input(code: ScanCode, action: KeyAction) -> INPUT {
    let mut flags = KEYEVENTF_SCANCODE;
    if code.is_extended() {
        flags |= KEYEVENTF_EXTENDEDKEY;
    }
    if action == KeyAction::Release {
        flags |= KEYEVENTF_KEYUP;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: code.wire_code(),
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

impl KeySink for SendInputKeys {
    fn press(&self, key: &str) -> Result<(), KeyError> {
        self.send(KeyAction::Press, key)
    }

    fn release(&self, key: &str) -> Result<(), KeyError> {
        self.send(KeyAction::Release, key)
    }
}
