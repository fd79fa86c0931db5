//! Linux key sink backed by a virtual uinput keyboard

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use super::{KeyAction, KeyBindings, KeyError, KeySink};

const EV_KEY: i32 = 0x01;
const DEVICE_NAME: &str = "midi-keystroke";

pub struct UinputKeys {
    bindings: KeyBindings,
    device: Mutex<::uinput::Device>,
}

impl UinputKeys {
    /// Create the virtual keyboard (needs write access to /dev/uinput)
    pub fn open(bindings: KeyBindings) -> Result<Self> {
        let device = ::uinput::default()
            .and_then(|b| b.name(DEVICE_NAME))
            .and_then(|b| b.event(::uinput::event::Keyboard::All))
            .and_then(|b| b.create())
            .map_err(|e| anyhow!("{}", e))?;

        Ok(Self {
            bindings,
            device: Mutex::new(device),
        })
    }

    fn send(&self, action: KeyAction, key: &str) -> Result<(), KeyError> {
        let code = self
            .bindings
            .resolve(key)
            .ok_or_else(|| KeyError::Unbound(key.to_string()))?;
        let keycode = code.linux_keycode().ok_or_else(|| KeyError::Injection {
            key: key.to_string(),
            action,
            reason: format!("scan code 0x{:02X} has no Linux keycode", code.0),
        })?;

        let value = match action {
            KeyAction::Press => 1,
            KeyAction::Release => 0,
        };

        let mut device = self.device.lock();
        device
            .write(EV_KEY, i32::from(keycode), value)
            .and_then(|_| device.synchronize())
            .map_err(|e| KeyError::Injection {
                key: key.to_string(),
                action,
                reason: e.to_string(),
            })
    }
}

impl KeySink for UinputKeys {
    fn press(&self, key: &str) -> Result<(), KeyError> {
        self.send(KeyAction::Press, key)
    }

    fn release(&self, key: &str) -> Result<(), KeyError> {
        self.send(KeyAction::Release, key)
    }
}
