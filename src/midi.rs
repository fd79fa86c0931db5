//! MIDI status codes and event decoding
//!
//! Turns raw MIDI bytes into a [`DecodedEvent`] that the matcher can consume.

use std::fmt;

/// MIDI message status
///
/// Channel voice statuses are stored without their channel nibble. Anything
/// else (system messages, or bytes that are not status bytes at all) is kept
/// verbatim in [`Status::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    /// Note Off (0x80)
    NoteOff,
    /// Note On (0x90)
    NoteOn,
    /// Polyphonic Key Pressure (0xA0)
    PolyPressure,
    /// Control Change (0xB0)
    ControllerChange,
    /// Program Change (0xC0)
    ProgramChange,
    /// Channel Pressure (0xD0)
    ChannelPressure,
    /// Pitch Bend (0xE0)
    PitchBend,
    /// Any other status byte, unchanged
    Other(u8),
}

impl Status {
    /// Map a status byte (channel nibble already stripped) to a status
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x80 => Status::NoteOff,
            0x90 => Status::NoteOn,
            0xA0 => Status::PolyPressure,
            0xB0 => Status::ControllerChange,
            0xC0 => Status::ProgramChange,
            0xD0 => Status::ChannelPressure,
            0xE0 => Status::PitchBend,
            other => Status::Other(other),
        }
    }

    /// Numeric status code
    pub fn code(self) -> u8 {
        match self {
            Status::NoteOff => 0x80,
            Status::NoteOn => 0x90,
            Status::PolyPressure => 0xA0,
            Status::ControllerChange => 0xB0,
            Status::ProgramChange => 0xC0,
            Status::ChannelPressure => 0xD0,
            Status::PitchBend => 0xE0,
            Status::Other(code) => code,
        }
    }

    /// Status used for rule lookup.
    ///
    /// Note Off collapses onto Note On so that one rule drives both the press
    /// and the release of its keys.
    pub fn normalized(self) -> Self {
        match self {
            Status::NoteOff => Status::NoteOn,
            other => other,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NoteOff => write!(f, "NoteOff"),
            Status::NoteOn => write!(f, "NoteOn"),
            Status::PolyPressure => write!(f, "PolyPressure"),
            Status::ControllerChange => write!(f, "ControllerChange"),
            Status::ProgramChange => write!(f, "ProgramChange"),
            Status::ChannelPressure => write!(f, "ChannelPressure"),
            Status::PitchBend => write!(f, "PitchBend"),
            Status::Other(code) => write!(f, "0x{:02X}", code),
        }
    }
}

/// One incoming MIDI message, split into its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodedEvent {
    pub status: Status,
    /// MIDI channel (1-16), None for system messages
    pub channel: Option<u8>,
    pub data1: Option<u8>,
    pub data2: Option<u8>,
}

impl DecodedEvent {
    /// Decode raw MIDI bytes.
    ///
    /// Any non-empty byte pattern decodes; values are not range checked.
    /// Bytes past the third are ignored. Returns None only for an empty slice.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (&first, rest) = data.split_first()?;

        let (status, channel) = if first < 0xF0 {
            (Status::from_byte(first & 0xF0), Some((first & 0x0F) + 1))
        } else {
            (Status::Other(first), None)
        };

        Some(Self {
            status,
            channel,
            data1: rest.first().copied(),
            data2: rest.get(1).copied(),
        })
    }
}

impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = |v: Option<u8>| v.map(|b| b.to_string()).unwrap_or_else(|| "-".into());
        write!(
            f,
            "CH:{:>2} s:{:02X} ({}) d1:{} d2:{}",
            field(self.channel),
            self.status.code(),
            self.status,
            field(self.data1),
            field(self.data2)
        )
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_program_change_decoding() {
        let event = DecodedEvent::decode(&[0xCF, 0x05]).unwrap();

        assert_eq!(event.status, Status::ProgramChange);
        assert_eq!(event.channel, Some(16));
        assert_eq!(event.data1, Some(5));
        assert_eq!(event.data2, None);
    }

    #[test]
    fn test_control_change_decoding() {
        let event = DecodedEvent::decode(&[0xBF, 0x0E, 0x7F]).unwrap();

        assert_eq!(event.status, Status::ControllerChange);
        assert_eq!(event.channel, Some(16));
        assert_eq!(event.data1, Some(14));
        assert_eq!(event.data2, Some(127));
    }

    #[test]
    fn test_system_message_has_no_channel() {
        let event = DecodedEvent::decode(&[0xF8]).unwrap();

        assert_eq!(event.status, Status::Other(0xF8));
        assert_eq!(event.channel, None);
        assert_eq!(event.data1, None);
        assert_eq!(event.data2, None);
    }

    #[test]
    fn test_out_of_range_bytes_pass_through() {
        // Data byte where a status byte belongs, data bytes with the high bit set
        let event = DecodedEvent::decode(&[0x12, 0xFF, 0x80]).unwrap();

        assert_eq!(event.status, Status::Other(0x10));
        assert_eq!(event.channel, Some(3));
        assert_eq!(event.data1, Some(0xFF));
        assert_eq!(event.data2, Some(0x80));
    }

    #[test]
    fn test_extra_bytes_ignored() {
        let event = DecodedEvent::decode(&[0xF0, 0x7E, 0x00, 0x06, 0xF7]).unwrap();

        assert_eq!(event.status, Status::Other(0xF0));
        assert_eq!(event.data1, Some(0x7E));
        assert_eq!(event.data2, Some(0x00));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(DecodedEvent::decode(&[]), None);
    }

    #[test]
    fn test_note_off_normalizes_to_note_on() {
        assert_eq!(Status::NoteOff.normalized(), Status::NoteOn);
        assert_eq!(Status::NoteOn.normalized(), Status::NoteOn);
        assert_eq!(Status::ControllerChange.normalized(), Status::ControllerChange);
    }

    #[test]
    fn test_status_code_roundtrip() {
        for code in (0x80..=0xE0).step_by(0x10) {
            assert_eq!(Status::from_byte(code).code(), code);
        }
        assert_eq!(Status::from_byte(0xFA), Status::Other(0xFA));
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xBF, 0x0E, 0x7F]), "BF 0E 7F");
    }

    proptest! {
        #[test]
        fn prop_channel_voice_channel_in_range(
            first in 0x00u8..0xF0,
            rest in proptest::collection::vec(any::<u8>(), 0..3)
        ) {
            let mut bytes = vec![first];
            bytes.extend(rest);
            let event = DecodedEvent::decode(&bytes).unwrap();

            let channel = event.channel.unwrap();
            prop_assert_eq!(channel, (first & 0x0F) + 1);
            prop_assert!((1..=16).contains(&channel));
            prop_assert_eq!(event.status.code(), first & 0xF0);
        }

        #[test]
        fn prop_data_presence_follows_length(
            bytes in proptest::collection::vec(any::<u8>(), 1..4)
        ) {
            let event = DecodedEvent::decode(&bytes).unwrap();

            prop_assert_eq!(event.data1.is_some(), bytes.len() >= 2);
            prop_assert_eq!(event.data2.is_some(), bytes.len() >= 3);
        }
    }
}
