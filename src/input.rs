//! MIDI input port handling
//!
//! Opens an existing input port (by index or name) or creates a virtual one,
//! and forwards every incoming message onto a channel. The midir callback
//! runs on the backend's own thread; it only copies the bytes.

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use colored::*;
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::midi::format_hex;

pub const CLIENT_NAME: &str = "midi-keystroke";
pub const VIRTUAL_PORT_NAME: &str = "MIDI input";

/// MIDI backend API
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Alsa,
    Jack,
    Coremidi,
    Windowsmm,
}

impl Backend {
    /// Backend midir was built with. midir picks it at compile time.
    pub fn compiled() -> Self {
        if cfg!(feature = "jack") {
            Backend::Jack
        } else if cfg!(target_os = "macos") {
            Backend::Coremidi
        } else if cfg!(windows) {
            Backend::Windowsmm
        } else {
            Backend::Alsa
        }
    }

    /// Fail unless `requested` is the backend of this build
    pub fn ensure_available(requested: Option<Backend>) -> Result<Backend> {
        let compiled = Self::compiled();
        match requested {
            Some(backend) if backend != compiled => bail!(
                "MIDI backend '{}' is not available in this build (built with '{}')",
                backend,
                compiled
            ),
            _ => Ok(compiled),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Alsa => "alsa",
            Backend::Jack => "jack",
            Backend::Coremidi => "coremidi",
            Backend::Windowsmm => "windowsmm",
        };
        f.write_str(name)
    }
}

/// How to pick the input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSelector {
    Index(usize),
    /// Case-insensitive substring of the port name
    Name(String),
    Virtual,
}

impl PortSelector {
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            None | Some("") => PortSelector::Virtual,
            Some(text) => match text.parse::<usize>() {
                Ok(index) => PortSelector::Index(index),
                Err(_) => PortSelector::Name(text.to_string()),
            },
        }
    }
}

/// Raw message received on the input port
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Backend timestamp in microseconds
    pub timestamp_us: u64,
    pub data: Vec<u8>,
}

/// Open input port; dropping it closes the port
pub struct MidiListener {
    _connection: MidiInputConnection<()>,
    port_name: String,
}

impl MidiListener {
    /// Open the selected port and forward messages to `tx`
    pub fn open(selector: &PortSelector, tx: mpsc::Sender<RawMessage>) -> Result<Self> {
        let mut midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
        midi_in.ignore(Ignore::None);
        debug!("Found {} MIDI input ports", midi_in.port_count());

        let callback = move |timestamp_us: u64, data: &[u8], _: &mut ()| {
            let message = RawMessage {
                timestamp_us,
                data: data.to_vec(),
            };
            // Never block the backend thread
            if let Err(e) = tx.try_send(message) {
                warn!("Dropping MIDI message {}: {}", format_hex(data), e);
            }
        };

        let (connection, port_name) = match selector {
            PortSelector::Virtual => {
                let connection = open_virtual(midi_in, callback)?;
                (connection, VIRTUAL_PORT_NAME.to_string())
            }
            selector => {
                let (port, name) = find_port(&midi_in, selector)?;
                info!("Connecting to input port: {}", name);
                let connection = midi_in
                    .connect(&port, CLIENT_NAME, callback, ())
                    .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", name, e))?;
                (connection, name)
            }
        };

        Ok(Self {
            _connection: connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

#[cfg(unix)]
fn open_virtual<F>(midi_in: MidiInput, callback: F) -> Result<MidiInputConnection<()>>
where
    F: FnMut(u64, &[u8], &mut ()) + Send + 'static,
{
    use midir::os::unix::VirtualInput;

    info!("Creating virtual input port: {}", VIRTUAL_PORT_NAME);
    midi_in
        .create_virtual(VIRTUAL_PORT_NAME, callback, ())
        .map_err(|e| anyhow!("Failed to create virtual input port: {}", e))
}

#[cfg(not(unix))]
fn open_virtual<F>(_midi_in: MidiInput, _callback: F) -> Result<MidiInputConnection<()>>
where
    F: FnMut(u64, &[u8], &mut ()) + Send + 'static,
{
    bail!("Virtual MIDI ports are not supported on this platform, pass --port")
}

fn find_port(midi_in: &MidiInput, selector: &PortSelector) -> Result<(MidiInputPort, String)> {
    let ports = midi_in.ports();
    match selector {
        PortSelector::Index(index) => {
            let port = ports
                .get(*index)
                .cloned()
                .ok_or_else(|| {
                    anyhow!("No input port at index {} ({} available)", index, ports.len())
                })?;
            let name = midi_in
                .port_name(&port)
                .with_context(|| format!("Failed to read name of input port {}", index))?;
            Ok((port, name))
        }
        PortSelector::Name(pattern) => {
            let wanted = pattern.to_lowercase();
            for port in ports {
                if let Ok(name) = midi_in.port_name(&port) {
                    if name.to_lowercase().contains(&wanted) {
                        debug!("Found port '{}' matching pattern '{}'", name, pattern);
                        return Ok((port, name));
                    }
                }
            }
            bail!("No input port found matching '{}'", pattern)
        }
        PortSelector::Virtual => bail!("Virtual port has no system port to look up"),
    }
}

/// Names of the available input ports, in index order
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;

    Ok(midi_in
        .ports()
        .iter()
        .map(|port| {
            midi_in
                .port_name(port)
                .unwrap_or_else(|_| "<unknown>".to_string())
        })
        .collect())
}

/// Print available input ports
pub fn print_ports() -> Result<()> {
    let ports = list_input_ports()?;

    println!("\n{}", "MIDI input ports:".bold());
    if ports.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (index, name) in ports.iter().enumerate() {
        println!("  [{}] {}", index.to_string().yellow(), name.green());
    }
    println!(
        "\nBackend: {}. Without --port a virtual port '{}' is created.",
        Backend::compiled().to_string().cyan(),
        VIRTUAL_PORT_NAME
    );

    Ok(())
}
