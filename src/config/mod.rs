//! Rule file loading
//!
//! Reads the YAML rule list, validates every entry and builds the
//! [`RuleSet`]. Any bad entry is fatal; the error names the entry.

mod status;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::midi::Status;
use crate::rules::{controller_bucket, DataArity, Rule, RuleData, RuleSet};

pub use status::{status_from_code, StatusNames};

/// Configuration load failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid rule #{index} '{name}': {source}")]
    InvalidRule {
        index: usize,
        name: String,
        #[source]
        source: RuleError,
    },
}

/// Why a single rule entry was rejected
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("{0}")]
    Malformed(#[from] serde_yaml::Error),
    #[error("unknown status '{name}' (expected one of {known} or a status byte)")]
    UnknownStatus { name: String, known: String },
    #[error("status {0} is not a status byte (0x80-0xFF)")]
    NotAStatusByte(i64),
    #[error("status 0x{byte:02X} carries a channel; use 0x{base:02X} with 'channel: {channel}'")]
    StatusHasChannel { byte: u8, base: u8, channel: u8 },
    #[error("channel {0} out of range (must be 1-16)")]
    ChannelOutOfRange(i64),
    #[error("could not parse 'data' value '{0}'")]
    DataNotANumber(String),
    #[error("data value {0} out of range (must be 0-127)")]
    DataOutOfRange(i64),
    #[error("'data' must have one or two values, got {0}")]
    DataCount(usize),
    #[error("{status} rules need {} for 'data'", arity_text(.expected))]
    DataArity { status: Status, expected: DataArity },
    #[error("'keys' cannot be empty")]
    EmptyKeys,
}

fn arity_text(arity: &DataArity) -> &'static str {
    match arity {
        DataArity::Single => "a single value",
        _ => "a pair of values",
    }
}

/// One rule entry as written in the file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: StatusField,
    #[serde(default)]
    pub channel: Option<i64>,
    #[serde(default)]
    pub data: Option<DataField>,
    pub keys: KeysField,
}

/// Status as a name, numeric string or bare number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatusField {
    Number(i64),
    Text(String),
}

/// Data as a single number, a "int int" string, or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataField {
    Number(i64),
    Text(String),
    List(Vec<i64>),
}

/// Keys as a space separated string or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeysField {
    Text(String),
    List(Vec<String>),
}

impl RuleConfig {
    /// Validate the entry and turn it into a rule
    pub fn into_rule(self, statuses: &StatusNames) -> Result<Rule, RuleError> {
        let status = match &self.status {
            StatusField::Number(code) => status_from_code(*code)?,
            StatusField::Text(text) => statuses.resolve(text)?,
        };

        let channel = self
            .channel
            .map(|ch| {
                u8::try_from(ch)
                    .ok()
                    .filter(|c| (1..=16).contains(c))
                    .ok_or(RuleError::ChannelOutOfRange(ch))
            })
            .transpose()?;

        let data = match &self.data {
            None => RuleData::Any,
            Some(field) => parse_data(field)?,
        };

        let expected = DataArity::for_status(status);
        if !expected.accepts(&data) {
            return Err(RuleError::DataArity { status, expected });
        }

        // Controller values are matched by bucket, so store the rule's value bucketed too
        let data = match (status, data) {
            (Status::ControllerChange, RuleData::Pair(cc, value)) => {
                RuleData::Pair(cc, controller_bucket(value))
            }
            (_, data) => data,
        };

        let keys: Vec<String> = match self.keys {
            KeysField::Text(text) => text.split_whitespace().map(str::to_string).collect(),
            KeysField::List(list) => list
                .iter()
                .flat_map(|k| k.split_whitespace())
                .map(str::to_string)
                .collect(),
        };
        if keys.is_empty() {
            return Err(RuleError::EmptyKeys);
        }

        Ok(Rule {
            name: self.name,
            description: self.description,
            status,
            channel,
            data,
            keys,
        })
    }
}

fn parse_data(field: &DataField) -> Result<RuleData, RuleError> {
    let values: Vec<i64> = match field {
        DataField::Number(n) => vec![*n],
        DataField::List(list) => list.clone(),
        DataField::Text(text) => text
            .split_whitespace()
            .map(|part| {
                part.parse::<i64>()
                    .map_err(|_| RuleError::DataNotANumber(part.to_string()))
            })
            .collect::<Result<_, _>>()?,
    };

    let bytes = values
        .iter()
        .map(|v| {
            u8::try_from(*v)
                .ok()
                .filter(|b| *b <= 0x7F)
                .ok_or(RuleError::DataOutOfRange(*v))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    match bytes.as_slice() {
        [single] => Ok(RuleData::Single(*single)),
        [first, second] => Ok(RuleData::Pair(*first, *second)),
        _ => Err(RuleError::DataCount(bytes.len())),
    }
}

/// Parse and validate a YAML rule list
pub fn parse_rules(yaml: &str, statuses: &StatusNames) -> Result<RuleSet, ConfigError> {
    let entries: Vec<serde_yaml::Value> = if yaml.trim().is_empty() {
        Vec::new()
    } else {
        serde_yaml::from_str::<Option<Vec<serde_yaml::Value>>>(yaml)?.unwrap_or_default()
    };

    let mut rules = RuleSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();
        let invalid = |source: RuleError| ConfigError::InvalidRule {
            index,
            name: name.clone(),
            source,
        };

        let config: RuleConfig =
            serde_yaml::from_value(entry).map_err(|e| invalid(RuleError::from(e)))?;
        let rule = config.into_rule(statuses).map_err(invalid)?;

        debug!(
            "Config: {} ({}) {} ch:{:?} data:{:?} keys:{:?}",
            rule.name, rule.description, rule.status, rule.channel, rule.data, rule.keys
        );
        rules.push(rule);
    }

    if rules.is_empty() {
        warn!("Configuration contains no rules, no keys will ever be sent");
    }

    Ok(rules)
}

/// Load and validate a rule file
pub async fn load_rules(path: &Path, statuses: &StatusNames) -> Result<RuleSet, ConfigError> {
    let contents = fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let rules = parse_rules(&contents, statuses)?;
    info!("Loaded {} rules from {}", rules.len(), path.display());

    Ok(rules)
}
