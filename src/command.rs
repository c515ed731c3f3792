//! Configuration commands and their decoding from control messages.

use serde_json::{Map, Value};

/// Which sensor setting a [`Command`] targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Prescaler,
    Baseline,
    NoiseThreshold,
    NumBits,
    Mode,
}

impl CommandKind {
    /// Field names understood in control messages, in decode order.
    pub const KEYS: [(&'static str, CommandKind); 5] = [
        ("prescaler", CommandKind::Prescaler),
        ("baseline", CommandKind::Baseline),
        ("noiseThreshold", CommandKind::NoiseThreshold),
        ("numBits", CommandKind::NumBits),
        ("mode", CommandKind::Mode),
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        Self::KEYS.iter().find(|(k, _)| *k == key).map(|(_, kind)| *kind)
    }

    pub fn key(self) -> &'static str {
        Self::KEYS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(k, _)| *k)
            .unwrap_or_default()
    }
}

/// A single configuration change, copied by value through the
/// [configuration channel](crate::channel).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub value: f32,
}

impl Command {
    pub fn new(kind: CommandKind, value: f32) -> Self {
        Self { kind, value }
    }

    pub fn prescaler(value: f32) -> Self {
        Self::new(CommandKind::Prescaler, value)
    }

    pub fn baseline() -> Self {
        Self::new(CommandKind::Baseline, 0.0)
    }

    pub fn noise_threshold(value: f32) -> Self {
        Self::new(CommandKind::NoiseThreshold, value)
    }

    pub fn num_bits(value: f32) -> Self {
        Self::new(CommandKind::NumBits, value)
    }

    pub fn mode(value: f32) -> Self {
        Self::new(CommandKind::Mode, value)
    }
}

/// Decode one control message into commands.
///
/// Commands come out in the fixed order of [`CommandKind::KEYS`], not in
/// the order the fields appear in the message. Unknown field names and
/// recognized names with a non-numeric value are skipped.
pub fn decode(fields: &Map<String, Value>) -> impl Iterator<Item = Command> + '_ {
    CommandKind::KEYS.iter().filter_map(move |(key, kind)| {
        let value = fields.get(*key)?.as_f64()?;
        Some(Command::new(*kind, value as f32))
    })
}
