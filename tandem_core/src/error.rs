//! Error types for the tandem crate

use thiserror::Error;

use crate::{Action, Position, map::GridError};

/// Malformed configuration, reported before any training happens.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid room layout: {0}")]
    Layout(#[from] GridError),

    #[error("unknown layout token '{token}' at ({x}, {y})")]
    UnknownToken { token: String, x: usize, y: usize },

    #[error("room has no goal cell")]
    MissingGoal,

    #[error("room has more than one goal cell: {first} and {second}")]
    DuplicateGoal { first: Position, second: Position },

    #[error("layout has no start marker '{marker}'")]
    MissingStart { marker: char },

    #[error("layout has more than one start marker '{marker}': {first} and {second}")]
    DuplicateStart {
        marker: char,
        first: Position,
        second: Position,
    },

    #[error("agent {agent} starts at {position}, outside the {width}x{height} room")]
    StartOutOfBounds {
        agent: usize,
        position: Position,
        width: usize,
        height: usize,
    },

    #[error("agent {agent} starts on a {kind} cell at {position}")]
    StartOnTerminal {
        agent: usize,
        position: Position,
        kind: &'static str,
    },

    #[error("agent {agent} has a zero shift")]
    ZeroShift { agent: usize },

    #[error("agents start {distance:.2} apart, beyond the proximity threshold {threshold}")]
    StartsTooFarApart { distance: f64, threshold: f64 },

    #[error("invalid {name} = {value}: expected {expected}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("partner neighborhood radius {radius} is smaller than the required {required}")]
    NeighborhoodTooSmall { radius: usize, required: usize },

    #[error("failed to decode configuration: {0}")]
    Decode(String),

    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Decode(err.to_string())
    }
}

/// A value-table lookup that should never fail on a correctly built table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LookupError {
    #[error("joint state {self_state}/{partner} is missing from the table")]
    MissingState {
        self_state: Position,
        partner: Position,
    },

    #[error("action {action} is missing for joint state {self_state}/{partner}")]
    MissingAction {
        self_state: Position,
        partner: Position,
        action: Action,
    },

    #[error("joint state {self_state}/{partner} has no actions left")]
    EmptyEntry {
        self_state: Position,
        partner: Position,
    },

    #[error("action {action} with shift {shift} leaves the room from {position}")]
    IllegalMove {
        position: Position,
        action: Action,
        shift: usize,
    },
}

/// Main error type for the tandem crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Result type alias for tandem operations
pub type Result<T> = std::result::Result<T, Error>;
