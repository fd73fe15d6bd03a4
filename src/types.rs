use std::fmt;
use std::io;

use thiserror::Error;

/// Textual form of the single-level wildcard segment.
pub const WILDCARD: &str = "*";
/// Textual form of the catch-all segment produced for "any" schema nodes.
pub const CATCH_ALL: &str = "**";

/// One atomic selector in a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A literal field name.
    Name(String),
    /// `*`: matches exactly one level with any name.
    Wildcard,
    /// `**`: matches this position and everything beneath it. Never user-writable.
    CatchAll,
}

impl Segment {
    /// Maps the reserved textual forms to their variants, anything else is a name.
    pub fn from_name(name: &str) -> Self {
        match name {
            WILDCARD => Segment::Wildcard,
            CATCH_ALL => Segment::CatchAll,
            _ => Segment::Name(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Segment::Name(name) => name,
            Segment::Wildcard => WILDCARD,
            Segment::CatchAll => CATCH_ALL,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Wildcard)
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Segment::from_name(name)
    }
}

impl From<String> for Segment {
    fn from(name: String) -> Self {
        match name.as_str() {
            WILDCARD => Segment::Wildcard,
            CATCH_ALL => Segment::CatchAll,
            _ => Segment::Name(name),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, non-empty list of segments designating one selected location.
pub type Path = Vec<Segment>;

/// Renders a path the way it is written in a fields expression (`a/*/b`).
pub fn path_to_string(path: &[Segment]) -> String {
    path.iter()
        .map(Segment::as_str)
        .collect::<Vec<_>>()
        .join("/")
}

fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(Segment::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A fields expression could not be parsed. Parsing is all-or-nothing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("fields expression '{expression}' is invalid: {reason}")]
pub struct ParseError {
    pub expression: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(expression: &str, reason: impl Into<String>) -> Self {
        ParseError {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("only root nodes can be merged")]
    NotARoot,
    #[error("duplicate children: {}", join_segments(.0))]
    DuplicateChildren(Vec<Segment>),
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("schema does not exist for resource {0}")]
    UnknownSchema(String),
    #[error("invalid schema {name}: {reason}")]
    InvalidSchema { name: String, reason: String },
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("invalid discovery document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A literal field path handed to a retention or request check is malformed.
/// These are caller bugs, not user input errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldPathError {
    #[error("field path must be a non-blank string")]
    Blank,
    #[error("field path '{0}' must not contain wildcards")]
    Wildcard(String),
    #[error("field path '{0}' must not start with, end with or have repeated '/' chars")]
    Separators(String),
}

#[derive(Error, Debug)]
pub enum FilterError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("unbalanced JSON event stream: {0}")]
    UnbalancedEvent(String),
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
}
