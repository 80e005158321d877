use std::fmt::{self, Display};

use thiserror::Error;

/// Bound a query ran into while being normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    /// operator and operand tokens after lexing
    Tokens,
    /// parenthesis nesting
    Depth,
    /// conjunctive clauses after expansion
    Clauses,
    /// clause comparisons while simplifying
    Simplification,
}

impl Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Tokens => write!(f, "query tokens"),
            Complexity::Depth => write!(f, "levels of nesting"),
            Complexity::Clauses => write!(f, "conjunctive clauses"),
            Complexity::Simplification => write!(f, "simplification steps"),
        }
    }
}

/// Errors raised while turning a boolean token stream into DNF.
///
/// Only malformed grammar ends up here. An empty query, or one that reduces to
/// a contradiction, is a valid query that matches nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryParseError {
    #[error("unexpected token `{token}` at position {position}")]
    UnexpectedToken { position: usize, token: String },
    #[error("unexpected end of query")]
    UnexpectedEnd,
    #[error("unbalanced parenthesis at position {position}")]
    UnbalancedParen { position: usize },
    #[error("query too complex: more than {limit} {kind}")]
    TooComplex { kind: Complexity, limit: usize },
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("query parse error: {0}")]
    QueryParse(#[from] QueryParseError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("document already exists: {0}")]
    DuplicateDocument(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_cbor::Error),
}

impl QueryParseError {
    pub(crate) fn too_complex(kind: Complexity, limit: usize) -> Self {
        QueryParseError::TooComplex { kind, limit }
    }
}

impl RetrievalError {
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        RetrievalError::InvalidConfig(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
