use gpu_columnar::Table;
use gpu_memory_manager::{MemoryResourceRef, Stream};
use std::fmt;
use std::str::FromStr;

use crate::cross_join::CrossJoin;
use crate::error::JoinError;

/// The join algorithms the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Cross,
}

impl JoinKind {
    pub fn operator(self) -> &'static dyn JoinOperator {
        match self {
            JoinKind::Cross => &CrossJoin,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JoinKind::Cross => "cross",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JoinKind {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cross" => Ok(JoinKind::Cross),
            other => Err(JoinError::InvalidArgument(format!("unknown join kind '{other}'"))),
        }
    }
}

/// A join strategy over device tables.
///
/// Implementations allocate every output buffer from `mr`, enqueue their
/// device work on `stream` and return before that work completes.
pub trait JoinOperator: Send + Sync + fmt::Debug {
    fn kind(&self) -> JoinKind;

    fn join(&self, left: &Table, right: &Table, stream: &Stream, mr: &MemoryResourceRef) -> Result<Table, JoinError>;
}
