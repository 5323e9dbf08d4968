//! Pure record → decision mappings. Classifiers never touch the store.

pub mod keyword;
pub mod lookup;
pub mod predicate;

use crate::model::intent::WriteIntent;
use crate::model::record::Record;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No rule matched the record.
    NoMatch,
    /// The record already carries the target value.
    AlreadyCorrect,
    MissingKey(&'static str),
    WrongShape(&'static str),
    UnknownKey(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMatch => f.write_str("no matching rule"),
            SkipReason::AlreadyCorrect => f.write_str("already correct"),
            SkipReason::MissingKey(field) => write!(f, "missing '{}'", field),
            SkipReason::WrongShape(field) => write!(f, "unexpected shape of '{}'", field),
            SkipReason::UnknownKey(key) => write!(f, "unknown key '{}'", key),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Write(WriteIntent),
    NoOp(SkipReason),
}

pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    fn classify(&self, record: &Record) -> Decision;
}
