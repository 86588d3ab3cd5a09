//! Error types for `roost-core`.
//!
//! A [`Violation`] is a single broken constraint. A [`Rejection`] pins a
//! violation to a record of a batch. [`Error`] is what a load call returns
//! when it cannot finish: a fail-fast abort or a storage failure.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::Table;

// ─── Violations ──────────────────────────────────────────────────────────────

/// A constraint broken by a single record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
  /// A required field is absent or a field is malformed.
  #[error("field `{field}` {problem}")]
  Validation { field: &'static str, problem: String },

  /// A primary-key or unique-constraint collision, either with a stored row
  /// or with an earlier record of the same batch.
  #[error("duplicate {constraint}:{value}")]
  DuplicateKey { constraint: &'static str, value: String },

  /// A foreign key that resolves to no row in `target`. Loading out of
  /// dependency order produces this too.
  #[error("{field}:{value} references no row in {target}")]
  ReferentialIntegrity {
    field:  &'static str,
    value:  String,
    target: Table,
  },
}

/// The discriminant of a [`Violation`], for summaries and matching.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViolationKind {
  Validation,
  DuplicateKey,
  ReferentialIntegrity,
}

impl Violation {
  pub fn kind(&self) -> ViolationKind {
    match self {
      Self::Validation { .. } => ViolationKind::Validation,
      Self::DuplicateKey { .. } => ViolationKind::DuplicateKey,
      Self::ReferentialIntegrity { .. } => ViolationKind::ReferentialIntegrity,
    }
  }

  pub(crate) fn missing(field: &'static str) -> Self {
    Self::Validation { field, problem: "is required".into() }
  }

  pub(crate) fn malformed(field: &'static str, problem: impl Into<String>) -> Self {
    Self::Validation { field, problem: problem.into() }
  }
}

// ─── Rejections ──────────────────────────────────────────────────────────────

/// A record excluded from a batch, with enough context to rebuild a rejection
/// report: the table, the record's position in its batch, its key when one
/// could be read, and the violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
  pub table:     Table,
  pub position:  usize,
  pub record:    Option<i64>,
  pub violation: Violation,
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} record #{}", self.table, self.position)?;
    if let Some(key) = self.record {
      write!(f, " ({}:{key})", self.table.key_column())?;
    }
    write!(f, ": {}", self.violation)
  }
}

impl std::error::Error for Rejection {}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  /// A fail-fast load hit its first violation; the batch was not written.
  #[error("batch aborted: {0}")]
  Rejected(Rejection),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// The rejection behind a fail-fast abort, if that is what this is.
  pub fn rejection(&self) -> Option<&Rejection> {
    match self {
      Self::Rejected(r) => Some(r),
      Self::Store(_) => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
