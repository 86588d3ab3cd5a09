//! Error type for `roost-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The engine refused a write on a key or foreign-key constraint. The whole
  /// batch was rolled back.
  #[error("constraint violation: {0}")]
  Constraint(String),

  #[error("date parse error: {0}")]
  DateParse(String),

  #[error("decimal parse error in {column}: {source}")]
  Decimal {
    column: &'static str,
    #[source]
    source: rust_decimal::Error,
  },

  #[error("unknown {column} value: {value:?}")]
  UnknownVariant { column: &'static str, value: String },
}

impl Error {
  /// Split engine constraint failures out of generic database errors.
  pub(crate) fn classify(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
        failure,
        message,
      )) if failure.code == rusqlite::ErrorCode::ConstraintViolation => {
        Self::Constraint(message.unwrap_or_else(|| failure.to_string()))
      }
      other => Self::Database(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
