//! Error types for illegal-state operations and teardown failures.
//!
//! rxengine separates two kinds of failure:
//!
//! - **Stream errors** are in-band. They are the `Err` type parameter of an
//!   [`Observable`](crate::observable::Observable) and travel as
//!   [`Notification::Error`](crate::notification::Notification::Error).
//! - **Engine errors** are out-of-band and are returned as `Result`s from the
//!   operation that hit them: touching a closed subject, or a teardown that
//!   failed while a subscription was being disposed.
//!
//! User closures that can fail come in two flavours, e.g. `group_by` and
//! `try_group_by`. The `try_` flavour receives a closure returning
//! `Result<_, Err>` and turns an `Err` into a stream error on the affected
//! outputs instead of unwinding through the source.

use std::fmt;

use thiserror::Error;

/// The error payload produced by a failing teardown.
pub type BoxError = Box<dyn std::error::Error>;

/// Engine errors returned by subjects and subscriptions.
#[derive(Debug, Error)]
pub enum RxError {
  /// The subject or subscription was already unsubscribed.
  #[error("object unsubscribed")]
  ObjectUnsubscribed,
  /// `BehaviorSubject::value` was read after the subject errored.
  #[error("subject has errored")]
  SubjectErrored,
  #[error(transparent)]
  Unsubscription(#[from] UnsubscriptionError),
}

impl RxError {
  /// The teardown failures carried by this error, empty for the illegal-state
  /// variants.
  pub fn teardown_errors(&self) -> &[BoxError] {
    match self {
      RxError::Unsubscription(e) => &e.errors,
      _ => &[],
    }
  }
}

/// One or more teardowns failed while a subscription was being disposed.
///
/// Errors are kept in the order the teardowns ran. Aggregates produced by
/// nested subscriptions are flattened into this list.
#[derive(Debug, Error)]
#[error("{} error(s) occurred during unsubscription:\n{}", .errors.len(), describe(.errors))]
pub struct UnsubscriptionError {
  pub errors: Vec<BoxError>,
}

impl UnsubscriptionError {
  pub fn new(errors: Vec<BoxError>) -> Self { Self { errors } }

  pub(crate) fn flatten(errors: Vec<BoxError>) -> Self {
    let mut flat = Vec::with_capacity(errors.len());
    for err in errors {
      match err.downcast::<UnsubscriptionError>() {
        Ok(nested) => flat.extend(nested.errors),
        Err(err) => match err.downcast::<RxError>() {
          Ok(rx) => match *rx {
            RxError::Unsubscription(nested) => flat.extend(nested.errors),
            other => flat.push(Box::new(other)),
          },
          Err(err) => flat.push(err),
        },
      }
    }
    Self { errors: flat }
  }
}

fn describe(errors: &[BoxError]) -> String {
  errors
    .iter()
    .enumerate()
    .map(|(i, e)| format!("{}) {}", i + 1, e))
    .collect::<Vec<_>>()
    .join("\n  ")
}

/// A teardown failure carrying only a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownError(pub String);

impl fmt::Display for TeardownError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl std::error::Error for TeardownError {}

impl From<&str> for TeardownError {
  fn from(msg: &str) -> Self { TeardownError(msg.to_owned()) }
}
