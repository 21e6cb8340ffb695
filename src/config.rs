//! Runtime configuration and the unhandled-error reporter.
//!
//! The engine is single threaded, so configuration is per thread: every
//! thread starts from [`Config::default`] and tests reset it through
//! [`reset`].

use std::{any::Any, cell::RefCell, fmt, rc::Rc};

/// Callback invoked for errors nobody is listening to.
pub type UnhandledErrorHandler = Rc<dyn Fn(UnhandledError)>;

#[derive(Clone, Default)]
pub struct Config {
  /// Legacy mode: an unhandled error panics at the point it is raised instead
  /// of being reported.
  pub use_deprecated_synchronous_error_handling: bool,
  /// Receives every unhandled error. When unset the error is logged through
  /// `log::error!`.
  pub on_unhandled_error: Option<UnhandledErrorHandler>,
}

impl fmt::Debug for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Config")
      .field(
        "use_deprecated_synchronous_error_handling",
        &self.use_deprecated_synchronous_error_handling,
      )
      .field("on_unhandled_error", &self.on_unhandled_error.is_some())
      .finish()
  }
}

thread_local! {
  static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// A copy of the current thread's configuration.
pub fn get() -> Config { CONFIG.with(|c| c.borrow().clone()) }

pub fn set(config: Config) { CONFIG.with(|c| *c.borrow_mut() = config); }

pub fn update(f: impl FnOnce(&mut Config)) { CONFIG.with(|c| f(&mut c.borrow_mut())); }

pub fn reset() { set(Config::default()); }

/// Installs `handler` as the unhandled-error reporter.
pub fn on_unhandled_error(handler: impl Fn(UnhandledError) + 'static) {
  update(|c| c.on_unhandled_error = Some(Rc::new(handler)));
}

/// An error that reached the end of a chain without a handler.
pub struct UnhandledError {
  payload: Box<dyn Any>,
  type_name: &'static str,
  message: Option<String>,
}

impl UnhandledError {
  pub fn type_name(&self) -> &'static str { self.type_name }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> { self.payload.downcast_ref() }

  pub fn into_inner(self) -> Box<dyn Any> { self.payload }
}

impl fmt::Debug for UnhandledError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.message {
      Some(msg) => write!(f, "UnhandledError<{}>({})", self.type_name, msg),
      None => write!(f, "UnhandledError<{}>", self.type_name),
    }
  }
}

impl fmt::Display for UnhandledError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.message {
      Some(msg) => f.write_str(msg),
      None => write!(f, "unhandled error of type {}", self.type_name),
    }
  }
}

/// Routes an error that cannot be returned to a caller.
///
/// The handler is looked up and released before it runs, so a handler may
/// itself change the configuration.
pub fn report_unhandled_error<E: Any>(err: E) {
  let config = get();
  let type_name = std::any::type_name::<E>();
  let message = describe(&err);
  if config.use_deprecated_synchronous_error_handling {
    match message {
      Some(msg) => panic!("unhandled error: {msg}"),
      None => panic!("unhandled error of type {type_name}"),
    }
  }
  let unhandled = UnhandledError { payload: Box::new(err), type_name, message };
  match config.on_unhandled_error {
    Some(handler) => handler(unhandled),
    None => log::error!("{unhandled}"),
  }
}

fn describe(err: &dyn Any) -> Option<String> {
  if let Some(s) = err.downcast_ref::<&'static str>() {
    Some((*s).to_owned())
  } else if let Some(s) = err.downcast_ref::<String>() {
    Some(s.clone())
  } else if let Some(e) = err.downcast_ref::<crate::error::RxError>() {
    Some(e.to_string())
  } else {
    err
      .downcast_ref::<crate::error::UnsubscriptionError>()
      .map(|e| e.to_string())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;

  #[rxengine_macro::test]
  fn handler_receives_payload() {
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    on_unhandled_error(move |e| {
      c_seen.borrow_mut().push(*e.downcast_ref::<i32>().unwrap());
    });
    report_unhandled_error(7);
    report_unhandled_error(9);
    assert_eq!(*seen.borrow(), vec![7, 9]);
  }

  #[rxengine_macro::test]
  fn without_handler_it_only_logs() {
    report_unhandled_error("boom");
    assert!(get().on_unhandled_error.is_none());
  }

  #[rxengine_macro::test]
  #[should_panic(expected = "unhandled error: boom")]
  fn legacy_mode_panics() {
    update(|c| c.use_deprecated_synchronous_error_handling = true);
    report_unhandled_error("boom");
  }

  #[rxengine_macro::test]
  fn display_uses_message_when_known() {
    let seen = Rc::new(RefCell::new(String::new()));
    let c_seen = seen.clone();
    on_unhandled_error(move |e| *c_seen.borrow_mut() = e.to_string());
    report_unhandled_error(String::from("bad thing"));
    assert_eq!(*seen.borrow(), "bad thing");
  }
}
