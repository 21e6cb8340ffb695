use crate::{observable::Observable, observer::Observer};

/// A reified stream event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Notification<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
  Next,
  Error,
  Complete,
}

impl<Item, Err> Notification<Item, Err> {
  #[inline]
  pub fn kind(&self) -> NotificationKind {
    match self {
      Notification::Next(_) => NotificationKind::Next,
      Notification::Error(_) => NotificationKind::Error,
      Notification::Complete => NotificationKind::Complete,
    }
  }

  /// True only for `Next`.
  #[inline]
  pub fn has_value(&self) -> bool { matches!(self, Notification::Next(_)) }

  #[inline]
  pub fn is_terminal(&self) -> bool { !self.has_value() }

  pub fn value(&self) -> Option<&Item> {
    match self {
      Notification::Next(v) => Some(v),
      _ => None,
    }
  }

  pub fn as_ref(&self) -> Notification<&Item, &Err> {
    match self {
      Notification::Next(v) => Notification::Next(v),
      Notification::Error(e) => Notification::Error(e),
      Notification::Complete => Notification::Complete,
    }
  }

  pub fn map<T>(self, f: impl FnOnce(Item) -> T) -> Notification<T, Err> {
    match self {
      Notification::Next(v) => Notification::Next(f(v)),
      Notification::Error(e) => Notification::Error(e),
      Notification::Complete => Notification::Complete,
    }
  }

  /// Delivers this notification to `observer`.
  pub fn observe<O>(self, observer: &mut O)
  where
    O: Observer<Item, Err> + ?Sized,
  {
    match self {
      Notification::Next(v) => observer.next(v),
      Notification::Error(e) => observer.error(e),
      Notification::Complete => observer.complete(),
    }
  }

  /// Calls the handler matching this notification's kind.
  pub fn accept<R>(
    self, next: impl FnOnce(Item) -> R, error: impl FnOnce(Err) -> R, complete: impl FnOnce() -> R,
  ) -> R {
    match self {
      Notification::Next(v) => next(v),
      Notification::Error(e) => error(e),
      Notification::Complete => complete(),
    }
  }
}

impl<Item, Err> Notification<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  /// A one-shot observable replaying this notification. `Next` is followed
  /// by completion.
  pub fn to_observable(&self) -> Observable<Item, Err> {
    let notification = self.clone();
    Observable::new(move |mut subscriber| {
      match notification.clone() {
        Notification::Next(v) => {
          subscriber.next(v);
          subscriber.complete();
        }
        other => other.observe(&mut subscriber),
      }
    })
  }
}
