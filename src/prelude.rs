//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Configuration and errors
pub use crate::config::{self, UnhandledError};
pub use crate::error::{RxError, TeardownError, UnsubscriptionError};
// Notifications
pub use crate::notification::{Notification, NotificationKind};
// Observables and creation functions
pub use crate::observable::{
  create, empty, from_iter, interval, never, of, throw_error, timer, ConnectableObservable,
  Observable, Operator,
};
// Observer and adapters
pub use crate::observer::{AllObserver, ErrObserver, FnMutObserver, NoopObserver, Observer};
// Operators with public types
pub use crate::ops::group_by::{GroupBy, GroupedObservable};
// Schedulers
pub use crate::scheduler::{
  marble::{Literal, MarbleError, MarbleOptions, MarbleValues, SubscriptionLog, TestMessage},
  Duration, ImmediateScheduler, Scheduler, Task, TaskState, TestScheduler, VirtualTimeScheduler,
};
// Subjects
pub use crate::subject::{
  AnonymousSubject, AsyncSubject, BehaviorSubject, ReplaySubject, Subject, SubjectLike,
};
// Subscriptions
pub use crate::subscriber::Subscriber;
pub use crate::subscription::{Subscription, SubscriptionGuard, TeardownLogic};
