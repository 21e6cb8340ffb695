//! # rxengine: a single-threaded reactive subscription engine
//!
//! Observables, subjects, multicasting and a virtual-time scheduler with
//! marble-diagram testing, in the style of [Reactive Extensions](http://reactivex.io/).
//!
//! ## Quick Start
//!
//! ```rust
//! use rxengine::prelude::*;
//!
//! from_iter::<_, (), _>(0..10)
//!   .filter(|v| v % 2 == 0)
//!   .map(|v| v * 2)
//!   .subscribe(|v| println!("Value: {}", v));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | A lazy subscribe function; operators are methods on it |
//! | [`Subscriber`] | The sink handed to a subscribe function |
//! | [`Subscription`] | A node of the disposal tree; unsubscribing it tears down its subtree |
//! | [`Subject`] | Both observable and observer, multicasting to its subscribers |
//! | [`TestScheduler`] | Virtual time plus marble diagrams for deterministic tests |
//!
//! Everything is single threaded: subscriptions live in a thread-local arena
//! and the [`config`] is per thread.
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): a [`Scheduler`] implementation for
//!   the `futures` local pool, with real-time delays.
//!
//! [`Observable`]: observable::Observable
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`Subject`]: subject::Subject
//! [`TestScheduler`]: scheduler::TestScheduler
//! [`Scheduler`]: scheduler::Scheduler

extern crate self as rxengine;

pub mod config;
pub mod error;
pub mod notification;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub mod subject;
pub mod subscriber;
pub mod subscription;

pub use prelude::*;
