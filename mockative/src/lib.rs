// vim: tw=80
//! The runtime of a record-and-verify mock object library.
//!
//! Mockative mocks are programmed the way they are used: by calling them.
//! Inside an [`every`] block, a call on a mock doesn't run.  It is recorded
//! as a pattern, and the returned [`Stubbing`] decides what matching calls
//! will answer.  Inside a [`verify`](fn@verify) block the recorded pattern is
//! instead counted against the calls that the mock has already received.
//!
//! This crate holds the engine that makes that work: the per-thread channel
//! that carries argument matchers to the call they belong to, the global
//! registry of mock state, expectation matching and verification.  Mock types
//! themselves are thin: they embed a [`Mock`] and route each method through
//! [`Mock::call`].
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Answers`](#answers)
//! * [`Verification`](#verification)
//! * [`Async methods`](#async-methods)
//! * [`Disposal`](#disposal)
//! * [`Crate features`](#crate-features)
//!
//! ## Getting Started
//! ```
//! use mockative::*;
//!
//! trait GitHubApi {
//!     fn repository(&self, id: String) -> Option<String>;
//! }
//!
//! static REPOSITORY: MethodSignature =
//!     MethodSignature::blocking("repository", &["String"]);
//!
//! struct MockGitHubApi(Mock);
//!
//! impl GitHubApi for MockGitHubApi {
//!     fn repository(&self, id: String) -> Option<String> {
//!         self.0.call(&REPOSITORY, args![id])
//!     }
//! }
//!
//! impl Mockable for MockGitHubApi {
//!     fn mock(&self) -> &Mock {
//!         &self.0
//!     }
//! }
//!
//! let api = MockGitHubApi(Mock::new());
//! every(|| api.repository(any()))
//!     .returns(Some("mockative".to_owned()));
//! assert_eq!(Some("mockative".to_owned()), api.repository("0".to_owned()));
//! verify(|| api.repository(eq("0".to_owned()))).was_invoked(once());
//! ```
//!
//! When several expectations match a call, the one added last wins.  A strict
//! mock, the default, panics when a call matches none.
//!
//! ## Matching arguments
//!
//! Arguments passed to a recorded call as plain values must be equal to those
//! of a matching call.  Matcher functions loosen that:
//!
//! * [`any`] and [`any_with`] match anything.
//! * [`eq`] matches an equal value.
//! * [`matching`] matches values accepted by a [`Predicate`].
//! * [`that`] matches values for which a closure returns true.
//! * [`capture`] matches anything and records it in a [`Capture`].
//!
//! Matchers and plain values can't be mixed in one call: either every
//! argument gets a matcher, or none does.
//!
//! ```
//! # use mockative::*;
//! # static THING: MethodSignature =
//! #     MethodSignature::blocking("thing", &["String", "u32"]);
//! # struct MockThing(Mock);
//! # impl MockThing {
//! #     fn thing(&self, name: String, n: u32) -> u32 {
//! #         self.0.call(&THING, args![name, n])
//! #     }
//! # }
//! let mock = MockThing(Mock::new());
//! every(|| mock.thing(any(), matching(predicate::gt(10u32)))).returns(1);
//! every(|| mock.thing(eq("x".to_owned()), that(|n: &u32| n % 2 == 0)))
//!     .returns(2);
//! assert_eq!(1, mock.thing("y".to_owned(), 11));
//! assert_eq!(2, mock.thing("x".to_owned(), 12));
//!
//! let seen = Capture::<u32>::new();
//! every(|| mock.thing(any(), capture(&seen))).returns(3);
//! mock.thing("z".to_owned(), 5);
//! assert_eq!(Some(5), seen.value());
//! ```
//!
//! ## Answers
//!
//! A [`Stubbing`] can [`returns`](Stubbing::returns) a value,
//! [`returns_many`](Stubbing::returns_many) in turn,
//! [`throws`](Stubbing::throws) a panic payload, or
//! [`invokes`](Stubbing::invokes) a callback with the call's [`Arguments`].
//! Callbacks, like the predicates given to [`that`] and [`matching`], run
//! without any of the engine's locks held, so they may call mocks too.
//!
//! ## Verification
//!
//! [`Verification::was_invoked`] takes a quantifier: [`exactly`],
//! [`at_least`], [`at_most`], [`never`], [`once`] or [`twice`].  Every call
//! that a verification matches is marked as verified.
//! [`verify_no_unverified_expectations`] then fails if any call of a mock
//! escaped verification, and [`verify_no_unmet_expectations`] fails if any of
//! its expectations was never used.
//!
//! ## Async methods
//!
//! `async` mocked methods are recorded with [`co_every`] and [`co_verify`],
//! which await the recorded block.
//!
//! ```
//! # use mockative::*;
//! # use futures::executor::block_on;
//! static FETCH: MethodSignature = MethodSignature::suspend("fetch", &["u32"]);
//! struct MockClient(Mock);
//! impl MockClient {
//!     async fn fetch(&self, id: u32) -> String {
//!         self.0.call(&FETCH, args![id])
//!     }
//! }
//!
//! let client = MockClient(Mock::new());
//! block_on(async {
//!     co_every(|| client.fetch(any())).await.returns("body".to_owned());
//!     assert_eq!("body", client.fetch(1).await);
//!     co_verify(|| client.fetch(1)).await.was_invoked(once());
//! });
//! ```
//!
//! ## Disposal
//!
//! A mock's expectations and history live in a global registry until the
//! mock is dropped, or until they are removed with [`dispose`] or
//! [`dispose_all`].  A disposed mock can be used again; it starts over with
//! no expectations.
//!
//! ## Crate features
//!
//! * `nightly` - Lets relaxed mocks answer unstubbed calls with a default
//!   value from [`Mock::call`], for any return type that implements
//!   `Default`.  Requires a nightly compiler.  On stable, relaxed mocks use
//!   [`Mock::call_or_default`] instead.
//!
//! Recording relies on unwinding, so code using this crate must not be built
//! with `panic = "abort"`.

#![cfg_attr(feature = "nightly", feature(specialization))]

use futures::FutureExt;
use std::{
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::{Mutex, MutexGuard, PoisonError}
};

pub mod channel;
mod error;
mod invocation;
mod matcher;
mod mock;
pub mod registry;
mod state;
mod stub;
mod verify;

pub use predicates::prelude::{Predicate, PredicateBooleanExt, predicate};

pub use channel::{Recording, declare_matcher};
pub use error::Error;
pub use invocation::{
    Arguments,
    CallKind,
    Invocation,
    MethodSignature,
    MockId,
    on_call
};
pub use matcher::{
    ArgumentMatcher,
    ArgumentPredicate,
    Capture,
    CaptureSink,
    Value,
    any,
    any_with,
    capture,
    capture_with,
    eq,
    matching,
    that
};
pub use mock::{
    DefaultReturner,
    Mock,
    MockBuilder,
    MockConfig,
    Mockable,
    ReturnDefault,
    Strictness
};
pub use state::{Expectation, InvocationRecord, MockState, Resolution};
pub use stub::{AnyAction, Stubbing};
pub use verify::{
    Times,
    Verification,
    VerificationFailure,
    at_least,
    at_most,
    count_matches,
    exactly,
    never,
    once,
    twice
};

/// Build the argument list of a mocked call.
///
/// Each argument must be `PartialEq + Debug + Send + Sync`.  Arguments that
/// aren't, like closures, are passed with an explicit
/// [`Value::opaque`] or [`Value::local`] in a plain `vec!` instead.
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::new($arg)),+]
    };
}

/// Lock a mutex, ignoring poison.
///
/// A test that panics while holding one of the engine's locks must not break
/// every test that follows it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record<O, F: FnOnce() -> O>(f: F) -> Result<Invocation, Error> {
    let mut recording = Recording::begin()?;
    let outcome = recording.scope(|| panic::catch_unwind(AssertUnwindSafe(f)));
    recording.finish(outcome)
}

async fn co_record<Fut, F>(f: F) -> Result<Invocation, Error>
    where F: FnOnce() -> Fut, Fut: Future
{
    let mut recording = Recording::begin()?;
    let outcome = match recording.scope(|| {
        panic::catch_unwind(AssertUnwindSafe(f))
    }) {
        Ok(fut) => recording
            .scope_future(AssertUnwindSafe(fut).catch_unwind())
            .await
            .map(drop),
        Err(payload) => Err(payload)
    };
    recording.finish(outcome)
}

/// Record the single mock call made by `f` and start stubbing it.
///
/// # Panics
///
/// If `f` doesn't call a mock, or declares argument matchers for only some
/// of the call's arguments.
#[track_caller]
pub fn every<O: 'static, F: FnOnce() -> O>(f: F) -> Stubbing<O> {
    try_every(f).unwrap_or_else(|e| panic!("{}", e))
}

/// Like [`every`], but return an error instead of panicking.
pub fn try_every<O: 'static, F: FnOnce() -> O>(f: F)
    -> Result<Stubbing<O>, Error>
{
    record(f).map(Stubbing::new)
}

/// Record the single mock call awaited by the future that `f` returns, and
/// start stubbing it.
///
/// The recording is confined to the current thread, so the returned future
/// isn't `Send`.  It is only installed while the future is being polled:
/// other tasks on the same thread keep calling their mocks normally while it
/// is suspended.  Dropping it before completion ends the recording.
///
/// # Panics
///
/// Like [`every`].
pub async fn co_every<O, Fut, F>(f: F) -> Stubbing<O>
    where O: 'static, F: FnOnce() -> Fut, Fut: Future<Output = O>
{
    match co_record(f).await {
        Ok(pattern) => Stubbing::new(pattern),
        Err(e) => panic!("{}", e)
    }
}

/// Record the single mock call made by `f`, to be checked against the calls
/// that mock has already received.
///
/// # Panics
///
/// Like [`every`].
#[track_caller]
pub fn verify<O, F: FnOnce() -> O>(f: F) -> Verification {
    try_verify(f).unwrap_or_else(|e| panic!("{}", e))
}

/// Like [`verify`](fn@verify), but return an error instead of panicking.
pub fn try_verify<O, F: FnOnce() -> O>(f: F) -> Result<Verification, Error> {
    record(f).map(Verification::new)
}

/// The `async` counterpart of [`verify`](fn@verify).
pub async fn co_verify<Fut, F>(f: F) -> Verification
    where F: FnOnce() -> Fut, Fut: Future
{
    match co_record(f).await {
        Ok(pattern) => Verification::new(pattern),
        Err(e) => panic!("{}", e)
    }
}

/// Remove the expectations and history of `mock`.
///
/// Returns `true` if there were any to remove.  The mock remains usable.
pub fn dispose(mock: &impl Mockable) -> bool {
    registry::global().dispose(mock.mock().id())
}

/// Remove the expectations and history of every mock.
pub fn dispose_all() {
    registry::global().dispose_all()
}

/// Assert that every call `mock` has received was matched by a verification.
///
/// # Panics
///
/// Listing the unverified calls, if there were any.
#[track_caller]
pub fn verify_no_unverified_expectations(mock: &impl Mockable) {
    if let Some(state) = registry::global().get(mock.mock().id()) {
        if let Err(e) = state.confirm_verified() {
            panic!("{}", e);
        }
    }
}

/// Assert that every expectation of `mock` matched at least one call.
///
/// # Panics
///
/// Listing the unused expectations, if there were any.
#[track_caller]
pub fn verify_no_unmet_expectations(mock: &impl Mockable) {
    if let Some(state) = registry::global().get(mock.mock().id()) {
        if let Err(e) = state.verify_no_unmet_expectations() {
            panic!("{}", e);
        }
    }
}
