// vim: tw=80
//! Argument values and the matchers that compare them.

use std::{
    any::{self, Any},
    fmt::{self, Debug, Display},
    marker::PhantomData,
    sync::{Arc, Mutex}
};

use fragile::Fragile;
use predicates::prelude::{Predicate, predicate};
use predicates_tree::CaseTreeExt;

use crate::{channel, lock};

/// Type-erased argument storage.
trait Argument: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_arg(&self, other: &dyn Argument) -> bool;
    fn fmt_arg(&self, f: &mut fmt::Formatter) -> fmt::Result;
    fn type_name(&self) -> &'static str;
}

struct Comparable<T>(T);

impl<T> Argument for Comparable<T>
    where T: PartialEq + Debug + Send + Sync + 'static
{
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn eq_arg(&self, other: &dyn Argument) -> bool {
        other.as_any()
            .downcast_ref::<T>()
            .is_some_and(|o| self.0 == *o)
    }

    fn fmt_arg(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// A value that has neither equality nor a textual form, like a closure.
struct Opaque<T>(T);

impl<T: Send + Sync + 'static> Argument for Opaque<T> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn eq_arg(&self, _other: &dyn Argument) -> bool {
        false
    }

    fn fmt_arg(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", any::type_name::<T>())
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// A value that can't leave the thread that created it.
struct Local<T>(Fragile<T>);

impl<T: 'static> Argument for Local<T> {
    fn as_any(&self) -> &dyn Any {
        match self.0.try_get() {
            Ok(v) => v,
            // Looks like a value of no argument type at all
            Err(_) => &()
        }
    }

    fn eq_arg(&self, _other: &dyn Argument) -> bool {
        false
    }

    fn fmt_arg(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", any::type_name::<T>())
    }

    fn type_name(&self) -> &'static str {
        any::type_name::<T>()
    }
}

/// One argument of a call.
///
/// Cloning a `Value` is cheap; clones share the underlying argument.
#[derive(Clone)]
pub struct Value(Arc<dyn Argument>);

impl Value {
    /// Wrap an argument that can be compared and printed.
    pub fn new<T>(v: T) -> Self
        where T: PartialEq + Debug + Send + Sync + 'static
    {
        Value(Arc::new(Comparable(v)))
    }

    /// Wrap an argument that can't be compared, like a closure.
    ///
    /// An opaque value never equals anything, not even itself, so it can
    /// only be matched by wildcards, captures and predicates.
    pub fn opaque<T: Send + Sync + 'static>(v: T) -> Self {
        Value(Arc::new(Opaque(v)))
    }

    /// Wrap an opaque argument that isn't `Send`.
    ///
    /// It can only be downcast on the thread that wrapped it.  Like the
    /// callback given to [`invokes_st`](crate::Stubbing::invokes_st), it must
    /// also be dropped on that thread, which means disposing of its mock
    /// there.
    pub fn local<T: 'static>(v: T) -> Self {
        Value(Arc::new(Local(Fragile::new(v))))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt_arg(f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.0.eq_arg(other.0.as_ref())
    }
}

/// Where a capturing matcher stores what it sees.
pub trait CaptureSink: Send + Sync {
    fn record(&self, v: &Value);
}

impl<T: Clone + Send + 'static> CaptureSink for Mutex<Vec<T>> {
    fn record(&self, v: &Value) {
        if let Some(t) = v.downcast_ref::<T>() {
            lock(self).push(t.clone());
        }
    }
}

/// Collects the arguments matched by a [`capture`] matcher.
///
/// Clones share storage, so a `Capture` may be handed to the matcher and read
/// back afterwards.
///
/// # Examples
/// ```
/// # use mockative::*;
/// let c = Capture::<u32>::new();
/// assert!(c.is_empty());
/// assert_eq!(None, c.value());
/// ```
pub struct Capture<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Capture<T> {
    pub fn new() -> Self {
        Capture{values: Arc::new(Mutex::new(Vec::new()))}
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.values).is_empty()
    }

    /// A matcher that accepts anything and records it here.
    pub fn matcher(&self) -> ArgumentMatcher {
        ArgumentMatcher::Capturing(self.values.clone())
    }

    /// The most recently captured value.
    pub fn value(&self) -> Option<T> {
        lock(&self.values).last().cloned()
    }

    /// Every captured value, oldest first.
    pub fn values(&self) -> Vec<T> {
        lock(&self.values).clone()
    }
}

impl<T> Clone for Capture<T> {
    fn clone(&self) -> Self {
        Capture{values: self.values.clone()}
    }
}

impl<T: Clone + Send + 'static> Default for Capture<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A type-erased predicate over one argument.
pub trait ArgumentPredicate: Display + Send + Sync {
    fn eval(&self, v: &Value) -> bool;

    /// Render the predicate's case tree for a value it rejects.
    fn explain(&self, v: &Value) -> Option<String>;
}

struct TypedPredicate<P, T> {
    pred: P,
    _t: PhantomData<fn(&T)>,
}

impl<P, T> Display for TypedPredicate<P, T> where P: Display {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.pred, f)
    }
}

impl<P, T> ArgumentPredicate for TypedPredicate<P, T>
    where P: Predicate<T> + Send + Sync, T: 'static
{
    fn eval(&self, v: &Value) -> bool {
        v.downcast_ref::<T>().is_some_and(|t| self.pred.eval(t))
    }

    fn explain(&self, v: &Value) -> Option<String> {
        match v.downcast_ref::<T>() {
            None => Some(format!("expected a {}, got a {}",
                                 any::type_name::<T>(), v.type_name())),
            Some(t) => self.pred.find_case(false, t)
                .map(|case| case.tree().to_string())
        }
    }
}

/// What an argument position of a pattern accepts.
#[derive(Clone)]
pub enum ArgumentMatcher {
    /// Synthesized for arguments passed without a matcher.  Matches an equal
    /// value.
    Literal(Value),
    /// Matches anything.
    Wildcard,
    /// Matches anything and records it.
    Capturing(Arc<dyn CaptureSink>),
    /// Matches an equal value.
    Equals(Value),
    /// Matches values the predicate accepts.
    Predicate(Arc<dyn ArgumentPredicate>),
}

impl ArgumentMatcher {
    /// A matcher that accepts values for which `p` holds.
    pub fn predicate<T, P>(p: P) -> Self
        where T: 'static, P: Predicate<T> + Send + Sync + 'static
    {
        ArgumentMatcher::Predicate(Arc::new(TypedPredicate {
            pred: p,
            _t: PhantomData::<fn(&T)>
        }))
    }

    pub(crate) fn capture(&self, v: &Value) {
        if let ArgumentMatcher::Capturing(sink) = self {
            sink.record(v);
        }
    }

    pub(crate) fn explain(&self, v: &Value) -> Option<String> {
        match self {
            ArgumentMatcher::Predicate(p) => p.explain(v),
            _ => None
        }
    }

    pub fn matches(&self, v: &Value) -> bool {
        match self {
            ArgumentMatcher::Literal(x) | ArgumentMatcher::Equals(x) => x == v,
            ArgumentMatcher::Wildcard | ArgumentMatcher::Capturing(_) => true,
            ArgumentMatcher::Predicate(p) => p.eval(v)
        }
    }
}

impl Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArgumentMatcher::Literal(v) => write!(f, "{:?}", v),
            ArgumentMatcher::Wildcard => f.write_str("any()"),
            ArgumentMatcher::Capturing(_) => f.write_str("capture()"),
            ArgumentMatcher::Equals(v) => write!(f, "eq({:?})", v),
            ArgumentMatcher::Predicate(p) => write!(f, "matching({})", p)
        }
    }
}

/// Match any argument.
///
/// Only usable inside [`every`](crate::every) or [`verify`](fn@crate::verify),
/// where it stands in for one argument of the recorded call.  The argument's
/// type must implement `Default`; use [`any_with`] otherwise.
pub fn any<T: Default>() -> T {
    channel::declare_matcher(ArgumentMatcher::Wildcard, T::default())
}

/// Like [`any`], but with an explicit placeholder for types that have no
/// `Default`, such as closures.
pub fn any_with<T>(placeholder: T) -> T {
    channel::declare_matcher(ArgumentMatcher::Wildcard, placeholder)
}

/// Match and record any argument.
pub fn capture<T>(sink: &Capture<T>) -> T
    where T: Clone + Default + Send + 'static
{
    channel::declare_matcher(sink.matcher(), T::default())
}

/// Like [`capture`], but with an explicit placeholder.
pub fn capture_with<T>(sink: &Capture<T>, placeholder: T) -> T
    where T: Clone + Send + 'static
{
    channel::declare_matcher(sink.matcher(), placeholder)
}

/// Match an argument equal to `expected`.
pub fn eq<T>(expected: T) -> T
    where T: Clone + PartialEq + Debug + Send + Sync + 'static
{
    let matcher = ArgumentMatcher::Equals(Value::new(expected.clone()));
    channel::declare_matcher(matcher, expected)
}

/// Match an argument accepted by a [`Predicate`].
///
/// # Examples
/// ```
/// # use mockative::*;
/// let placeholder: u32 = matching(predicate::gt(5u32));
/// assert_eq!(0, placeholder);
/// ```
pub fn matching<T, P>(p: P) -> T
    where T: Default + 'static, P: Predicate<T> + Send + Sync + 'static
{
    channel::declare_matcher(ArgumentMatcher::predicate(p), T::default())
}

/// Match an argument for which `f` returns true.
///
/// `f` may call mocks, including the one whose call it is matching.
pub fn that<T, F>(f: F) -> T
    where T: Default + Send + Sync + 'static,
          F: Fn(&T) -> bool + Send + Sync + 'static
{
    matching(predicate::function(f))
}
