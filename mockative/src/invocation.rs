// vim: tw=80
//! Calls, as the engine sees them.
//!
//! An [`Invocation`] is built once per intercepted call: either as a pattern,
//! while a recording is active, or as a live call that will be resolved
//! against the patterns stored for its mock.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering}
};

use crate::{
    Error,
    channel,
    matcher::{ArgumentMatcher, Value}
};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one mock object.
///
/// Two ids are equal only if they were handed out for the same mock.  Ids are
/// never reused, so a disposed mock's id can't collide with a newer mock.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MockId(u64);

impl MockId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        MockId(NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        MockId(raw)
    }
}

impl fmt::Display for MockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mock#{}", self.0)
    }
}

/// Whether a mocked method is an ordinary call or a suspending one.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CallKind {
    Blocking,
    Suspend,
}

/// Identifies one mockable method.
///
/// Mock types usually declare one `static` signature per method and pass it
/// to [`Mock::call`](crate::Mock::call).
///
/// # Examples
/// ```
/// # use mockative::*;
/// static THING: MethodSignature =
///     MethodSignature::blocking("thing", &["String", "u32"]);
/// assert_eq!(2, THING.arity());
/// assert_eq!("thing(String, u32)", THING.to_string());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MethodSignature {
    name: &'static str,
    params: &'static [&'static str],
    kind: CallKind,
}

impl MethodSignature {
    pub const fn new(name: &'static str,
                     params: &'static [&'static str],
                     kind: CallKind) -> Self
    {
        MethodSignature{name, params, kind}
    }

    /// Signature of an ordinary method.
    pub const fn blocking(name: &'static str,
                          params: &'static [&'static str]) -> Self
    {
        Self::new(name, params, CallKind::Blocking)
    }

    /// Signature of an `async` method.
    pub const fn suspend(name: &'static str,
                         params: &'static [&'static str]) -> Self
    {
        Self::new(name, params, CallKind::Suspend)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn kind(&self) -> CallKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.kind == CallKind::Suspend {
            f.write_str("async ")?;
        }
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// The arguments of a live call, as handed to
/// [`Stubbing::invokes`](crate::Stubbing::invokes) callbacks.
#[derive(Clone, Debug)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    /// Borrow the argument at `i` as a `T`.
    ///
    /// Returns `None` if there is no such argument, or it isn't a `T`.
    pub fn get<T: 'static>(&self, i: usize) -> Option<&T> {
        self.0.get(i).and_then(Value::downcast_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// One call: its mock, its method, and one matcher plus one value per
/// argument.
///
/// The value is the argument actually passed.  While recording it is only a
/// placeholder, and the matcher carries the meaning.
#[derive(Clone)]
pub struct Invocation {
    mock: MockId,
    method: &'static MethodSignature,
    arguments: Vec<(ArgumentMatcher, Value)>,
}

impl Invocation {
    /// Pair `args` with the matchers declared while they were evaluated.
    ///
    /// With no matchers, every argument must equal the recorded value.
    /// Otherwise there must be exactly one matcher per argument.
    pub fn build(mock: MockId,
                 method: &'static MethodSignature,
                 args: Vec<Value>,
                 matchers: Vec<ArgumentMatcher>) -> Result<Self, Error>
    {
        if args.len() != method.arity() {
            return Err(Error::ArgumentCountMismatch {
                method: method.to_string(),
                arity: method.arity(),
                arguments: args.len()
            });
        }
        if matchers.is_empty() {
            return Ok(Self::literal(mock, method, args));
        }
        if matchers.len() != args.len() {
            return Err(Error::MatcherArityMismatch {
                method: method.to_string(),
                arity: method.arity(),
                matchers: matchers.len()
            });
        }
        let arguments = matchers.into_iter().zip(args).collect();
        Ok(Invocation{mock, method, arguments})
    }

    /// An invocation that matches only these exact argument values.
    pub fn literal(mock: MockId,
                   method: &'static MethodSignature,
                   args: Vec<Value>) -> Self
    {
        let arguments = args.into_iter()
            .map(|v| (ArgumentMatcher::Literal(v.clone()), v))
            .collect();
        Invocation{mock, method, arguments}
    }

    pub fn arguments(&self) -> Arguments {
        Arguments(self.values().cloned().collect())
    }

    /// Record this invocation's values into any capturing matchers of
    /// `pattern`.
    pub(crate) fn capture_into(&self, pattern: &Invocation) {
        for ((m, _), v) in pattern.arguments.iter().zip(self.values()) {
            m.capture(v);
        }
    }

    /// Explain, one line per argument, why `actual` doesn't match this
    /// pattern.
    pub(crate) fn explain(&self, actual: &Invocation) -> Vec<String> {
        if !self.same_target(actual) {
            return vec![format!("{} is not a call of {}", actual, self)];
        }
        self.arguments.iter()
            .zip(actual.values())
            .enumerate()
            .filter(|(_, ((m, _), v))| !m.matches(v))
            .map(|(i, ((m, _), v))| {
                let mut line = format!("argument {}: expected {}, got {:?}",
                                       i, m, v);
                if let Some(tree) = m.explain(v) {
                    line.push('\n');
                    line.push_str(&tree);
                }
                line
            }).collect()
    }

    pub fn matchers(&self) -> impl Iterator<Item = &ArgumentMatcher> {
        self.arguments.iter().map(|(m, _)| m)
    }

    /// Does `actual` satisfy this invocation, used as a pattern?
    ///
    /// Every argument must satisfy the matcher at its position.  No
    /// capturing happens here.
    pub fn matches(&self, actual: &Invocation) -> bool {
        self.same_target(actual) &&
            self.matchers()
                .zip(actual.values())
                .all(|(m, v)| m.matches(v))
    }

    pub fn method(&self) -> &'static MethodSignature {
        self.method
    }

    pub fn mock(&self) -> MockId {
        self.mock
    }

    fn same_target(&self, other: &Invocation) -> bool {
        self.mock == other.mock &&
            self.method == other.method &&
            self.arguments.len() == other.arguments.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.arguments.iter().map(|(_, v)| v)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}(", self.mock, self.method.name)?;
        for (i, m) in self.matchers().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", m)?;
        }
        f.write_str(")")
    }
}

/// The intercept point of every mocked method while a recording is active.
///
/// Drains the matchers declared while `args` were evaluated and builds the
/// call's [`Invocation`].
pub fn on_call(mock: MockId,
               method: &'static MethodSignature,
               args: Vec<Value>) -> Result<Invocation, Error>
{
    let matchers = channel::drain_and_clear();
    Invocation::build(mock, method, args, matchers)
}
