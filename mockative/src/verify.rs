// vim: tw=80
//! Counting recorded calls against a pattern.

use std::{error, fmt};

use crate::{
    Error,
    invocation::Invocation,
    registry,
    state::InvocationRecord
};

/// How many times a pattern is expected to have been called.
///
/// # Examples
/// ```
/// # use mockative::*;
/// assert!(at_least(2).is_satisfied_by(3));
/// assert!(!never().is_satisfied_by(1));
/// assert_eq!("at most 1 time", at_most(1).to_string());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Times {
    Exactly(usize),
    AtLeast(usize),
    AtMost(usize),
}

impl Times {
    pub fn is_satisfied_by(&self, n: usize) -> bool {
        match *self {
            Times::Exactly(k) => n == k,
            Times::AtLeast(k) => n >= k,
            Times::AtMost(k) => n <= k
        }
    }
}

fn times(k: usize) -> &'static str {
    if k == 1 { "time" } else { "times" }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Times::Exactly(0) => f.write_str("never"),
            Times::Exactly(k) => write!(f, "exactly {} {}", k, times(k)),
            Times::AtLeast(k) => write!(f, "at least {} {}", k, times(k)),
            Times::AtMost(k) => write!(f, "at most {} {}", k, times(k)),
        }
    }
}

pub fn exactly(k: usize) -> Times {
    Times::Exactly(k)
}

pub fn at_least(k: usize) -> Times {
    Times::AtLeast(k)
}

pub fn at_most(k: usize) -> Times {
    Times::AtMost(k)
}

pub fn never() -> Times {
    Times::Exactly(0)
}

pub fn once() -> Times {
    Times::Exactly(1)
}

pub fn twice() -> Times {
    Times::Exactly(2)
}

/// Count the calls in `history` that satisfy `pattern`.
///
/// Pure: capturing matchers record nothing.
pub fn count_matches<'a, I>(history: I, pattern: &Invocation) -> usize
    where I: IntoIterator<Item = &'a Invocation>
{
    history.into_iter()
        .filter(|i| pattern.matches(i))
        .count()
}

/// A verification that didn't hold.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationFailure {
    /// The pattern that was verified
    pub pattern: String,
    pub times: Times,
    /// How many recorded calls matched
    pub actual: usize,
    /// Calls of the same method that didn't match, each with the reasons
    pub competing: Vec<String>,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Expected {} to be called {}, but it was called {} {}",
               self.pattern, self.times, self.actual, times(self.actual))?;
        if !self.competing.is_empty() {
            f.write_str("\nOther calls of the same method:")?;
            for line in self.competing.iter().flat_map(|c| c.lines()) {
                write!(f, "\n    {}", line)?;
            }
        }
        Ok(())
    }
}

impl error::Error for VerificationFailure {}

/// Check a recorded history against `pattern`, marking every matching record
/// as verified.
pub(crate) fn evaluate(history: &mut [InvocationRecord],
                       pattern: &Invocation,
                       times: Times) -> Result<usize, VerificationFailure>
{
    let mut actual = 0;
    for record in history.iter_mut() {
        if pattern.matches(&record.invocation) {
            record.invocation.capture_into(pattern);
            record.verified = true;
            actual += 1;
        }
    }
    if times.is_satisfied_by(actual) {
        return Ok(actual);
    }
    let competing = history.iter()
        .filter(|r| r.invocation.method() == pattern.method())
        .filter(|r| !pattern.matches(&r.invocation))
        .map(|r| {
            let mut s = r.invocation.to_string();
            for reason in pattern.explain(&r.invocation) {
                s.push_str("\n    ");
                s.push_str(&reason.replace('\n', "\n    "));
            }
            s
        }).collect();
    Err(VerificationFailure {
        pattern: pattern.to_string(),
        times,
        actual,
        competing
    })
}

/// A recorded call, waiting to be checked against the mock's history.
///
/// Returned by [`verify`](fn@crate::verify) and
/// [`co_verify`](crate::co_verify).
#[must_use = "Verification does nothing until it's checked"]
pub struct Verification {
    pattern: Invocation,
}

impl Verification {
    pub(crate) fn new(pattern: Invocation) -> Self {
        Verification{pattern}
    }

    /// Count the matching calls, returning an error unless `times` is
    /// satisfied.
    ///
    /// Matching calls are marked as verified either way.
    pub fn check(&self, times: Times) -> Result<usize, Error> {
        registry::global()
            .state_for(self.pattern.mock())
            .verify(&self.pattern, times)
    }

    pub fn pattern(&self) -> &Invocation {
        &self.pattern
    }

    /// Assert that the call was made as often as `times` says.
    ///
    /// # Panics
    ///
    /// With a description of the failure, if it wasn't.
    #[track_caller]
    pub fn was_invoked(&self, times: Times) {
        if let Err(e) = self.check(times) {
            panic!("{}", e);
        }
    }

    /// Assert that the call was made at least once.
    #[track_caller]
    pub fn was_invoked_once(&self) {
        self.was_invoked(at_least(1))
    }

    #[track_caller]
    pub fn was_not_invoked(&self) {
        self.was_invoked(never())
    }
}
