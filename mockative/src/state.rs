// vim: tw=80
//! Per-mock expectations and call history.

use std::{
    collections::HashSet,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicU64, Ordering}
    }
};
use tracing::{debug, trace};

use crate::{
    Error,
    MockId,
    invocation::Invocation,
    lock,
    stub::AnyAction,
    verify::{self, Times}
};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// A stored pattern and the action to perform for calls that match it.
pub struct Expectation {
    pattern: Invocation,
    action: Arc<dyn AnyAction>,
}

impl Expectation {
    pub fn new(pattern: Invocation, action: Arc<dyn AnyAction>) -> Self {
        Expectation{pattern, action}
    }

    pub fn pattern(&self) -> &Invocation {
        &self.pattern
    }
}

/// One logged call.
#[derive(Clone)]
pub struct InvocationRecord {
    /// Position of this call among every call logged by this process
    pub sequence: u64,
    pub invocation: Invocation,
    /// Has any verification matched this call yet?
    pub verified: bool,
}

/// The outcome of resolving a live call.
pub enum Resolution {
    /// The action of the most recently added matching expectation
    Matched(Arc<dyn AnyAction>),
    Unmatched,
}

/// Everything the engine knows about one mock.
///
/// Expectations and history each have their own lock, and they are never held
/// together.  Matching runs on a snapshot taken under the lock, so neither is
/// held while user code runs: predicates, capture sinks, `Debug` impls and
/// actions may all call mocks, including this one.
pub struct MockState {
    id: MockId,
    expectations: Mutex<Vec<Arc<Expectation>>>,
    history: Mutex<Vec<InvocationRecord>>,
}

impl MockState {
    pub fn new(id: MockId) -> Self {
        MockState {
            id,
            expectations: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new())
        }
    }

    /// Store a new expectation.
    ///
    /// Older expectations with the same pattern are kept, but the new one
    /// shadows them.
    pub fn add_expectation(&self, expectation: Expectation) {
        lock(&self.expectations).push(Arc::new(expectation));
    }

    /// Fail if any logged call was never matched by a verification.
    pub fn confirm_verified(&self) -> Result<(), Error> {
        let unverified: Vec<String> = self.history().iter()
            .filter(|r| !r.verified)
            .map(|r| format!("#{} {}", r.sequence, r.invocation))
            .collect();
        if unverified.is_empty() {
            Ok(())
        } else {
            Err(Error::UnverifiedInvocations {
                mock: self.id,
                invocations: unverified
            })
        }
    }

    fn expectations(&self) -> Vec<Arc<Expectation>> {
        lock(&self.expectations).clone()
    }

    fn history(&self) -> Vec<InvocationRecord> {
        lock(&self.history).clone()
    }

    pub fn id(&self) -> MockId {
        self.id
    }

    /// Every call logged so far, oldest first.
    pub fn invocations(&self) -> Vec<Invocation> {
        lock(&self.history).iter()
            .map(|r| r.invocation.clone())
            .collect()
    }

    /// Find the action for a live call.
    ///
    /// Expectations are searched from the most recently added to the oldest.
    /// The call is logged whether or not one matches.
    pub fn resolve(&self, invocation: Invocation) -> Resolution {
        let selected = self.expectations().into_iter()
            .rev()
            .find(|e| e.pattern.matches(&invocation));
        let resolution = match selected {
            Some(e) => {
                trace!(%invocation, pattern = %e.pattern, "matched");
                invocation.capture_into(&e.pattern);
                Resolution::Matched(e.action.clone())
            },
            None => {
                debug!(%invocation, "no matching expectation");
                Resolution::Unmatched
            }
        };
        self.log(invocation);
        resolution
    }

    fn log(&self, invocation: Invocation) {
        let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        lock(&self.history).push(InvocationRecord {
            sequence,
            invocation,
            verified: false
        });
    }

    /// Check that the number of logged calls matching `pattern` satisfies
    /// `times`.
    ///
    /// Every matching call is marked as verified, and fed to the pattern's
    /// capturing matchers, whether or not the check passes.
    pub fn verify(&self, pattern: &Invocation, times: Times)
        -> Result<usize, Error>
    {
        let mut snapshot = self.history();
        let outcome = verify::evaluate(&mut snapshot, pattern, times);
        let matched: HashSet<u64> = snapshot.iter()
            .filter(|r| r.verified)
            .map(|r| r.sequence)
            .collect();
        lock(&self.history).iter_mut()
            .filter(|r| matched.contains(&r.sequence))
            .for_each(|r| r.verified = true);
        match &outcome {
            Ok(n) => debug!(%pattern, %times, actual = n, "verified"),
            Err(e) => debug!(%pattern, %times, "verification failed: {}", e)
        }
        outcome.map_err(Error::from)
    }

    /// Fail if any stored expectation matches none of the logged calls.
    pub fn verify_no_unmet_expectations(&self) -> Result<(), Error> {
        let expectations = self.expectations();
        let history = self.history();
        let unmet: Vec<String> = expectations.iter()
            .filter(|e| verify::count_matches(
                history.iter().map(|r| &r.invocation), &e.pattern) == 0)
            .map(|e| e.pattern.to_string())
            .collect();
        if unmet.is_empty() {
            Ok(())
        } else {
            Err(Error::UnmetExpectations{mock: self.id, expectations: unmet})
        }
    }
}

#[cfg(test)]
mod t {
    use pretty_assertions::assert_eq;
    use super::*;
    use crate::{
        MethodSignature,
        invocation::Arguments,
        matcher::{ArgumentMatcher, Value},
        stub::{Action, perform}
    };

    static GET: MethodSignature = MethodSignature::blocking("get", &["u32"]);

    fn returning(v: &'static str) -> Arc<dyn AnyAction> {
        Arc::new(Action::ReturnValue(Box::new(move || v)))
    }

    fn call(id: MockId, x: u32) -> Invocation {
        Invocation::literal(id, &GET, vec![Value::new(x)])
    }

    fn any_get(id: MockId) -> Invocation {
        Invocation::build(id, &GET, vec![Value::new(0u32)],
                          vec![ArgumentMatcher::Wildcard]).unwrap()
    }

    fn resolve(state: &MockState, x: u32) -> Option<&'static str> {
        let invocation = call(state.id(), x);
        let args: Arguments = invocation.arguments();
        match state.resolve(invocation.clone()) {
            Resolution::Matched(a) =>
                Some(perform::<&'static str>(&*a, &invocation, &args).unwrap()),
            Resolution::Unmatched => None
        }
    }

    #[test]
    fn last_definition_wins() {
        let state = MockState::new(MockId::next());
        state.add_expectation(Expectation::new(call(state.id(), 1),
                                               returning("first")));
        state.add_expectation(Expectation::new(call(state.id(), 1),
                                               returning("second")));
        assert_eq!(Some("second"), resolve(&state, 1));
    }

    #[test]
    fn newer_wildcard_shadows_older_literal() {
        let state = MockState::new(MockId::next());
        state.add_expectation(Expectation::new(call(state.id(), 1),
                                               returning("literal")));
        state.add_expectation(Expectation::new(any_get(state.id()),
                                               returning("any")));
        assert_eq!(Some("any"), resolve(&state, 1));
    }

    #[test]
    fn older_expectation_still_serves_what_newer_one_rejects() {
        let state = MockState::new(MockId::next());
        state.add_expectation(Expectation::new(any_get(state.id()),
                                               returning("any")));
        state.add_expectation(Expectation::new(call(state.id(), 1),
                                               returning("one")));
        assert_eq!(Some("one"), resolve(&state, 1));
        assert_eq!(Some("any"), resolve(&state, 2));
    }

    #[test]
    fn unmatched_calls_are_logged_too() {
        let state = MockState::new(MockId::next());
        assert_eq!(None, resolve(&state, 3));
        assert_eq!(1, state.invocations().len());
    }

    #[test]
    fn confirm_verified() {
        let state = MockState::new(MockId::next());
        resolve(&state, 1);
        resolve(&state, 2);
        state.verify(&call(state.id(), 1), Times::Exactly(1)).unwrap();
        let e = state.confirm_verified().unwrap_err();
        match e {
            Error::UnverifiedInvocations{invocations, ..} => {
                assert_eq!(1, invocations.len());
                assert!(invocations[0].ends_with(".get(2)"));
            },
            _ => panic!("Unexpected error {}", e)
        }
        state.verify(&any_get(state.id()), Times::AtLeast(1)).unwrap();
        state.confirm_verified().unwrap();
    }

    #[test]
    fn unmet_expectations() {
        let state = MockState::new(MockId::next());
        state.add_expectation(Expectation::new(call(state.id(), 1),
                                               returning("one")));
        state.add_expectation(Expectation::new(call(state.id(), 2),
                                               returning("two")));
        resolve(&state, 1);
        let e = state.verify_no_unmet_expectations().unwrap_err();
        match e {
            Error::UnmetExpectations{expectations, ..} => {
                assert_eq!(1, expectations.len());
                assert!(expectations[0].ends_with(".get(2)"));
            },
            _ => panic!("Unexpected error {}", e)
        }
        resolve(&state, 2);
        state.verify_no_unmet_expectations().unwrap();
    }

    #[test]
    fn sequence_numbers_increase() {
        let state = MockState::new(MockId::next());
        resolve(&state, 1);
        resolve(&state, 1);
        let history = lock(&state.history);
        assert!(history[0].sequence < history[1].sequence);
    }
}
