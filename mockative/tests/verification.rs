// vim: tw=80
//! Counting calls after the fact.

use mockative::*;

static THING: MethodSignature =
    MethodSignature::blocking("thing", &["String", "u32"]);
static COUNT: MethodSignature = MethodSignature::blocking("count", &["u32"]);
static RESET: MethodSignature = MethodSignature::blocking("reset", &[]);

pub struct MockThing(Mock);

impl MockThing {
    fn new() -> Self {
        MockThing(Mock::new())
    }

    fn thing(&self, name: String, n: u32) {
        self.0.call(&THING, args![name, n])
    }

    fn count(&self, x: u32) -> u32 {
        self.0.call(&COUNT, args![x])
    }

    fn reset(&self) {
        self.0.call(&RESET, args![])
    }
}

impl Mockable for MockThing {
    fn mock(&self) -> &Mock {
        &self.0
    }
}

fn s(x: &str) -> String {
    x.to_owned()
}

#[test]
fn counts_per_argument() {
    let mock = MockThing::new();
    every(|| mock.thing(any(), any())).does_nothing();
    mock.thing(s("x"), 1);
    mock.thing(s("x"), 2);
    mock.thing(s("y"), 3);

    verify(|| mock.thing(eq(s("x")), any())).was_invoked(exactly(2));
    verify(|| mock.thing(eq(s("y")), any())).was_invoked(once());
    verify(|| mock.thing(eq(s("z")), any())).was_not_invoked();
    verify(|| mock.thing(any(), any())).was_invoked(at_least(3));
    verify(|| mock.thing(any(), matching(predicate::lt(3u32))))
        .was_invoked(at_most(2));
    verify(|| mock.thing(s("x"), 2)).was_invoked(once());
}

#[test]
fn check_returns_the_count() {
    let mock = MockThing::new();
    every(|| mock.thing(any(), any())).does_nothing();
    mock.thing(s("x"), 1);
    mock.thing(s("x"), 1);
    let n = verify(|| mock.thing(any(), any())).check(twice()).unwrap();
    assert_eq!(2, n);
}

#[test]
fn failure_describes_competing_calls() {
    let mock = MockThing::new();
    every(|| mock.thing(any(), any())).does_nothing();
    mock.thing(s("y"), 1);
    every(|| mock.reset()).does_nothing();
    mock.reset();

    let v = verify(|| mock.thing(eq(s("x")), any()));
    let e = v.check(once()).unwrap_err();
    let failure = match e {
        Error::VerificationFailure(f) => f,
        e => panic!("Unexpected error {}", e)
    };
    assert_eq!(0, failure.actual);
    assert_eq!(once(), failure.times);
    assert_eq!(v.pattern().to_string(), failure.pattern);
    // Only calls of the same method compete
    assert_eq!(1, failure.competing.len());
    assert!(failure.competing[0].contains("\"y\""), "{}", failure);
    let msg = failure.to_string();
    assert!(msg.contains("to be called exactly 1 time, but it was called 0 \
                          times"), "{}", msg);
    assert!(msg.contains("argument 0: expected eq(\"x\"), got \"y\""), "{}",
            msg);
}

#[test]
fn failure_explains_predicates() {
    let mock = MockThing::new();
    every(|| mock.count(any())).returns(0);
    mock.count(4);
    let e = verify(|| mock.count(matching(predicate::gt(10u32))))
        .check(once())
        .unwrap_err();
    let msg = e.to_string();
    assert!(msg.contains("argument 0: expected matching("), "{}", msg);
    assert!(msg.contains("got 4"), "{}", msg);
    assert!(msg.contains("10"), "{}", msg);
}

#[test]
#[should_panic(expected = "to be called exactly 2 times, but it was called 1 \
                           time")]
fn was_invoked_panics() {
    let mock = MockThing::new();
    every(|| mock.reset()).does_nothing();
    mock.reset();
    verify(|| mock.reset()).was_invoked(twice());
}

#[test]
fn no_unverified_expectations() {
    let mock = MockThing::new();
    every(|| mock.count(any())).returns(0);
    mock.count(1);
    mock.count(2);
    verify(|| mock.count(1)).was_invoked(once());
    let e = registry::global()
        .state_for(mock.mock().id())
        .confirm_verified()
        .unwrap_err();
    assert!(e.to_string().contains(".count(2)"), "{}", e);

    verify(|| mock.count(2)).was_invoked(once());
    verify_no_unverified_expectations(&mock);
}

#[test]
#[should_panic(expected = "has invocations that were never verified")]
fn unverified_expectations_panic() {
    let mock = MockThing::new();
    every(|| mock.reset()).does_nothing();
    mock.reset();
    verify_no_unverified_expectations(&mock);
}

#[test]
fn no_unmet_expectations() {
    let mock = MockThing::new();
    every(|| mock.count(1)).returns(10);
    every(|| mock.count(2)).returns(20);
    mock.count(1);
    let e = registry::global()
        .state_for(mock.mock().id())
        .verify_no_unmet_expectations()
        .unwrap_err();
    match e {
        Error::UnmetExpectations{expectations, ..} => {
            assert_eq!(1, expectations.len());
            assert!(expectations[0].ends_with(".count(2)"));
        },
        e => panic!("Unexpected error {}", e)
    }
    mock.count(2);
    verify_no_unmet_expectations(&mock);
}

/// A fresh mock has nothing to verify.
#[test]
fn unused_mock_passes_mock_level_checks() {
    let mock = MockThing::new();
    verify_no_unverified_expectations(&mock);
    verify_no_unmet_expectations(&mock);
}

#[test]
fn nested_recordings_are_rejected() {
    let mock = MockThing::new();
    every(|| mock.reset()).does_nothing();
    mock.reset();
    verify(|| {
        let inner = try_verify(|| mock.count(1));
        assert!(matches!(inner, Err(Error::RecordingInProgress)));
        mock.reset()
    }).was_invoked(once());
}

#[test]
fn verification_failure_is_an_error() {
    let mock = MockThing::new();
    let e = verify(|| mock.reset()).check(once()).unwrap_err();
    let source: &dyn std::error::Error = &e;
    assert!(source.to_string().starts_with("Expected "));
}
