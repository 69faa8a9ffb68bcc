// vim: tw=80
//! Errors reported by the recording and matching engine.

use thiserror::Error;

use crate::{MockId, verify::VerificationFailure};

/// Everything that can go wrong while recording, resolving or verifying a
/// call.
///
/// None of these are retried: matching is deterministic, so a failure is
/// always a problem with the test that hit it.  The panicking conveniences
/// ([`every`](crate::every), [`verify`](fn@crate::verify),
/// [`Mock::call`](crate::Mock::call), ...) panic with this type's `Display`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Argument matchers were declared for some, but not all, of a call's
    /// arguments.
    #[error("{method} takes {arity} argument(s) but {matchers} argument \
             matcher(s) were declared.  Use a matcher for every argument or \
             for none of them")]
    MatcherArityMismatch {
        method: String,
        arity: usize,
        matchers: usize,
    },

    /// A mocked method passed a different number of arguments than its
    /// signature declares.
    #[error("{method} takes {arity} argument(s) but was called with \
             {arguments}")]
    ArgumentCountMismatch {
        method: String,
        arity: usize,
        arguments: usize,
    },

    /// A live call on a strict mock matched no expectation.
    #[error("No matching expectation found for {invocation}")]
    UnstubbedInvocation {
        invocation: String,
    },

    /// A verification quantifier was not satisfied.
    #[error(transparent)]
    VerificationFailure(Box<VerificationFailure>),

    /// Some invocations were never matched by any verification.
    #[error("{mock} has invocations that were never verified:{}",
            bullets(.invocations))]
    UnverifiedInvocations {
        mock: MockId,
        invocations: Vec<String>,
    },

    /// Some expectations were never exercised by a call.
    #[error("{mock} has expectations that were never invoked:{}",
            bullets(.expectations))]
    UnmetExpectations {
        mock: MockId,
        expectations: Vec<String>,
    },

    /// The recording block returned without calling a mock.
    #[error("No mock was called while recording.  The block passed to \
             every or verify must call exactly one mocked method")]
    NoInvocationRecorded,

    /// A recording was started while another one was active on the same
    /// thread.
    #[error("every and verify can't be nested")]
    RecordingInProgress,

    /// The stubbed answer doesn't produce the type the call site expects.
    #[error("{method} was stubbed with an answer that doesn't return \
             {expected}")]
    ReturnTypeMismatch {
        method: String,
        expected: &'static str,
    },
}

impl From<VerificationFailure> for Error {
    fn from(failure: VerificationFailure) -> Self {
        Error::VerificationFailure(Box::new(failure))
    }
}

fn bullets(lines: &[String]) -> String {
    lines.iter()
        .map(|l| format!("\n    {}", l))
        .collect()
}

#[cfg(test)]
mod t {
    use pretty_assertions::assert_eq;
    use super::*;

    #[test]
    fn arity_mismatch_message() {
        let e = Error::MatcherArityMismatch {
            method: "thing(String, u32)".to_owned(),
            arity: 2,
            matchers: 1
        };
        assert_eq!(
            "thing(String, u32) takes 2 argument(s) but 1 argument matcher(s) \
             were declared.  Use a matcher for every argument or for none of \
             them",
            e.to_string());
    }

    #[test]
    fn unverified_lists_every_invocation() {
        let e = Error::UnverifiedInvocations {
            mock: MockId::from_raw(7),
            invocations: vec!["#1 mock#7.a()".to_owned(),
                              "#2 mock#7.b(1)".to_owned()]
        };
        assert_eq!(
            "mock#7 has invocations that were never verified:\n    \
             #1 mock#7.a()\n    #2 mock#7.b(1)",
            e.to_string());
    }
}
