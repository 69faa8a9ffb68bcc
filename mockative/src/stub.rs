// vim: tw=80
//! Stub actions: what a mocked method does when a call matches.

use downcast::*;
use fragile::Fragile;
use std::{
    marker::PhantomData,
    panic,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering}
    }
};
use tracing::debug;

use crate::{
    Error,
    invocation::{Arguments, Invocation},
    registry,
    state::Expectation
};

#[doc(hidden)]
pub trait AnyAction : Any + Send + Sync {}
downcast!(dyn AnyAction);

type Returner<O> = Box<dyn Fn() -> O + Send + Sync>;

/// The answer programmed for an expectation.
pub(crate) enum Action<O> {
    /// Return a clone of the same value every time.
    ReturnValue(Returner<O>),
    /// Return each value in turn, then keep returning the last one.
    ReturnSequence {
        values: Vec<Returner<O>>,
        next: AtomicUsize,
    },
    /// Raise a panic with a clone of the same payload every time.
    Throw(Arc<dyn Fn() + Send + Sync>),
    /// Compute the result from the call's arguments.
    Invoke(Box<dyn Fn(&Arguments) -> O + Send + Sync>),
}

impl<O: 'static> AnyAction for Action<O> {}

impl<O> Action<O> {
    /// Produce the call's result.
    ///
    /// Must be called without holding any of the engine's locks, since the
    /// answer may call back into a mock.
    pub(crate) fn perform(&self, args: &Arguments) -> O {
        match self {
            Action::ReturnValue(r) => r(),
            Action::ReturnSequence{values, next} => {
                let last = values.len() - 1;
                let i = next.fetch_update(Ordering::Relaxed, Ordering::Relaxed,
                                          |i| Some((i + 1).min(last)))
                    .unwrap_or(last);
                (values[i])()
            },
            Action::Throw(raise) => {
                raise();
                unreachable!("a throwing stub returned")
            },
            Action::Invoke(f) => f(args)
        }
    }
}

fn returner<O: Clone + Send + Sync + 'static>(value: O) -> Returner<O> {
    Box::new(move || value.clone())
}

/// Look up the `Action<O>` behind a matched expectation and perform it.
pub(crate) fn perform<O: 'static>(action: &dyn AnyAction,
                                  invocation: &Invocation,
                                  args: &Arguments) -> Result<O, Error>
{
    let action: &Action<O> = action.downcast_ref()
        .map_err(|_| Error::ReturnTypeMismatch {
            method: invocation.method().to_string(),
            expected: std::any::type_name::<O>()
        })?;
    Ok(action.perform(args))
}

/// A recorded call, waiting for its answer.
///
/// Returned by [`every`](crate::every) and [`co_every`](crate::co_every).
/// Nothing is stored until one of the answer methods is called.  Each answer
/// becomes a new expectation; when several expectations match a call, the
/// most recently added one wins.
#[must_use = "Stubbing does nothing until it's given an answer"]
pub struct Stubbing<O> {
    pattern: Invocation,
    _o: PhantomData<fn() -> O>,
}

impl<O: 'static> Stubbing<O> {
    pub(crate) fn new(pattern: Invocation) -> Self {
        Stubbing{pattern, _o: PhantomData}
    }

    fn answer(self, action: Action<O>) {
        debug!(pattern = %self.pattern, "stubbing");
        registry::global()
            .state_for(self.pattern.mock())
            .add_expectation(Expectation::new(self.pattern, Arc::new(action)));
    }

    /// Answer matching calls with their arguments passed to `f`.
    ///
    /// `f` runs without any of the engine's locks held, so it may call other
    /// mocks, or even this one.
    pub fn invokes<F>(self, f: F)
        where F: Fn(&Arguments) -> O + Send + Sync + 'static
    {
        self.answer(Action::Invoke(Box::new(f)))
    }

    /// Single-threaded version of [`invokes`](#method.invokes).  Can be used
    /// when the callback isn't `Send`.
    ///
    /// It is a runtime error to call the mock method from a different thread
    /// than the one that called this method, or to dispose of the mock from
    /// a different thread.
    pub fn invokes_st<F>(self, f: F)
        where F: Fn(&Arguments) -> O + 'static
    {
        let fragile = Fragile::new(f);
        self.invokes(move |args| (fragile.get())(args))
    }

    /// The pattern this stubbing will be stored under.
    pub fn pattern(&self) -> &Invocation {
        &self.pattern
    }

    /// Answer matching calls with a clone of `value`.
    pub fn returns(self, value: O)
        where O: Clone + Send + Sync
    {
        self.answer(Action::ReturnValue(returner(value)))
    }

    /// Answer successive matching calls with successive values, then keep
    /// answering with the last one.
    ///
    /// # Panics
    ///
    /// If `values` is empty.
    pub fn returns_many<I>(self, values: I)
        where I: IntoIterator<Item = O>, O: Clone + Send + Sync
    {
        let values: Vec<_> = values.into_iter().map(returner).collect();
        assert!(!values.is_empty(), "returns_many needs at least one value");
        self.answer(Action::ReturnSequence{values, next: AtomicUsize::new(0)})
    }

    /// Answer matching calls by panicking with a clone of `error` as the
    /// payload.
    pub fn throws<E>(self, error: E)
        where E: Clone + Send + Sync + 'static
    {
        self.answer(Action::Throw(Arc::new(move ||
            panic::panic_any(error.clone())
        )))
    }
}

impl Stubbing<()> {
    /// Answer matching calls of a method that returns nothing.
    pub fn does_nothing(self) {
        self.returns(())
    }
}

#[cfg(test)]
mod t {
    use super::*;

    fn no_args() -> Arguments {
        crate::Invocation::literal(crate::MockId::next(), &NOARGS, vec![])
            .arguments()
    }

    static NOARGS: crate::MethodSignature =
        crate::MethodSignature::blocking("f", &[]);

    #[test]
    fn sequence_holds_last() {
        let action = Action::ReturnSequence {
            values: vec![1, 2, 3].into_iter().map(returner).collect(),
            next: AtomicUsize::new(0)
        };
        let args = no_args();
        let got: Vec<u32> = (0..5).map(|_| action.perform(&args)).collect();
        assert_eq!(vec![1, 2, 3, 3, 3], got);
    }

    #[test]
    fn downcast_to_wrong_type() {
        let action: Arc<dyn AnyAction> =
            Arc::new(Action::ReturnValue(returner(5u32)));
        let invocation =
            crate::Invocation::literal(crate::MockId::next(), &NOARGS, vec![]);
        let args = invocation.arguments();
        assert_eq!(5u32, perform::<u32>(&*action, &invocation, &args).unwrap());
        let e = perform::<String>(&*action, &invocation, &args).unwrap_err();
        assert!(matches!(e, Error::ReturnTypeMismatch{..}));
    }

    #[test]
    #[should_panic(expected = "boom")]
    fn throw() {
        let action: Action<u32> = Action::Throw(Arc::new(||
            panic::panic_any("boom".to_owned())
        ));
        action.perform(&no_args());
    }
}
