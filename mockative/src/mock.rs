// vim: tw=80
//! The handle embedded in every mock object.

use cfg_if::cfg_if;
use std::marker::PhantomData;
use tracing::trace;

use crate::{
    Error,
    channel::Recording,
    invocation::{Invocation, MethodSignature, MockId},
    matcher::Value,
    registry,
    state::Resolution,
    stub
};

/// What a mock does when a call matches none of its expectations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Strictness {
    /// Fail the test.
    #[default]
    Strict,
    /// Return a default value.
    ///
    /// [`Mock::call`] can only do that for every return type with the
    /// `nightly` feature.  On stable Rust, use [`Mock::call_or_default`] for
    /// methods whose return type implements `Default`.
    Relaxed,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MockConfig {
    pub strictness: Strictness,
}

/// Builds a [`Mock`] with a non-default [`MockConfig`].
///
/// # Examples
/// ```
/// # use mockative::*;
/// let mock = Mock::builder().relaxed().build();
/// assert_eq!(Strictness::Relaxed, mock.config().strictness);
/// ```
#[derive(Debug, Default)]
pub struct MockBuilder {
    config: MockConfig,
}

impl MockBuilder {
    pub fn build(self) -> Mock {
        Mock{id: MockId::next(), config: self.config}
    }

    pub fn relaxed(self) -> Self {
        self.strictness(Strictness::Relaxed)
    }

    pub fn strictness(mut self, strictness: Strictness) -> Self {
        self.config.strictness = strictness;
        self
    }
}

/// Identity and configuration of one mock object.
///
/// A mock type embeds a `Mock`, implements [`Mockable`], and routes the body
/// of each mocked method through [`call`](Mock::call).  Dropping the `Mock`
/// disposes of its expectations and history.
///
/// # Examples
/// ```
/// # use mockative::*;
/// static GREET: MethodSignature = MethodSignature::blocking("greet", &["&str"]);
///
/// struct MockGreeter(Mock);
/// impl MockGreeter {
///     fn greet(&self, name: &'static str) -> String {
///         self.0.call(&GREET, args![name])
///     }
/// }
///
/// let greeter = MockGreeter(Mock::new());
/// every(|| greeter.greet(any())).returns("Hello".to_owned());
/// assert_eq!("Hello", greeter.greet("world"));
/// verify(|| greeter.greet(eq("world"))).was_invoked(once());
/// ```
#[derive(Debug)]
pub struct Mock {
    id: MockId,
    config: MockConfig,
}

impl Mock {
    /// A strict mock with a fresh id.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MockBuilder {
        MockBuilder::default()
    }

    pub fn config(&self) -> MockConfig {
        self.config
    }

    pub fn id(&self) -> MockId {
        self.id
    }

    /// Dispatch one call of a mocked method.
    ///
    /// While [`every`](crate::every) or [`verify`](fn@crate::verify) is
    /// recording, this never returns: the call is handed to the recording
    /// instead.  Otherwise the answer of the most recently added matching
    /// expectation is returned.
    ///
    /// # Panics
    ///
    /// If the call can't be answered.  A relaxed mock answers unstubbed calls
    /// with `O::default()`, which requires the `nightly` feature.
    #[track_caller]
    pub fn call<O: 'static>(&self, method: &'static MethodSignature,
                            args: Vec<Value>) -> O
    {
        match self.dispatch(method, args) {
            Ok(o) => o,
            Err(Error::UnstubbedInvocation{..}) if self.is_relaxed() =>
                DefaultReturner::<O>::return_default(),
            Err(e) => panic!("{}", e)
        }
    }

    /// Like [`call`](Mock::call), but a relaxed mock can answer unstubbed
    /// calls on stable Rust.
    #[track_caller]
    pub fn call_or_default<O>(&self, method: &'static MethodSignature,
                              args: Vec<Value>) -> O
        where O: Default + 'static
    {
        match self.dispatch(method, args) {
            Ok(o) => o,
            Err(Error::UnstubbedInvocation{..}) if self.is_relaxed() =>
                O::default(),
            Err(e) => panic!("{}", e)
        }
    }

    /// Like [`call`](Mock::call), but return an error instead of panicking.
    ///
    /// Unstubbed calls are errors regardless of the mock's strictness.
    pub fn try_call<O: 'static>(&self, method: &'static MethodSignature,
                                args: Vec<Value>) -> Result<O, Error>
    {
        self.dispatch(method, args)
    }

    fn dispatch<O: 'static>(&self, method: &'static MethodSignature,
                            args: Vec<Value>) -> Result<O, Error>
    {
        if Recording::is_active() {
            Recording::intercept(self.id, method, args);
        }
        let invocation = Invocation::literal(self.id, method, args);
        let arguments = invocation.arguments();
        trace!(%invocation, "call");
        let resolution = registry::global()
            .state_for(self.id)
            .resolve(invocation.clone());
        match resolution {
            Resolution::Matched(action) =>
                stub::perform(&*action, &invocation, &arguments),
            Resolution::Unmatched => Err(Error::UnstubbedInvocation {
                invocation: invocation.to_string()
            })
        }
    }

    fn is_relaxed(&self) -> bool {
        self.config.strictness == Strictness::Relaxed
    }
}

impl Default for Mock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mock {
    fn drop(&mut self) {
        registry::global().dispose(self.id);
    }
}

/// Anything that carries a [`Mock`].
///
/// Implemented by mock types so that they can be passed to
/// [`dispose`](crate::dispose) and the other mock-level checks.
pub trait Mockable {
    fn mock(&self) -> &Mock;
}

impl Mockable for Mock {
    fn mock(&self) -> &Mock {
        self
    }
}

impl<T: Mockable + ?Sized> Mockable for &T {
    fn mock(&self) -> &Mock {
        (**self).mock()
    }
}

#[doc(hidden)]
pub trait ReturnDefault<O> {
    fn return_default() -> O;
}

#[doc(hidden)]
pub struct DefaultReturner<O: 'static>(PhantomData<O>);

cfg_if! {
    if #[cfg(feature = "nightly")] {
        impl<O> ReturnDefault<O> for DefaultReturner<O> {
            default fn return_default() -> O {
                panic!("Relaxed mocks can only return default values for \
                        types that impl std::Default");
            }
        }

        impl<O: Default> ReturnDefault<O> for DefaultReturner<O> {
            fn return_default() -> O {
                O::default()
            }
        }
    } else {
        impl<O> ReturnDefault<O> for DefaultReturner<O> {
            fn return_default() -> O {
                panic!("Relaxed mocks need the \"nightly\" feature to return \
                        default values from Mock::call.  Use \
                        Mock::call_or_default instead");
            }
        }
    }
}

#[cfg(test)]
mod t {
    use pretty_assertions::assert_eq;
    use super::*;
    use crate::{Stubbing, every, verify, once, args};

    static COUNT: MethodSignature = MethodSignature::blocking("count", &[]);

    struct MockCounter(Mock);

    impl MockCounter {
        fn count(&self) -> u32 {
            self.0.call_or_default(&COUNT, args![])
        }
    }

    #[test]
    fn drop_disposes() {
        let mock = Mock::new();
        let id = mock.id();
        registry::global().state_for(id);
        drop(mock);
        assert!(registry::global().get(id).is_none());
    }

    #[test]
    fn relaxed_call_or_default() {
        let counter = MockCounter(Mock::builder().relaxed().build());
        assert_eq!(0, counter.count());
        every(|| counter.count()).returns(3);
        assert_eq!(3, counter.count());
        verify(|| counter.count()).was_invoked(crate::twice());
    }

    #[test]
    #[should_panic(expected = "No matching expectation found for")]
    fn strict_unstubbed() {
        let counter = MockCounter(Mock::new());
        counter.count();
    }

    #[test]
    fn try_call_reports_unstubbed() {
        let mock = Mock::builder().relaxed().build();
        let e = mock.try_call::<u32>(&COUNT, args![]).unwrap_err();
        assert_eq!(
            format!("No matching expectation found for {}.count()", mock.id()),
            e.to_string());
    }

    #[test]
    fn wrong_return_type() {
        let mock = Mock::new();
        let stubbing: Stubbing<u32> = every(|| mock.call(&COUNT, args![]));
        stubbing.returns(1);
        let e = mock.try_call::<String>(&COUNT, args![]).unwrap_err();
        assert!(matches!(e, Error::ReturnTypeMismatch{..}));
        verify(|| mock.call::<u32>(&COUNT, args![])).was_invoked(once());
    }
}
