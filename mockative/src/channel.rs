// vim: tw=80
//! The side channel that carries argument matchers to the call they belong
//! to.
//!
//! Matcher helpers like [`any`](crate::any) run while a recorded call's
//! arguments are being evaluated, before the mocked method itself is entered.
//! They leave their matchers here, in call order, and the mocked method
//! drains them when it builds its [`Invocation`].
//!
//! The queue is confined to the current thread, and while a recording is
//! suspended across an `.await` it is also confined to the recording task.
//! It is cleared both when a [`Recording`] begins and when it ends.  Clearing on both sides is what
//! keeps a matcher left over by an aborted recording, or declared outside of
//! any recording, from being attributed to an unrelated call.

use std::{
    any::Any,
    cell::RefCell,
    future::Future,
    marker::PhantomData,
    mem,
    panic,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
    thread
};

use crate::{
    Error,
    invocation::{Invocation, MethodSignature, MockId, on_call},
    matcher::{ArgumentMatcher, Value}
};

#[derive(Default)]
struct Channel {
    matchers: Vec<ArgumentMatcher>,
    recording: bool,
    intercepted: Option<Result<Invocation, Error>>,
}

thread_local! {
    static CHANNEL: RefCell<Channel> = RefCell::new(Channel::default());
}

/// Unwinding payload used to leave the recording block once the mocked
/// method has been entered.
struct Intercepted;

/// Append a matcher to this thread's queue.
pub fn push(matcher: ArgumentMatcher) {
    CHANNEL.with(|c| c.borrow_mut().matchers.push(matcher));
}

/// Take every queued matcher, leaving the queue empty.
pub fn drain_and_clear() -> Vec<ArgumentMatcher> {
    CHANNEL.with(|c| mem::take(&mut c.borrow_mut().matchers))
}

/// Discard every queued matcher.
pub fn clear() {
    // The thread-local may already be gone if a Recording is dropped during
    // thread teardown.
    let _ = CHANNEL.try_with(|c| c.borrow_mut().matchers.clear());
}

/// How many matchers are waiting on this thread.
pub fn len() -> usize {
    CHANNEL.with(|c| c.borrow().matchers.len())
}

/// Queue `matcher` for the call being recorded and hand back `placeholder` in
/// place of the real argument.
///
/// This is the building block of [`any`](crate::any), [`eq`](crate::eq) and
/// friends.  The placeholder is never compared against anything.
pub fn declare_matcher<T>(matcher: ArgumentMatcher, placeholder: T) -> T {
    push(matcher);
    placeholder
}

/// The bracket around a stubbing or verification block.
///
/// A `Recording` owns its own matcher queue and its own intercepted call.
/// They are only installed as this thread's channel inside
/// [`scope`](Recording::scope), or while a [`Scoped`] future is being polled.
/// While installed, mocked methods called on this thread don't resolve.
/// Instead the first one builds its [`Invocation`] from the queued matchers,
/// hands it to the recording and unwinds back to the caller of `scope`.
///
/// Between polls the recording is parked, so other tasks running on the same
/// thread call their mocks normally and may record on their own.  Dropping
/// the `Recording`, including during a panic or when an `async` block is
/// cancelled, ends it and clears the matcher queue.
///
/// A `Recording` can't leave the thread that began it.
#[must_use]
pub struct Recording {
    /// While the recording is installed, this holds whatever it displaced.
    parked: Channel,
    _not_send: PhantomData<Rc<()>>,
}

impl Recording {
    /// Start a recording.
    ///
    /// Discards any stale matchers first.  Fails if called from within
    /// another recording's scope.
    pub fn begin() -> Result<Self, Error> {
        CHANNEL.with(|c| {
            let mut c = c.borrow_mut();
            if c.recording {
                return Err(Error::RecordingInProgress);
            }
            c.matchers.clear();
            let parked = Channel {
                recording: true,
                ..Channel::default()
            };
            Ok(Recording{parked, _not_send: PhantomData})
        })
    }

    /// Is a recording installed on this thread right now?
    pub fn is_active() -> bool {
        CHANNEL.with(|c| c.borrow().recording)
    }

    /// Build the invocation of the call being recorded, and leave the
    /// recording block.
    ///
    /// Must only be called while [`is_active`](Recording::is_active).
    pub fn intercept(mock: MockId,
                     method: &'static MethodSignature,
                     args: Vec<Value>) -> !
    {
        let built = on_call(mock, method, args);
        CHANNEL.with(|c| c.borrow_mut().intercepted = Some(built));
        panic::resume_unwind(Box::new(Intercepted))
    }

    /// Run `f` with this recording installed as the thread's channel.
    pub fn scope<R, F: FnOnce() -> R>(&mut self, f: F) -> R {
        let _installed = Installed::new(self);
        f()
    }

    /// Wrap `future` so that this recording is installed only while it is
    /// being polled.
    pub fn scope_future<Fut: Future>(&mut self, future: Fut)
        -> Scoped<'_, Fut>
    {
        Scoped {
            recording: self,
            future: Box::pin(future)
        }
    }

    /// End the recording with the outcome of the recorded block, as returned
    /// by `catch_unwind`.
    ///
    /// Any panic other than the one raised by
    /// [`intercept`](Recording::intercept) is propagated.
    pub fn finish<O>(mut self, outcome: thread::Result<O>)
        -> Result<Invocation, Error>
    {
        let intercepted = self.parked.intercepted.take();
        match outcome {
            Ok(_) => Err(Error::NoInvocationRecorded),
            Err(payload) if is_intercepted(&*payload) =>
                intercepted.unwrap_or(Err(Error::NoInvocationRecorded)),
            Err(payload) => panic::resume_unwind(payload)
        }
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        clear();
    }
}

/// Swaps a recording's channel with the thread's for as long as it lives.
struct Installed<'a> {
    recording: &'a mut Recording,
}

impl<'a> Installed<'a> {
    fn new(recording: &'a mut Recording) -> Self {
        swap(&mut recording.parked);
        Installed{recording}
    }
}

impl Drop for Installed<'_> {
    fn drop(&mut self) {
        swap(&mut self.recording.parked);
    }
}

fn swap(parked: &mut Channel) {
    let _ = CHANNEL.try_with(|c| mem::swap(&mut *c.borrow_mut(), parked));
}

/// A future polled with a [`Recording`] installed.
///
/// Returned by [`Recording::scope_future`].
#[must_use = "futures do nothing unless polled"]
pub struct Scoped<'a, Fut> {
    recording: &'a mut Recording,
    future: Pin<Box<Fut>>,
}

impl<Fut: Future> Future for Scoped<'_, Fut> {
    type Output = Fut::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Self::Output>
    {
        let this = &mut *self;
        let _installed = Installed::new(this.recording);
        this.future.as_mut().poll(cx)
    }
}

fn is_intercepted(payload: &(dyn Any + Send)) -> bool {
    payload.is::<Intercepted>()
}

#[cfg(test)]
mod t {
    use super::*;

    static FOO: MethodSignature = MethodSignature::blocking("foo", &["u32"]);

    #[test]
    fn begin_discards_stale_matchers() {
        push(ArgumentMatcher::Wildcard);
        assert_eq!(1, len());
        let r = Recording::begin().unwrap();
        assert_eq!(0, len());
        drop(r);
    }

    #[test]
    fn drop_discards_leftover_matchers() {
        let mut r = Recording::begin().unwrap();
        r.scope(|| push(ArgumentMatcher::Wildcard));
        drop(r);
        assert_eq!(0, len());
        assert!(!Recording::is_active());
    }

    #[test]
    fn nested_recording_is_rejected() {
        let mut r = Recording::begin().unwrap();
        r.scope(|| {
            assert!(matches!(Recording::begin(),
                             Err(Error::RecordingInProgress)));
        });
    }

    #[test]
    fn parked_recording_is_invisible() {
        let mut r = Recording::begin().unwrap();
        r.scope(|| push(ArgumentMatcher::Wildcard));
        assert!(!Recording::is_active());
        assert_eq!(0, len());
        // Another recording can run while the first is parked
        let other = Recording::begin().unwrap();
        drop(other);
        r.scope(|| {
            assert!(Recording::is_active());
            assert_eq!(1, len());
        });
    }

    #[test]
    fn intercept_unwinds_to_finish() {
        let id = MockId::next();
        let mut r = Recording::begin().unwrap();
        let outcome = r.scope(|| panic::catch_unwind(|| -> u32 {
            let x = declare_matcher(ArgumentMatcher::Wildcard, 0u32);
            Recording::intercept(id, &FOO, vec![Value::new(x)])
        }));
        let invocation = r.finish(outcome).unwrap();
        assert_eq!(format!("{}.foo(any())", id), invocation.to_string());
        assert_eq!(0, len());
    }

    #[test]
    fn block_without_a_mock_call() {
        let mut r = Recording::begin().unwrap();
        let outcome = r.scope(|| panic::catch_unwind(|| 5));
        assert!(matches!(r.finish(outcome), Err(Error::NoInvocationRecorded)));
    }

    #[test]
    fn channel_is_thread_confined() {
        clear();
        push(ArgumentMatcher::Wildcard);
        let other = std::thread::spawn(len).join().unwrap();
        assert_eq!(0, other);
        assert_eq!(1, drain_and_clear().len());
    }
}
