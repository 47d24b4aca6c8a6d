//! Event multiplexing over the protocol display and auxiliary descriptors.
//!
//! One cooperative dispatch loop watches the display fd plus any number of
//! auxiliary readable fds (in practice the two D-Bus connections). The
//! ordering contract per iteration is: flush outgoing protocol messages,
//! block until a source is ready, dispatch only the ready sources, and run
//! the embedder's refresh after every successful display round-trip.
//!
//! The display itself stays owned by the loop state; the multiplexer polls
//! a duplicate of its descriptor and borrows the connection through the
//! [`Dispatch`] trait when it needs to flush or round-trip.

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::time::Duration;

use calloop::generic::Generic;
use calloop::{EventLoop, Interest, LoopSignal, Mode, PostAction, RegistrationToken};
use rustix::fs::{fcntl_setfd, FdFlags};
use thiserror::Error;
use tracing::{debug, error, warn};

/// The protocol display as the multiplexer sees it.
pub trait DisplayConnection: AsFd {
    /// Push buffered outgoing messages down the socket.
    fn flush(&mut self) -> io::Result<()>;

    /// Send everything queued and block until the peer's replies have been
    /// read back and dispatched.
    fn roundtrip(&mut self) -> io::Result<()>;
}

/// Loop-state contract for the multiplexer.
///
/// The state owns the display and hands out a borrow between waits;
/// `refresh` is the compositor-wide hook run after each round-trip.
pub trait Dispatch {
    type Display: DisplayConnection;

    fn display(&mut self) -> &mut Self::Display;

    /// Runs after every successful display round-trip, whether or not
    /// anything visible changed.
    fn refresh(&mut self);
}

/// Errors surfaced by the multiplexer.
#[derive(Debug, Error)]
pub enum MultiplexError {
    /// The display connection failed. Unrecoverable: a compositor cannot
    /// continue without its display.
    #[error("display connection failed: {0}")]
    Display(#[source] io::Error),
    /// The display source was registered a second time in one run.
    #[error("display source already registered")]
    DisplayAlreadyRegistered,
    /// The loop itself failed.
    #[error("event loop error: {0}")]
    Loop(#[from] calloop::Error),
}

/// Handle for a registered auxiliary source.
///
/// Handles are never reused, so unregistering through a stale one stays a
/// no-op forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuxiliaryHandle(usize);

/// The cooperative dispatch loop. One per compositor run.
pub struct Multiplexer<S> {
    event_loop: EventLoop<'static, S>,
    display_token: Option<RegistrationToken>,
    aux_slots: Vec<Option<RegistrationToken>>,
}

impl<S: Dispatch + 'static> Multiplexer<S> {
    pub fn new() -> Result<Self, MultiplexError> {
        let event_loop = EventLoop::try_new()?;
        Ok(Self {
            event_loop,
            display_token: None,
            aux_slots: Vec::new(),
        })
    }

    /// Register the display as a watched source.
    ///
    /// Performs one blocking round-trip first, draining whatever the
    /// connection setup queued before the fd can wake the loop. Dispatch of
    /// this source round-trips again and then runs the refresh hook. Called
    /// exactly once per run.
    pub fn register_display(&mut self, state: &mut S) -> Result<(), MultiplexError> {
        if self.display_token.is_some() {
            return Err(MultiplexError::DisplayAlreadyRegistered);
        }

        state.display().roundtrip().map_err(MultiplexError::Display)?;

        let fd = state
            .display()
            .as_fd()
            .try_clone_to_owned()
            .map_err(MultiplexError::Display)?;
        let source = Generic::new(fd, Interest::READ, Mode::Level);
        let token = self
            .event_loop
            .handle()
            .insert_source(source, |_, _, state: &mut S| {
                state.display().roundtrip()?;
                state.refresh();
                Ok(PostAction::Continue)
            })
            .map_err(|err| MultiplexError::Loop(err.into()))?;
        self.display_token = Some(token);
        debug!("display source registered");
        Ok(())
    }

    /// Register an arbitrary readable descriptor.
    ///
    /// The callback runs with the loop state whenever the fd is readable
    /// and decides whether to keep watching. Close-on-exec is set on the
    /// descriptor; no round-trip is performed.
    pub fn register_auxiliary<F>(
        &mut self,
        fd: OwnedFd,
        mut callback: F,
    ) -> Result<AuxiliaryHandle, MultiplexError>
    where
        F: FnMut(&mut S) -> PostAction + 'static,
    {
        if let Err(err) = fcntl_setfd(&fd, FdFlags::CLOEXEC) {
            warn!("failed to set CLOEXEC on auxiliary fd: {err}");
        }

        let source = Generic::new(fd, Interest::READ, Mode::Level);
        let token = self
            .event_loop
            .handle()
            .insert_source(source, move |_, _, state: &mut S| Ok(callback(state)))
            .map_err(|err| MultiplexError::Loop(err.into()))?;
        let handle = AuxiliaryHandle(self.aux_slots.len());
        self.aux_slots.push(Some(token));
        debug!("auxiliary source {} registered", handle.0);
        Ok(handle)
    }

    /// Detach a previously registered auxiliary source.
    ///
    /// Idempotent: a second call, or a call after [`Self::remove_auxiliary_sources`],
    /// is a no-op.
    pub fn unregister_auxiliary(&mut self, handle: AuxiliaryHandle) {
        if let Some(slot) = self.aux_slots.get_mut(handle.0) {
            if let Some(token) = slot.take() {
                self.event_loop.handle().remove(token);
                debug!("auxiliary source {} removed", handle.0);
            }
        }
    }

    /// Teardown: detach every auxiliary source still attached. Safe with
    /// zero, one, or all of them attached.
    pub fn remove_auxiliary_sources(&mut self) {
        let handle = self.event_loop.handle();
        for slot in &mut self.aux_slots {
            if let Some(token) = slot.take() {
                handle.remove(token);
            }
        }
    }

    /// Signal handle that stops [`Self::run`] from any handler.
    pub fn loop_signal(&self) -> LoopSignal {
        self.event_loop.get_signal()
    }

    /// Run the loop until stopped or until the display fails.
    ///
    /// A broken display round-trip aborts the loop with
    /// [`MultiplexError::Display`]; no further dispatch is attempted and
    /// the embedder shuts down in order.
    pub fn run(&mut self, state: &mut S) -> Result<(), MultiplexError> {
        flush_display(state);
        self.event_loop
            .run(None, state, |state| flush_display(state))
            .map_err(classify)
    }

    /// One bounded loop iteration, for callers driving the loop themselves.
    pub fn dispatch(
        &mut self,
        timeout: Option<Duration>,
        state: &mut S,
    ) -> Result<(), MultiplexError> {
        flush_display(state);
        self.event_loop.dispatch(timeout, state).map_err(classify)
    }
}

/// Outgoing messages are flushed before every blocking wait, independent of
/// which source woke the loop. A failed flush is not fatal by itself; the
/// next round-trip decides.
fn flush_display<S: Dispatch>(state: &mut S) {
    if let Err(err) = state.display().flush() {
        warn!("display flush failed: {err}");
    }
}

/// Map a loop dispatch failure back to its cause. The display source is the
/// only registered source that raises I/O errors, so a boxed `io::Error`
/// coming out of dispatch is the display's round-trip failing.
fn classify(err: calloop::Error) -> MultiplexError {
    match err {
        calloop::Error::OtherError(inner) => match inner.downcast::<io::Error>() {
            Ok(io) => {
                error!("display round-trip failed: {io}");
                MultiplexError::Display(*io)
            }
            Err(other) => MultiplexError::Loop(calloop::Error::OtherError(other)),
        },
        other => MultiplexError::Loop(other),
    }
}
