//! Test fixture wiring the multiplexer to scripted endpoints.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use calloop::PostAction;
use tracing::info;

use crate::multiplexer::{AuxiliaryHandle, Dispatch, MultiplexError, Multiplexer};
use crate::shell::Shell;

use super::compositor::RecordingCompositor;
use super::display::ScriptedDisplay;

/// Initialize logging for tests.
/// Filter controlled by RUST_LOG env var (default: squall_core=debug).
pub fn init_logging() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;

    static INIT_LOG: Once = Once::new();
    INIT_LOG.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("squall_core=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Loop state used by tests: scripted display, real shell machine, and a
/// recording compositor, plus counters for observing dispatch behavior.
pub struct TestState {
    pub display: ScriptedDisplay,
    pub shell: Shell,
    pub compositor: RecordingCompositor,
    /// Times the refresh hook ran.
    pub refreshes: usize,
    /// Times any auxiliary callback fired.
    pub aux_events: usize,
}

impl Dispatch for TestState {
    type Display = ScriptedDisplay;

    fn display(&mut self) -> &mut ScriptedDisplay {
        &mut self.display
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }
}

/// Test harness around a [`Multiplexer`] with the display registered.
///
/// Readiness is injected through [`ScriptedDisplay::wake`] and through the
/// write ends returned by [`Self::add_auxiliary`]; effects are observed on
/// the counters and the recording compositor.
pub struct Fixture {
    multiplexer: Multiplexer<TestState>,
    state: TestState,
}

impl Fixture {
    /// Create a fixture with the display source already registered, which
    /// includes the initial backlog round-trip.
    pub fn new() -> anyhow::Result<Self> {
        init_logging();

        let mut multiplexer = Multiplexer::new()?;
        let mut state = TestState {
            display: ScriptedDisplay::new()?,
            shell: Shell::new(),
            compositor: RecordingCompositor::new(),
            refreshes: 0,
            aux_events: 0,
        };
        multiplexer.register_display(&mut state)?;

        info!("test fixture initialized");
        Ok(Self { multiplexer, state })
    }

    /// Dispatch once with a short timeout, ignoring source failures.
    pub fn dispatch(&mut self) {
        self.multiplexer
            .dispatch(Some(Duration::from_millis(10)), &mut self.state)
            .ok();
    }

    /// Dispatch once and return the failure, if any.
    pub fn dispatch_err(&mut self) -> Option<MultiplexError> {
        self.multiplexer
            .dispatch(Some(Duration::from_millis(10)), &mut self.state)
            .err()
    }

    /// Run the loop until a handler stops it or a source fails.
    pub fn run(&mut self) -> Result<(), MultiplexError> {
        self.multiplexer.run(&mut self.state)
    }

    /// Register an auxiliary pipe source counting into `aux_events`.
    /// Returns the handle and the write end; a written byte makes the
    /// source fire on the next dispatch.
    pub fn add_auxiliary(&mut self) -> anyhow::Result<(AuxiliaryHandle, UnixStream)> {
        self.add_auxiliary_with(|state| {
            state.aux_events += 1;
            PostAction::Continue
        })
    }

    /// Register an auxiliary pipe source with a custom callback. The pipe
    /// is drained before the callback runs.
    pub fn add_auxiliary_with<F>(
        &mut self,
        mut callback: F,
    ) -> anyhow::Result<(AuxiliaryHandle, UnixStream)>
    where
        F: FnMut(&mut TestState) -> PostAction + 'static,
    {
        let (read, write) = UnixStream::pair()?;
        read.set_nonblocking(true)?;
        let mut drain = read.try_clone()?;
        let handle = self
            .multiplexer
            .register_auxiliary(read.into(), move |state| {
                let mut buf = [0u8; 64];
                while matches!(drain.read(&mut buf), Ok(n) if n > 0) {}
                callback(state)
            })?;
        Ok((handle, write))
    }

    pub fn multiplexer(&mut self) -> &mut Multiplexer<TestState> {
        &mut self.multiplexer
    }

    pub fn state(&mut self) -> &mut TestState {
        &mut self.state
    }

    pub fn shell(&mut self) -> &mut Shell {
        &mut self.state.shell
    }

    pub fn compositor(&mut self) -> &mut RecordingCompositor {
        &mut self.state.compositor
    }

    pub fn compositor_ref(&self) -> &RecordingCompositor {
        &self.state.compositor
    }

    pub fn display(&mut self) -> &mut ScriptedDisplay {
        &mut self.state.display
    }

    pub fn refreshes(&self) -> usize {
        self.state.refreshes
    }

    pub fn aux_events(&self) -> usize {
        self.state.aux_events
    }
}
