//! Testing infrastructure for the compositor core.
//!
//! This module provides test doubles and a fixture for exercising the
//! multiplexer and the shell machine without a protocol connection.
//!
//! # Architecture
//!
//! The testing infrastructure is built on three components:
//!
//! 1. **ScriptedDisplay**: A socketpair-backed display connection whose
//!    readiness and failures are driven by the test.
//!
//! 2. **RecordingCompositor**: A compositor-services double that records
//!    damage, focus, and configure calls and answers surface queries from
//!    seeded tables.
//!
//! 3. **Fixture**: The harness tying a real [`crate::Multiplexer`] and
//!    [`crate::Shell`] to the doubles above.
//!
//! # Example
//!
//! ```ignore
//! use squall_core::testing::Fixture;
//!
//! #[test]
//! fn test_display_dispatch() {
//!     let mut fixture = Fixture::new().unwrap();
//!     fixture.display().wake().unwrap();
//!     fixture.dispatch();
//!
//!     assert_eq!(fixture.refreshes(), 1);
//! }
//! ```

mod compositor;
mod display;
mod fixture;

pub use compositor::{CompositorCall, RecordingCompositor};
pub use display::ScriptedDisplay;
pub use fixture::{init_logging, Fixture, TestState};
