// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the progress and results of a test run.
//!
//! The runner posts [`Event`]s to the [`EventHandler`] of the run's configuration. The recorders
//! in this module are event handlers that turn events into output:
//!
//! * [`HumanReadableRecorder`] describes events as [`Message`]s; the other textual recorders are
//!   built on top of it.
//! * [`ConsoleRecorder`] writes one line per message.
//! * [`HierarchyRecorder`] writes a tree of suites and tests once the run ends.
//! * [`JunitRecorder`] writes a JUnit XML report.
//!
//! Use [`FanOutEventHandler`] to drive several recorders from one run.

mod console;
pub mod events;
mod hierarchy;
mod human;
mod junit;
mod symbols;

pub use console::*;
pub use events::{
    Event, EventContext, EventHandler, EventKind, FanOutEventHandler, NoopEventHandler,
};
pub use hierarchy::*;
pub use human::{HumanReadableRecorder, Message, describe_arguments};
pub use junit::{JunitRecorder, TESTSUITE_NAME, escape as escape_xml};
pub use symbols::Symbol;
