//! orientctl library - dashboard and commands, exposed for testing.

pub mod commands;
pub mod dashboard;
pub mod range;

pub use dashboard::{render, Dashboard, Frame, FrameContext, ReadyFrame};
pub use range::TimeRange;
