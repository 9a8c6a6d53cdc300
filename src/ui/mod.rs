//! Terminal feedback for long-running commands.

pub mod progress;
