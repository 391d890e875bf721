//! Command handlers
//!
//! One function per subcommand of the `gameplay-agent` binary. Handlers print
//! their results; everything else in the crate only logs.

pub mod annotate;
pub mod catalog;
pub mod control;
pub mod output;
