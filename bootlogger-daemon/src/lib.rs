//! Bootlogger daemon library.
//!
//! Exposes the session building blocks for integration testing.
//! In production, `bootlogger-daemon` is used as a binary (main.rs).

pub mod boot_time;
pub mod cli;
pub mod logging;
pub mod orchestrator;
pub mod outdir;
pub mod property;

pub use orchestrator::{Session, SessionReport, StopTrigger};
pub use property::{GetpropReader, PropertyReader, StaticProperties};
