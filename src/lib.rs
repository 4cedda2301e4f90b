//! The echoput Library
//!
//! This crate contains all the moving parts of echoput, a tool that
//! uploads files to embedded systems by driving a shell reachable over a
//! serial line or a Telnet session. The application itself, via `main.rs`,
//! is only a very tiny frontend.

pub use self::config::Config;
pub use self::error::{ExitError, Failed};
pub use self::operation::Operation;

pub mod config;
pub mod error;
pub mod log;
pub mod operation;
pub mod transport;
pub mod upload;
