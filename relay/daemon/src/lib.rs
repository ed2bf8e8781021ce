//! Confab Daemon Library
//!
//! The HTTP surface over [`confab_core`], split out of the binary so the
//! router can be driven in tests without a listener.

pub mod server;

pub use server::router;
