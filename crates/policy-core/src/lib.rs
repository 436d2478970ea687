//! policy-core: shared types for seccomp policy compilation
//!
//! This crate provides the foundational pieces used by the other crates:
//! - Error taxonomy, `Result` alias and error-kind discriminants
//! - Runtime seccomp support detection

pub mod capabilities;
pub mod error;

pub use capabilities::{SeccompMode, SeccompSupport};
pub use error::{BoxError, ErrorKind, PolicyError, Result};
