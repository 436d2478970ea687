//! Syscall name resolution
//!
//! Resolution depends on the kernel ABI, so the compiler takes it as an
//! injected capability. Any `Fn(&str) -> Option<i64>` is a resolver, which
//! keeps fakes in tests to a one-liner.

use crate::syscall_table::{native_table, SyscallTable};
use std::collections::HashMap;

/// Maps a syscall name to its number on the target ABI.
///
/// `None` means the syscall does not exist there; the compiler skips such
/// entries instead of failing.
pub trait SyscallResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<i64>;
}

/// Resolver backed by the native `libc` syscall table
#[derive(Debug, Clone, Copy)]
pub struct NativeResolver {
    table: &'static SyscallTable,
}

impl NativeResolver {
    pub fn new() -> Self {
        Self {
            table: native_table(),
        }
    }
}

impl Default for NativeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallResolver for NativeResolver {
    fn resolve(&self, name: &str) -> Option<i64> {
        self.table.get_number(name)
    }
}

impl<F> SyscallResolver for F
where
    F: Fn(&str) -> Option<i64> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<i64> {
        self(name)
    }
}

impl SyscallResolver for HashMap<String, i64> {
    fn resolve(&self, name: &str) -> Option<i64> {
        self.get(name).copied()
    }
}
