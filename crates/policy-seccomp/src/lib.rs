//! policy-seccomp: compile declarative seccomp policies into filters
//!
//! A [`Policy`] names a default action, optional extra architectures and a
//! list of per-syscall rules. [`FilterBuilder`] turns it into a filter via
//! any [`FilterBackend`]; [`CompiledFilter`] is the in-memory backend and
//! [`bpf`] lowers it to seccomp-bpf programs for installation.

pub mod action;
pub mod arch;
pub mod bpf;
pub mod compiler;
pub mod condition;
pub mod filter;
pub mod model;
pub mod resolver;
pub mod syscall_table;
pub mod validate;

pub use action::{translate_action, Action};
pub use arch::Arch;
pub use bpf::{install_filter, lower, FilterInstaller, KernelInstaller};
pub use compiler::{classify_and_emit, compile_syscall, Combination};
pub use condition::{translate_condition, Operator};
pub use filter::{
    build_filter, CompiledFilter, CompiledRule, FilterBackend, FilterBuilder, FilterError,
};
pub use model::{ArgCondition, Policy, SyscallRule};
pub use resolver::{NativeResolver, SyscallResolver};
pub use validate::{validate, validate_policy, validate_with};
