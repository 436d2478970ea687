//! Filter construction from a policy

use crate::action::{describe, translate_action};
use crate::arch::Arch;
use crate::compiler::compile_syscall;
use crate::model::Policy;
use crate::resolver::{NativeResolver, SyscallResolver};
use log::info;
use policy_core::{PolicyError, Result};
use seccompiler::{SeccompAction, SeccompCondition};
use thiserror::Error;

/// Sink for compiled rules.
///
/// Implementations decide how rules are stored or emitted; the builder only
/// drives the calls in policy order.
pub trait FilterBackend: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create an empty filter applying `default_action` to unmatched syscalls
    fn new_filter(default_action: SeccompAction) -> std::result::Result<Self, Self::Error>;

    fn add_arch(&mut self, arch: Arch) -> std::result::Result<(), Self::Error>;

    fn set_no_new_privs(&mut self, enabled: bool) -> std::result::Result<(), Self::Error>;

    fn add_rule(&mut self, syscall: i64, action: SeccompAction)
        -> std::result::Result<(), Self::Error>;

    /// Add a rule that applies only when every condition holds
    fn add_rule_conditional(
        &mut self,
        syscall: i64,
        action: SeccompAction,
        conditions: Vec<SeccompCondition>,
    ) -> std::result::Result<(), Self::Error>;
}

/// Rule rejected by [`CompiledFilter`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("requested action matches default action of filter")]
    DefaultActionMatch { syscall: i64 },

    #[error("conditional rule for syscall {syscall} has no conditions")]
    EmptyConditions { syscall: i64 },

    #[error("invalid syscall number {syscall}")]
    InvalidSyscall { syscall: i64 },
}

/// One rule of a [`CompiledFilter`]; empty `conditions` means unconditional.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub syscall: i64,
    pub action: SeccompAction,
    pub conditions: Vec<SeccompCondition>,
}

impl CompiledRule {
    pub fn is_conditional(&self) -> bool {
        !self.conditions.is_empty()
    }
}

/// In-memory filter: default action, architectures and rules in the order
/// they were added.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    default_action: SeccompAction,
    architectures: Vec<Arch>,
    no_new_privs: bool,
    rules: Vec<CompiledRule>,
}

impl CompiledFilter {
    pub fn default_action(&self) -> &SeccompAction {
        &self.default_action
    }

    /// Covered architectures, native first
    pub fn architectures(&self) -> &[Arch] {
        &self.architectures
    }

    /// Whether installing sets `PR_SET_NO_NEW_PRIVS` first
    pub fn no_new_privs(&self) -> bool {
        self.no_new_privs
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Rules for one syscall, in order
    pub fn rules_for(&self, syscall: i64) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(move |rule| rule.syscall == syscall)
    }

    fn push(&mut self, rule: CompiledRule) -> std::result::Result<(), FilterError> {
        if rule.syscall < 0 {
            return Err(FilterError::InvalidSyscall {
                syscall: rule.syscall,
            });
        }
        if rule.action == self.default_action {
            return Err(FilterError::DefaultActionMatch {
                syscall: rule.syscall,
            });
        }
        self.rules.push(rule);
        Ok(())
    }
}

impl FilterBackend for CompiledFilter {
    type Error = FilterError;

    fn new_filter(default_action: SeccompAction) -> std::result::Result<Self, FilterError> {
        Ok(Self {
            default_action,
            architectures: Arch::native().into_iter().collect(),
            no_new_privs: true,
            rules: Vec::new(),
        })
    }

    fn add_arch(&mut self, arch: Arch) -> std::result::Result<(), FilterError> {
        if !self.architectures.contains(&arch) {
            self.architectures.push(arch);
        }
        Ok(())
    }

    fn set_no_new_privs(&mut self, enabled: bool) -> std::result::Result<(), FilterError> {
        self.no_new_privs = enabled;
        Ok(())
    }

    fn add_rule(
        &mut self,
        syscall: i64,
        action: SeccompAction,
    ) -> std::result::Result<(), FilterError> {
        self.push(CompiledRule {
            syscall,
            action,
            conditions: Vec::new(),
        })
    }

    fn add_rule_conditional(
        &mut self,
        syscall: i64,
        action: SeccompAction,
        conditions: Vec<SeccompCondition>,
    ) -> std::result::Result<(), FilterError> {
        if conditions.is_empty() {
            return Err(FilterError::EmptyConditions { syscall });
        }
        self.push(CompiledRule {
            syscall,
            action,
            conditions,
        })
    }
}

/// Builds filters from policies using a syscall resolver.
#[derive(Debug, Clone)]
pub struct FilterBuilder<R = NativeResolver> {
    resolver: R,
}

impl FilterBuilder {
    /// Builder resolving names against the running kernel's ABI
    pub fn native() -> Self {
        Self::new(NativeResolver::new())
    }
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::native()
    }
}

impl<R: SyscallResolver> FilterBuilder<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// Build a filter for `policy` into any backend.
    ///
    /// Entries are compiled in order and the first failure aborts the build;
    /// the partially built filter is dropped.
    pub fn build<B: FilterBackend>(&self, policy: &Policy) -> Result<B> {
        let default_action = translate_action(&policy.default_action, None).map_err(|e| {
            PolicyError::DefaultAction {
                source: Box::new(e),
            }
        })?;

        let mut filter =
            B::new_filter(default_action.clone()).map_err(|e| PolicyError::FilterCreation {
                action: policy.default_action.clone(),
                source: Box::new(e),
            })?;

        for name in &policy.architectures {
            let arch: Arch = name.parse()?;
            filter
                .add_arch(arch)
                .map_err(|e| PolicyError::ArchitectureRegistration {
                    arch: name.clone(),
                    source: Box::new(e),
                })?;
        }

        // callers set no_new_privs themselves before installing
        filter
            .set_no_new_privs(false)
            .map_err(|e| PolicyError::NoNewPrivs {
                source: Box::new(e),
            })?;

        for call in &policy.syscalls {
            compile_syscall(&mut filter, &self.resolver, call.as_ref())?;
        }

        info!(
            "Seccomp: built filter with default {} for {} syscall entries",
            describe(&default_action),
            policy.syscalls.len()
        );

        Ok(filter)
    }

    /// Build an in-memory [`CompiledFilter`]
    pub fn compile(&self, policy: &Policy) -> Result<CompiledFilter> {
        self.build(policy)
    }
}

/// Build a filter for `policy` against the native syscall table.
pub fn build_filter(policy: &Policy) -> Result<CompiledFilter> {
    FilterBuilder::native().compile(policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArgCondition, SyscallRule};
    use policy_core::ErrorKind;

    fn builder() -> FilterBuilder<fn(&str) -> Option<i64>> {
        fn resolve(name: &str) -> Option<i64> {
            match name {
                "read" => Some(0),
                "write" => Some(1),
                "personality" => Some(135),
                _ => None,
            }
        }
        FilterBuilder::new(resolve as fn(&str) -> Option<i64>)
    }

    #[test]
    fn test_empty_policy() {
        let filter = builder().compile(&Policy::new("SCMP_ACT_ALLOW")).unwrap();
        assert_eq!(filter.default_action(), &SeccompAction::Allow);
        assert_eq!(filter.rule_count(), 0);
        assert!(!filter.no_new_privs());
    }

    #[test]
    fn test_errno_default_uses_eperm() {
        let filter = builder().compile(&Policy::new("SCMP_ACT_ERRNO")).unwrap();
        assert_eq!(
            filter.default_action(),
            &SeccompAction::Errno(libc::EPERM as u32)
        );
    }

    #[test]
    fn test_rules_in_policy_order() {
        let policy = Policy::new("SCMP_ACT_ERRNO")
            .with_syscall(SyscallRule::new("write", "SCMP_ACT_ALLOW"))
            .with_syscall(SyscallRule::new("read", "SCMP_ACT_LOG"));
        let filter = builder().compile(&policy).unwrap();
        let syscalls: Vec<i64> = filter.rules().iter().map(|r| r.syscall).collect();
        assert_eq!(syscalls, vec![1, 0]);
        assert!(!filter.rules()[0].is_conditional());
    }

    #[test]
    fn test_architectures_deduplicated() {
        let policy = Policy::new("SCMP_ACT_ALLOW")
            .with_architecture("SCMP_ARCH_X86")
            .with_architecture("x86")
            .with_architecture("SCMP_ARCH_X32");
        let filter = builder().compile(&policy).unwrap();
        let extra: Vec<Arch> = filter
            .architectures()
            .iter()
            .copied()
            .filter(|arch| Some(*arch) != Arch::native())
            .collect();
        assert_eq!(extra, vec![Arch::X86, Arch::X32]);
    }

    #[test]
    fn test_invalid_default_action() {
        let err = builder().compile(&Policy::new("BOGUS")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAction);
        assert_eq!(err.chain(), "convert default action: invalid action BOGUS");
    }

    #[test]
    fn test_invalid_architecture() {
        let policy = Policy::new("SCMP_ACT_ALLOW").with_architecture("SCMP_ARCH_VAX");
        let err = builder().compile(&policy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArchitecture);
    }

    #[test]
    fn test_rule_matching_default_is_rejected() {
        let policy = Policy::new("SCMP_ACT_ALLOW")
            .with_syscall(SyscallRule::new("read", "SCMP_ACT_ALLOW"));
        let err = builder().compile(&policy).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuleAddition);
        assert_eq!(
            err.chain(),
            "add seccomp rule for syscall read: requested action matches default action of filter"
        );
    }

    #[test]
    fn test_same_action_different_errno_is_accepted() {
        let policy = Policy::new("SCMP_ACT_ERRNO")
            .with_syscall(SyscallRule::new("read", "SCMP_ACT_ERRNO").with_errno(38));
        let filter = builder().compile(&policy).unwrap();
        assert_eq!(filter.rules()[0].action, SeccompAction::Errno(38));
    }

    #[test]
    fn test_backend_rejects_bad_rules() {
        let mut filter = CompiledFilter::new_filter(SeccompAction::Allow).unwrap();
        assert_eq!(
            filter.add_rule_conditional(1, SeccompAction::Log, Vec::new()),
            Err(FilterError::EmptyConditions { syscall: 1 })
        );
        assert_eq!(
            filter.add_rule(-1, SeccompAction::Log),
            Err(FilterError::InvalidSyscall { syscall: -1 })
        );
        assert!(filter.add_rule(1, SeccompAction::Log).is_ok());
        assert_eq!(filter.rules_for(1).count(), 1);
    }

    #[test]
    fn test_conditional_rules() {
        let policy = Policy::new("SCMP_ACT_ALLOW").with_syscall(
            SyscallRule::new("personality", "SCMP_ACT_ERRNO")
                .with_arg(ArgCondition::new(0, "SCMP_CMP_NE", 0))
                .with_arg(ArgCondition::new(0, "SCMP_CMP_NE", 8)),
        );
        let filter = builder().compile(&policy).unwrap();
        assert_eq!(filter.rules_for(135).count(), 2);
        assert!(filter.rules().iter().all(|r| r.conditions.len() == 1));
    }

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    #[test]
    fn test_build_filter_native() {
        let policy = Policy::new("SCMP_ACT_ALLOW")
            .with_syscall(SyscallRule::new("ptrace", "SCMP_ACT_ERRNO"))
            .with_syscall(SyscallRule::new("no_such_syscall", "SCMP_ACT_ERRNO"));
        let filter = build_filter(&policy).unwrap();
        assert_eq!(filter.architectures()[0], Arch::X86_64);
        assert_eq!(filter.rule_count(), 1);
        assert_eq!(filter.rules()[0].syscall, 101);
    }
}
