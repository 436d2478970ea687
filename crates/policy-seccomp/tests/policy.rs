//! Policy compilation tests
//!
//! These run against a fake resolver and a backend that records every call,
//! so they do not depend on the host syscall table.

use policy_core::{ErrorKind, PolicyError};
use policy_seccomp::{
    validate_with, ArgCondition, Arch, FilterBackend, FilterBuilder, Policy, SyscallRule,
};
use seccompiler::{SeccompAction, SeccompCmpArgLen, SeccompCmpOp, SeccompCondition};
use std::cell::RefCell;
use std::fmt;

thread_local! {
    /// Every rule added on this thread, kept even when the build fails
    static JOURNAL: RefCell<Vec<Call>> = const { RefCell::new(Vec::new()) };
}

fn journal() -> Vec<Call> {
    JOURNAL.with(|journal| journal.borrow().clone())
}

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("refused by backend")
    }
}

impl std::error::Error for Refused {}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Arch(Arch),
    NoNewPrivs(bool),
    Rule(i64, SeccompAction),
    Conditional(i64, SeccompAction, Vec<SeccompCondition>),
}

#[derive(Debug)]
struct Recording {
    default_action: SeccompAction,
    calls: Vec<Call>,
}

impl Recording {
    fn record(&mut self, call: Call) {
        JOURNAL.with(|journal| journal.borrow_mut().push(call.clone()));
        self.calls.push(call);
    }

    fn rules(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Rule(..) | Call::Conditional(..)))
            .collect()
    }
}

impl FilterBackend for Recording {
    type Error = Refused;

    fn new_filter(default_action: SeccompAction) -> Result<Self, Refused> {
        Ok(Self {
            default_action,
            calls: Vec::new(),
        })
    }

    fn add_arch(&mut self, arch: Arch) -> Result<(), Refused> {
        self.calls.push(Call::Arch(arch));
        Ok(())
    }

    fn set_no_new_privs(&mut self, enabled: bool) -> Result<(), Refused> {
        self.calls.push(Call::NoNewPrivs(enabled));
        Ok(())
    }

    fn add_rule(&mut self, syscall: i64, action: SeccompAction) -> Result<(), Refused> {
        self.record(Call::Rule(syscall, action));
        Ok(())
    }

    fn add_rule_conditional(
        &mut self,
        syscall: i64,
        action: SeccompAction,
        conditions: Vec<SeccompCondition>,
    ) -> Result<(), Refused> {
        self.record(Call::Conditional(syscall, action, conditions));
        Ok(())
    }
}

/// Backend that cannot be created
#[derive(Debug)]
struct Broken;

impl FilterBackend for Broken {
    type Error = Refused;

    fn new_filter(_default_action: SeccompAction) -> Result<Self, Refused> {
        Err(Refused)
    }

    fn add_arch(&mut self, _arch: Arch) -> Result<(), Refused> {
        Ok(())
    }

    fn set_no_new_privs(&mut self, _enabled: bool) -> Result<(), Refused> {
        Ok(())
    }

    fn add_rule(&mut self, _syscall: i64, _action: SeccompAction) -> Result<(), Refused> {
        Ok(())
    }

    fn add_rule_conditional(
        &mut self,
        _syscall: i64,
        _action: SeccompAction,
        _conditions: Vec<SeccompCondition>,
    ) -> Result<(), Refused> {
        Ok(())
    }
}

fn fake_resolver(name: &str) -> Option<i64> {
    match name {
        "read" => Some(0),
        "write" => Some(1),
        "mount" => Some(165),
        "personality" => Some(135),
        "socket" => Some(41),
        _ => None,
    }
}

fn builder() -> FilterBuilder<fn(&str) -> Option<i64>> {
    FilterBuilder::new(fake_resolver as fn(&str) -> Option<i64>)
}

fn eq(index: u8, value: u64) -> SeccompCondition {
    SeccompCondition::new(index, SeccompCmpArgLen::Qword, SeccompCmpOp::Eq, value).unwrap()
}

fn build(policy: &Policy) -> Result<Recording, PolicyError> {
    builder().build::<Recording>(policy)
}

#[test]
fn well_formed_policy_builds() {
    let policy = Policy::from_json(
        r#"{
            "defaultAction": "SCMP_ACT_ERRNO",
            "architectures": ["SCMP_ARCH_X86"],
            "syscalls": [
                {"name": "read", "action": "SCMP_ACT_ALLOW"},
                {"name": "write", "action": "SCMP_ACT_ALLOW"},
                {"name": "mount", "action": "SCMP_ACT_KILL_PROCESS"}
            ]
        }"#,
    )
    .unwrap();

    let filter = build(&policy).unwrap();
    assert_eq!(filter.default_action, SeccompAction::Errno(libc::EPERM as u32));
    assert_eq!(
        filter.calls,
        vec![
            Call::Arch(Arch::X86),
            Call::NoNewPrivs(false),
            Call::Rule(0, SeccompAction::Allow),
            Call::Rule(1, SeccompAction::Allow),
            Call::Rule(165, SeccompAction::KillProcess),
        ]
    );
}

#[test]
fn empty_name_stops_the_build() {
    let policy = Policy::new("SCMP_ACT_ALLOW")
        .with_syscall(SyscallRule::new("read", "SCMP_ACT_ERRNO"))
        .with_syscall(SyscallRule::new("", "SCMP_ACT_ERRNO"))
        .with_syscall(SyscallRule::new("write", "SCMP_ACT_ERRNO"));

    let err = build(&policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptySyscallName);
    assert_eq!(
        journal(),
        vec![Call::Rule(0, SeccompAction::Errno(libc::EPERM as u32))]
    );
}

#[test]
fn null_entry_is_rejected() {
    let policy = Policy::from_json(
        r#"{"defaultAction": "SCMP_ACT_ALLOW", "syscalls": [null]}"#,
    )
    .unwrap();
    let err = build(&policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NilSyscallEntry);
}

#[test]
fn unresolved_syscalls_are_skipped() {
    let policy = Policy::new("SCMP_ACT_ALLOW")
        .with_syscall(SyscallRule::new("definitely_not_a_syscall", "SCMP_ACT_ERRNO"))
        .with_syscall(SyscallRule::new("socket", "SCMP_ACT_ERRNO").with_errno(97));

    let filter = build(&policy).unwrap();
    assert_eq!(filter.rules(), vec![&Call::Rule(41, SeccompAction::Errno(97))]);
}

#[test]
fn same_index_conditions_are_ored() {
    let policy = Policy::new("SCMP_ACT_ERRNO").with_syscall(
        SyscallRule::new("personality", "SCMP_ACT_ALLOW")
            .with_arg(ArgCondition::new(0, "SCMP_CMP_EQ", 0))
            .with_arg(ArgCondition::new(0, "SCMP_CMP_EQ", 8))
            .with_arg(ArgCondition::new(0, "SCMP_CMP_EQ", 0x20000)),
    );

    let filter = build(&policy).unwrap();
    assert_eq!(
        filter.rules(),
        vec![
            &Call::Conditional(135, SeccompAction::Allow, vec![eq(0, 0)]),
            &Call::Conditional(135, SeccompAction::Allow, vec![eq(0, 8)]),
            &Call::Conditional(135, SeccompAction::Allow, vec![eq(0, 0x20000)]),
        ]
    );
}

#[test]
fn distinct_index_conditions_are_anded() {
    let policy = Policy::new("SCMP_ACT_ALLOW").with_syscall(
        SyscallRule::new("socket", "SCMP_ACT_ERRNO")
            .with_arg(ArgCondition::new(0, "SCMP_CMP_EQ", 16))
            .with_arg(ArgCondition::new(2, "SCMP_CMP_EQ", 9)),
    );

    let filter = build(&policy).unwrap();
    assert_eq!(
        filter.rules(),
        vec![&Call::Conditional(
            41,
            SeccompAction::Errno(libc::EPERM as u32),
            vec![eq(0, 16), eq(2, 9)]
        )]
    );
}

#[test]
fn masked_equal_condition() {
    let policy = Policy::new("SCMP_ACT_ALLOW").with_syscall(
        SyscallRule::new("mount", "SCMP_ACT_ERRNO")
            .with_arg(ArgCondition::masked(3, 0x1, 0x1)),
    );

    let filter = build(&policy).unwrap();
    let expected = SeccompCondition::new(
        3,
        SeccompCmpArgLen::Qword,
        SeccompCmpOp::MaskedEq(0x1),
        0x1,
    )
    .unwrap();
    assert_eq!(
        filter.rules(),
        vec![&Call::Conditional(
            165,
            SeccompAction::Errno(libc::EPERM as u32),
            vec![expected]
        )]
    );
}

#[test]
fn errno_return_codes() {
    let policy = Policy::from_json(
        r#"{
            "defaultAction": "SCMP_ACT_ALLOW",
            "syscalls": [
                {"name": "read", "action": "SCMP_ACT_ERRNO"},
                {"name": "write", "action": "SCMP_ACT_ERRNO", "errnoRet": 38},
                {"name": "mount", "action": "SCMP_ACT_TRACE", "errnoRet": 0}
            ]
        }"#,
    )
    .unwrap();

    let filter = build(&policy).unwrap();
    assert_eq!(
        filter.rules(),
        vec![
            &Call::Rule(0, SeccompAction::Errno(libc::EPERM as u32)),
            &Call::Rule(1, SeccompAction::Errno(38)),
            &Call::Rule(165, SeccompAction::Trace(0)),
        ]
    );
}

#[test]
fn invalid_default_action_adds_nothing() {
    let policy = Policy::new("SCMP_ACT_EXPLODE")
        .with_syscall(SyscallRule::new("read", "SCMP_ACT_ALLOW"));
    let err = build(&policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAction);
    assert!(err.chain().contains("SCMP_ACT_EXPLODE"));
    assert!(journal().is_empty());
}

#[test]
fn invalid_rule_action_names_the_syscall() {
    let policy = Policy::new("SCMP_ACT_ALLOW")
        .with_syscall(SyscallRule::new("write", "SCMP_ACT_ERRNO"))
        .with_syscall(SyscallRule::new("read", "SCMP_ACT_EXPLODE"));
    let err = build(&policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAction);
    assert_eq!(
        err.chain(),
        "convert action for syscall read: invalid action SCMP_ACT_EXPLODE"
    );
    assert_eq!(
        journal(),
        vec![Call::Rule(1, SeccompAction::Errno(libc::EPERM as u32))]
    );
}

#[test]
fn invalid_operator_aborts_the_build() {
    let policy = Policy::new("SCMP_ACT_ALLOW")
        .with_syscall(
            SyscallRule::new("personality", "SCMP_ACT_ERRNO")
                .with_arg(ArgCondition::new(0, "SCMP_CMP_SORTA_EQ", 1)),
        )
        .with_syscall(SyscallRule::new("read", "SCMP_ACT_ERRNO"));
    let err = build(&policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperator);
    assert!(journal().is_empty());
    assert_eq!(
        err.chain(),
        "create seccomp syscall condition for syscall personality: \
         invalid operator SCMP_CMP_SORTA_EQ"
    );
}

#[test]
fn invalid_architecture() {
    let policy = Policy::new("SCMP_ACT_ALLOW").with_architecture("SCMP_ARCH_PDP11");
    let err = build(&policy).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArchitecture);
}

#[test]
fn backend_creation_failure() {
    let err = builder()
        .build::<Broken>(&Policy::new("SCMP_ACT_LOG"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FilterCreation);
    assert_eq!(
        err.chain(),
        "create filter for default action SCMP_ACT_LOG: refused by backend"
    );
}

#[test]
fn validate_agrees_with_build() {
    let policies = [
        Policy::new("SCMP_ACT_ALLOW"),
        Policy::new("SCMP_ACT_NOPE"),
        Policy::new("SCMP_ACT_ERRNO").with_syscall(SyscallRule::new("read", "SCMP_ACT_ALLOW")),
        Policy::new("SCMP_ACT_ALLOW").with_syscall(SyscallRule::new("", "SCMP_ACT_ERRNO")),
        Policy::new("SCMP_ACT_ALLOW").with_syscall(
            SyscallRule::new("mount", "SCMP_ACT_ERRNO")
                .with_arg(ArgCondition::new(9, "SCMP_CMP_EQ", 0)),
        ),
        Policy::new("SCMP_ACT_ALLOW").with_architecture("mips64"),
    ];

    for policy in &policies {
        let built = builder().compile(policy);
        let validated = validate_with(&builder(), policy);
        assert_eq!(built.is_ok(), validated.is_ok(), "{:?}", policy);
        if let (Err(build_err), Err(validate_err)) = (built, validated) {
            assert_eq!(build_err.kind(), validate_err.kind());
            assert_eq!(
                validate_err.chain(),
                format!("build seccomp filter: {}", build_err.chain())
            );
        }
    }
}
