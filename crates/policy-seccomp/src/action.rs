//! Policy actions and their seccomp equivalents

use policy_core::{PolicyError, Result};
use seccompiler::SeccompAction;
use std::fmt;
use std::str::FromStr;

/// Return code used by `Errno` and `Trace` when the policy gives none
pub const DEFAULT_ERRNO: u16 = libc::EPERM as u16;

/// Action a filter takes when a rule (or the default) applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Kill the calling thread
    Kill,
    /// Kill the whole process
    KillProcess,
    /// Fail the syscall with a return code
    Errno,
    /// Deliver `SIGSYS`
    Trap,
    Allow,
    /// Notify a ptrace tracer, passing a return code
    Trace,
    /// Allow after logging
    Log,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Kill,
        Action::KillProcess,
        Action::Errno,
        Action::Trap,
        Action::Allow,
        Action::Trace,
        Action::Log,
    ];

    /// Canonical policy name
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Kill => "SCMP_ACT_KILL",
            Action::KillProcess => "SCMP_ACT_KILL_PROCESS",
            Action::Errno => "SCMP_ACT_ERRNO",
            Action::Trap => "SCMP_ACT_TRAP",
            Action::Allow => "SCMP_ACT_ALLOW",
            Action::Trace => "SCMP_ACT_TRACE",
            Action::Log => "SCMP_ACT_LOG",
        }
    }

    /// Whether the action carries a return code
    pub fn takes_return_code(&self) -> bool {
        matches!(self, Action::Errno | Action::Trace)
    }

    /// Concrete seccomp action. `return_code` only matters for `Errno` and
    /// `Trace`, which fall back to [`DEFAULT_ERRNO`].
    pub fn to_seccomp(self, return_code: Option<u16>) -> SeccompAction {
        let code = u32::from(return_code.unwrap_or(DEFAULT_ERRNO));
        match self {
            Action::Kill => SeccompAction::KillThread,
            Action::KillProcess => SeccompAction::KillProcess,
            Action::Errno => SeccompAction::Errno(code),
            Action::Trap => SeccompAction::Trap,
            Action::Allow => SeccompAction::Allow,
            Action::Trace => SeccompAction::Trace(code),
            Action::Log => SeccompAction::Log,
        }
    }
}

impl FromStr for Action {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SCMP_ACT_KILL" | "SCMP_ACT_KILL_THREAD" => Ok(Action::Kill),
            "SCMP_ACT_KILL_PROCESS" => Ok(Action::KillProcess),
            "SCMP_ACT_ERRNO" => Ok(Action::Errno),
            "SCMP_ACT_TRAP" => Ok(Action::Trap),
            "SCMP_ACT_ALLOW" => Ok(Action::Allow),
            "SCMP_ACT_TRACE" => Ok(Action::Trace),
            "SCMP_ACT_LOG" => Ok(Action::Log),
            _ => Err(PolicyError::InvalidAction {
                action: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a policy action name into a concrete seccomp action.
pub fn translate_action(name: &str, return_code: Option<u16>) -> Result<SeccompAction> {
    let action: Action = name.parse()?;
    Ok(action.to_seccomp(return_code))
}

/// Short human-readable rendering of a concrete action
pub fn describe(action: &SeccompAction) -> String {
    match action {
        SeccompAction::Allow => "allow".to_string(),
        SeccompAction::Errno(code) => format!("errno({})", code),
        SeccompAction::KillThread => "kill_thread".to_string(),
        SeccompAction::KillProcess => "kill_process".to_string(),
        SeccompAction::Log => "log".to_string(),
        SeccompAction::Trace(code) => format!("trace({})", code),
        SeccompAction::Trap => "trap".to_string(),
    }
}
