//! Error types for policy compilation

use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Boxed root cause carried by wrapping variants
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur while decoding, compiling or installing a policy.
///
/// Context variants (`DefaultAction`, `Action`, `Condition`, `Build`) wrap
/// another `PolicyError`; use [`PolicyError::kind`] to get the root
/// discriminant and [`PolicyError::chain`] for the full diagnostic.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("decoding seccomp policy")]
    Decode {
        #[source]
        source: BoxError,
    },

    #[error("invalid action {action}")]
    InvalidAction { action: String },

    #[error("invalid operator {op}")]
    InvalidOperator { op: String },

    #[error("invalid architecture {arch}")]
    InvalidArchitecture { arch: String },

    #[error("empty string is not a valid syscall")]
    EmptySyscallName,

    #[error("encountered nil syscall while initializing seccomp")]
    NilSyscallEntry,

    #[error("cannot convert nil to syscall condition")]
    NilCondition,

    #[error("make condition on argument {index}")]
    ConditionConstruction {
        index: u32,
        #[source]
        source: BoxError,
    },

    #[error("create filter for default action {action}")]
    FilterCreation {
        action: String,
        #[source]
        source: BoxError,
    },

    #[error("add architecture {arch} to seccomp filter")]
    ArchitectureRegistration {
        arch: String,
        #[source]
        source: BoxError,
    },

    #[error("add seccomp rule for syscall {syscall}")]
    RuleAddition {
        syscall: String,
        #[source]
        source: BoxError,
    },

    #[error("set no new privileges flag")]
    NoNewPrivs {
        #[source]
        source: BoxError,
    },

    #[error("convert default action")]
    DefaultAction {
        #[source]
        source: Box<PolicyError>,
    },

    #[error("convert action for syscall {syscall}")]
    Action {
        syscall: String,
        #[source]
        source: Box<PolicyError>,
    },

    #[error("create seccomp syscall condition for syscall {syscall}")]
    Condition {
        syscall: String,
        #[source]
        source: Box<PolicyError>,
    },

    #[error("build seccomp filter")]
    Build {
        #[source]
        source: Box<PolicyError>,
    },

    #[error("lower seccomp filter to BPF")]
    Lowering {
        #[source]
        source: BoxError,
    },

    #[error("install seccomp filter")]
    Install {
        #[source]
        source: BoxError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Stable discriminant of a [`PolicyError`], with context wrappers removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Decode,
    InvalidAction,
    InvalidOperator,
    InvalidArchitecture,
    EmptySyscallName,
    NilSyscallEntry,
    NilCondition,
    ConditionConstruction,
    FilterCreation,
    ArchitectureRegistration,
    RuleAddition,
    NoNewPrivs,
    Lowering,
    Install,
    Io,
}

impl PolicyError {
    /// Root discriminant, looking through `DefaultAction`, `Action`,
    /// `Condition` and `Build` wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::Decode { .. } => ErrorKind::Decode,
            PolicyError::InvalidAction { .. } => ErrorKind::InvalidAction,
            PolicyError::InvalidOperator { .. } => ErrorKind::InvalidOperator,
            PolicyError::InvalidArchitecture { .. } => ErrorKind::InvalidArchitecture,
            PolicyError::EmptySyscallName => ErrorKind::EmptySyscallName,
            PolicyError::NilSyscallEntry => ErrorKind::NilSyscallEntry,
            PolicyError::NilCondition => ErrorKind::NilCondition,
            PolicyError::ConditionConstruction { .. } => ErrorKind::ConditionConstruction,
            PolicyError::FilterCreation { .. } => ErrorKind::FilterCreation,
            PolicyError::ArchitectureRegistration { .. } => ErrorKind::ArchitectureRegistration,
            PolicyError::RuleAddition { .. } => ErrorKind::RuleAddition,
            PolicyError::NoNewPrivs { .. } => ErrorKind::NoNewPrivs,
            PolicyError::Lowering { .. } => ErrorKind::Lowering,
            PolicyError::Install { .. } => ErrorKind::Install,
            PolicyError::Io(_) => ErrorKind::Io,
            PolicyError::DefaultAction { source }
            | PolicyError::Action { source, .. }
            | PolicyError::Condition { source, .. }
            | PolicyError::Build { source } => source.kind(),
        }
    }

    /// Render the error and all of its causes, outermost first, joined by `": "`.
    pub fn chain(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut cause = StdError::source(self);
        while let Some(err) = cause {
            parts.push(err.to_string());
            cause = err.source();
        }
        parts.join(": ")
    }

    /// Wrap any error as a [`PolicyError::Decode`]
    pub fn decode<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        PolicyError::Decode {
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PolicyError::InvalidAction {
            action: "BOGUS".to_string(),
        };
        assert_eq!(err.to_string(), "invalid action BOGUS");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = PolicyError::from(io_err);
        assert!(err.to_string().contains("IO error"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_kind_looks_through_wrappers() {
        let err = PolicyError::Build {
            source: Box::new(PolicyError::Action {
                syscall: "read".to_string(),
                source: Box::new(PolicyError::InvalidAction {
                    action: "BOGUS".to_string(),
                }),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidAction);
    }

    #[test]
    fn test_chain_renders_every_cause() {
        let err = PolicyError::Build {
            source: Box::new(PolicyError::Condition {
                syscall: "personality".to_string(),
                source: Box::new(PolicyError::InvalidOperator {
                    op: "SCMP_CMP_BOGUS".to_string(),
                }),
            }),
        };
        assert_eq!(
            err.chain(),
            "build seccomp filter: create seccomp syscall condition for syscall personality: \
             invalid operator SCMP_CMP_BOGUS"
        );
    }

    #[test]
    fn test_decode_keeps_source() {
        let inner = io::Error::new(io::ErrorKind::InvalidData, "bad json");
        let err = PolicyError::decode(inner);
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.chain(), "decoding seccomp policy: bad json");
    }

    #[test]
    fn test_result_error() {
        fn returns_error() -> Result<()> {
            Err(PolicyError::EmptySyscallName)
        }
        assert!(returns_error().is_err());
    }
}
