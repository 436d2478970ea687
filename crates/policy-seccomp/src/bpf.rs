//! Lowering compiled filters to BPF and installing them
//!
//! seccompiler emits one match action and one mismatch action per program,
//! so a filter whose rules carry several actions is lowered to a stack of
//! programs:
//!
//! - one program per distinct non-`Allow` rule action, returning that
//!   action for its rules and `Allow` otherwise
//! - a base program returning `Allow` for every ruled syscall and the
//!   default action otherwise (omitted when the default is `Allow`)
//!
//! The kernel runs every installed program and keeps the highest-precedence
//! result, which gives each syscall its rule action or the default.
//!
//! Each program after the first is loaded through `seccomp(2)` under the
//! programs already installed. A program that can stop `seccomp` itself is
//! therefore loaded last, and at most one program may do so.

use crate::action::describe;
use crate::arch::Arch;
use crate::filter::{CompiledFilter, CompiledRule};
use log::{debug, info, warn};
use policy_core::{PolicyError, Result};
use seccompiler::{BpfProgram, SeccompAction, SeccompFilter, SeccompRule, TargetArch};
use std::collections::BTreeMap;
use std::convert::TryInto;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
enum LoweringError {
    #[error("no BPF code generator for architecture {0}")]
    UnsupportedArch(Arch),

    #[error("native architecture is not supported by seccomp")]
    UnknownNativeArch,

    #[error("{0} programs block the seccomp syscall, only the last one installed may")]
    SeccompBlockedEarly(usize),
}

type RuleMap = BTreeMap<i64, Vec<SeccompRule>>;

/// Lower `filter` to the BPF programs to install, in install order.
///
/// Only the native architecture is emitted. An empty list means the filter
/// allows everything and nothing needs installing.
pub fn lower(filter: &CompiledFilter) -> Result<Vec<BpfProgram>> {
    let stages = plan(filter)?;
    let programs = install_order(stages)?;

    debug!(
        "Seccomp: lowered {} rule(s) to {} program(s)",
        filter.rule_count(),
        programs.len()
    );

    Ok(programs)
}

/// Emit every program, flagged when it can stop the `seccomp` syscall
fn plan(filter: &CompiledFilter) -> Result<Vec<(BpfProgram, bool)>> {
    let arch = native_target(filter)?;
    let seccomp = i64::from(libc::SYS_seccomp);

    let mut stages = Vec::new();

    let mut actions: Vec<&SeccompAction> = Vec::new();
    for rule in filter.rules() {
        if rule.action != SeccompAction::Allow && !actions.contains(&&rule.action) {
            actions.push(&rule.action);
        }
    }

    for action in actions {
        let rules = rule_map(filter.rules().iter().filter(|rule| rule.action == *action))?;
        let blocks_seccomp = blocks(action) && rules.contains_key(&seccomp);
        let program = emit(rules, SeccompAction::Allow, action.clone(), arch)?;
        stages.push((program, blocks_seccomp));
    }

    let default = filter.default_action();
    if *default != SeccompAction::Allow {
        let rules = rule_map(filter.rules().iter())?;
        // an empty chain is an unconditional rule, always allowed here
        let blocks_seccomp =
            blocks(default) && rules.get(&seccomp).map_or(true, |chain| !chain.is_empty());
        let program = emit(rules, default.clone(), SeccompAction::Allow, arch)?;
        stages.push((program, blocks_seccomp));
    }

    Ok(stages)
}

/// Keep the order of `stages` but move the one flagged stage to the end
fn install_order<T>(stages: Vec<(T, bool)>) -> Result<Vec<T>> {
    let (last, mut order): (Vec<_>, Vec<_>) = stages.into_iter().partition(|(_, flag)| *flag);
    if last.len() > 1 {
        return Err(lowering(LoweringError::SeccompBlockedEarly(last.len())));
    }
    order.extend(last);
    Ok(order.into_iter().map(|(program, _)| program).collect())
}

/// Whether `action` keeps the syscall from running
fn blocks(action: &SeccompAction) -> bool {
    !matches!(action, SeccompAction::Allow | SeccompAction::Log)
}

impl CompiledFilter {
    /// Lower this filter to BPF programs; see [`lower`]
    pub fn to_bpf_programs(&self) -> Result<Vec<BpfProgram>> {
        lower(self)
    }
}

fn native_target(filter: &CompiledFilter) -> Result<TargetArch> {
    let native = Arch::native().ok_or_else(|| PolicyError::Lowering {
        source: Box::new(LoweringError::UnknownNativeArch),
    })?;

    for arch in filter.architectures() {
        if *arch != native {
            warn!(
                "Seccomp: skipping {}, only the native architecture is lowered",
                arch
            );
        }
    }

    native.target_arch().ok_or_else(|| PolicyError::Lowering {
        source: Box::new(LoweringError::UnsupportedArch(native)),
    })
}

/// Merge rules per syscall. An unconditional rule subsumes every
/// conditional rule for the same syscall.
fn rule_map<'a, I>(rules: I) -> Result<RuleMap>
where
    I: Iterator<Item = &'a CompiledRule>,
{
    let mut map: BTreeMap<i64, Option<Vec<SeccompRule>>> = BTreeMap::new();

    for rule in rules {
        let chain = map.entry(rule.syscall).or_insert_with(|| Some(Vec::new()));
        if !rule.is_conditional() {
            *chain = None;
            continue;
        }
        if let Some(chain) = chain {
            let rule = SeccompRule::new(rule.conditions.clone()).map_err(lowering)?;
            chain.push(rule);
        }
    }

    Ok(map
        .into_iter()
        .map(|(syscall, chain)| (syscall, chain.unwrap_or_default()))
        .collect())
}

fn emit(
    rules: RuleMap,
    mismatch: SeccompAction,
    on_match: SeccompAction,
    arch: TargetArch,
) -> Result<BpfProgram> {
    let filter = SeccompFilter::new(rules, mismatch, on_match, arch).map_err(lowering)?;
    filter.try_into().map_err(lowering)
}

fn lowering<E>(err: E) -> PolicyError
where
    E: std::error::Error + Send + Sync + 'static,
{
    PolicyError::Lowering {
        source: Box::new(err),
    }
}

/// Installs a compiled filter into the current process
pub trait FilterInstaller {
    fn install(&self, filter: &CompiledFilter) -> Result<()>;
}

/// Installs filters with the `seccomp(2)` syscall.
///
/// `PR_SET_NO_NEW_PRIVS` is set once before the first program, so callers
/// need no `CAP_SYS_ADMIN`.
#[derive(Debug, Clone, Copy)]
pub struct KernelInstaller {
    all_threads: bool,
}

impl KernelInstaller {
    pub fn new() -> Self {
        Self { all_threads: false }
    }

    /// Synchronize the filter to every thread of the process
    pub fn all_threads(mut self, enabled: bool) -> Self {
        self.all_threads = enabled;
        self
    }
}

impl Default for KernelInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterInstaller for KernelInstaller {
    fn install(&self, filter: &CompiledFilter) -> Result<()> {
        let programs = filter.to_bpf_programs()?;

        if programs.is_empty() {
            info!("Seccomp: filter allows every syscall, nothing to install");
            return Ok(());
        }

        set_no_new_privs().map_err(install_error)?;

        let flags = if self.all_threads {
            libc::SECCOMP_FILTER_FLAG_TSYNC
        } else {
            0
        };

        // logged up front: once installed the filter may block stderr
        info!(
            "Seccomp: installing {} program(s), default {}",
            programs.len(),
            describe(filter.default_action())
        );

        for program in &programs {
            seccomp_set_mode_filter(program, flags).map_err(install_error)?;
        }

        Ok(())
    }
}

/// Lower and install `filter` into the calling thread.
pub fn install_filter(filter: &CompiledFilter) -> Result<()> {
    KernelInstaller::new().install(filter)
}

#[derive(Error, Debug)]
enum InstallError {
    #[error("thread {0} could not be synchronized to the filter")]
    ThreadSync(libc::c_long),

    #[error(transparent)]
    Os(#[from] io::Error),
}

fn install_error<E>(err: E) -> PolicyError
where
    InstallError: From<E>,
{
    PolicyError::Install {
        source: Box::new(InstallError::from(err)),
    }
}

#[repr(C)]
struct SockFprog {
    len: libc::c_ushort,
    filter: *const seccompiler::sock_filter,
}

fn set_no_new_privs() -> io::Result<()> {
    let rc = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn seccomp_set_mode_filter(
    program: &BpfProgram,
    flags: libc::c_ulong,
) -> std::result::Result<(), InstallError> {
    let len = libc::c_ushort::try_from(program.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "BPF program too long"))?;
    if len == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty BPF program").into());
    }

    let prog = SockFprog {
        len,
        filter: program.as_ptr(),
    };

    // SAFETY: prog points at `len` valid instructions borrowed from `program`
    let rc = unsafe {
        libc::syscall(
            libc::SYS_seccomp,
            libc::SECCOMP_SET_MODE_FILTER,
            flags,
            &prog as *const SockFprog,
        )
    };
    // with TSYNC a positive value is the thread that could not be synchronized
    if rc > 0 {
        return Err(InstallError::ThreadSync(rc));
    }
    if rc != 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}
