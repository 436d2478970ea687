//! Per-syscall rule compilation
//!
//! A native multi-condition rule ANDs its conditions. Two conditions on the
//! same argument can then never hold together, so when any argument index
//! is referenced more than once every condition becomes its own rule and
//! the rules are ORed. Otherwise all conditions go into a single rule.

use crate::action::{describe, translate_action};
use crate::condition::translate_indexed;
use crate::filter::FilterBackend;
use crate::model::SyscallRule;
use crate::resolver::SyscallResolver;
use log::debug;
use policy_core::{PolicyError, Result};
use std::collections::BTreeMap;

/// How the conditions of one syscall entry are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    /// One rule holding every condition
    All,
    /// One rule per condition
    Any,
}

/// Decide how conditions on the given argument indices combine.
pub fn classify<I>(indices: I) -> Combination
where
    I: IntoIterator<Item = u8>,
{
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for index in indices {
        *counts.entry(index).or_default() += 1;
    }

    if counts.values().any(|&count| count > 1) {
        Combination::Any
    } else {
        Combination::All
    }
}

/// Group indexed conditions into the condition lists of the rules to add.
///
/// Every returned group becomes one rule. An empty input yields no groups.
pub fn classify_and_emit<C>(conditions: Vec<(u8, C)>) -> Vec<Vec<C>> {
    if conditions.is_empty() {
        return Vec::new();
    }

    match classify(conditions.iter().map(|(index, _)| *index)) {
        Combination::All => vec![conditions.into_iter().map(|(_, cond)| cond).collect()],
        Combination::Any => conditions
            .into_iter()
            .map(|(_, cond)| vec![cond])
            .collect(),
    }
}

/// Compile one syscall entry into `filter`.
///
/// Syscalls the resolver does not know are skipped without error, so one
/// policy can serve kernels with different syscall sets. On error the
/// filter may hold rules from earlier entries and must be discarded.
pub fn compile_syscall<B, R>(
    filter: &mut B,
    resolver: &R,
    call: Option<&SyscallRule>,
) -> Result<()>
where
    B: FilterBackend,
    R: SyscallResolver + ?Sized,
{
    let call = call.ok_or(PolicyError::NilSyscallEntry)?;

    if call.name.is_empty() {
        return Err(PolicyError::EmptySyscallName);
    }

    let Some(number) = resolver.resolve(&call.name) else {
        debug!("Seccomp: skipping unknown syscall {}", call.name);
        return Ok(());
    };

    let action =
        translate_action(&call.action, call.errno_ret).map_err(|e| PolicyError::Action {
            syscall: call.name.clone(),
            source: Box::new(e),
        })?;

    let rule_error = |e: B::Error| PolicyError::RuleAddition {
        syscall: call.name.clone(),
        source: Box::new(e),
    };

    if call.args.is_empty() {
        filter.add_rule(number, action.clone()).map_err(rule_error)?;
        debug!("Seccomp: {} ({}) -> {}", call.name, number, describe(&action));
        return Ok(());
    }

    let mut conditions = Vec::with_capacity(call.args.len());
    for arg in &call.args {
        let indexed = translate_indexed(arg.as_ref()).map_err(|e| PolicyError::Condition {
            syscall: call.name.clone(),
            source: Box::new(e),
        })?;
        conditions.push(indexed);
    }

    let groups = classify_and_emit(conditions);
    debug!(
        "Seccomp: {} ({}) -> {} in {} rule(s)",
        call.name,
        number,
        describe(&action),
        groups.len()
    );

    for group in groups {
        filter
            .add_rule_conditional(number, action.clone(), group)
            .map_err(rule_error)?;
    }

    Ok(())
}
