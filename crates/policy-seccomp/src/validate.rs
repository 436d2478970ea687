//! Policy validation
//!
//! Validation runs the full build and discards the result, so a policy
//! validates exactly when it would build.

use crate::filter::{CompiledFilter, FilterBuilder};
use crate::model::Policy;
use crate::resolver::SyscallResolver;
use log::debug;
use policy_core::{PolicyError, Result};

/// Decode a JSON policy and check that it builds against the native table.
///
/// Decode failures are returned as [`PolicyError::Decode`]; build failures
/// are wrapped in [`PolicyError::Build`].
pub fn validate(content: &str) -> Result<()> {
    let policy = Policy::from_json(content)?;
    validate_policy(&policy)
}

/// Check that an already decoded policy builds against the native table.
pub fn validate_policy(policy: &Policy) -> Result<()> {
    validate_with(&FilterBuilder::native(), policy)
}

/// Check that `policy` builds with the given builder.
pub fn validate_with<R: SyscallResolver>(builder: &FilterBuilder<R>, policy: &Policy) -> Result<()> {
    let filter: CompiledFilter = builder.build(policy).map_err(|e| PolicyError::Build {
        source: Box::new(e),
    })?;
    debug!("Seccomp: policy valid, {} rule(s)", filter.rule_count());
    Ok(())
}
