//! Blast-radius limiting.

use crate::errors::ExperimentError;
use crate::model::BlastRadiusSpec;

/// Restrict an eligible population to at most `spec.percentage` of it.
///
/// Selection is deterministic: sort by target id, take the first
/// `ceil(len * percentage / 100)`, minimum one. Repeated experiments
/// against an unchanged population therefore pick the same targets, which
/// keeps runs reproducible for audit. Deliberately not random.
pub fn select_targets(
    eligible: &[String],
    spec: &BlastRadiusSpec,
) -> Result<Vec<String>, ExperimentError> {
    spec.validate()?;
    if eligible.is_empty() {
        // An abort, not a silent no-op: skipping the experiment would
        // report a false success.
        return Err(ExperimentError::EmptyPopulation);
    }

    let mut pool = eligible.to_vec();
    pool.sort();
    let count = (pool.len() * spec.percentage as usize)
        .div_ceil(100)
        .clamp(1, pool.len());
    pool.truncate(count);
    Ok(pool)
}
