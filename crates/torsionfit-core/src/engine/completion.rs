use crate::core::forcefield::params::{DihedralParameterSet, DihedralTerm, StoreError};
use crate::core::models::torsion::{Periodicity, TorsionKey};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Pads every selected torsion with zero-strength terms so that each candidate
/// periodicity has exactly one term to write to.
///
/// A periodicity counts as present if it appears on either orientation. Missing
/// ones get a placeholder (force constant 0, phase 0) appended to both
/// orientations. Running this twice adds nothing the second time.
///
/// Returns the number of placeholders added.
pub fn add_missing_multiplicities(
    parameters: &mut DihedralParameterSet,
    torsions: &[TorsionKey],
    candidates: &[Periodicity],
) -> Result<usize, StoreError> {
    let mut added = 0;
    for torsion in torsions {
        let present = present_periodicities(parameters, torsion)?;
        for &periodicity in candidates {
            if present.contains(&periodicity) {
                continue;
            }
            parameters.push_term(torsion, DihedralTerm::placeholder(periodicity))?;
            debug!(
                "Added placeholder term with periodicity {} to torsion {}.",
                periodicity, torsion
            );
            added += 1;
        }
    }
    info!(
        "Completed {} torsion(s) with {} placeholder term(s).",
        torsions.len(),
        added
    );
    Ok(added)
}

fn present_periodicities(
    parameters: &DihedralParameterSet,
    torsion: &TorsionKey,
) -> Result<BTreeSet<Periodicity>, StoreError> {
    let forward = parameters
        .get_terms(torsion)
        .ok_or_else(|| StoreError::MissingTorsion(torsion.clone()))?;
    let reverse = parameters.get_terms(&torsion.reversed()).unwrap_or(&[]);
    Ok(forward
        .iter()
        .chain(reverse)
        .map(|term| term.periodicity)
        .collect())
}
