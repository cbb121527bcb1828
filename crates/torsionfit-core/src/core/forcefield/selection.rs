use super::params::DihedralParameterSet;
use crate::core::models::torsion::TorsionKey;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SelectionError {
    #[error("No torsions to optimize: provide an explicit torsion list or a parameter stream")]
    NothingToOptimize,
    #[error("The explicit list of torsions to optimize is empty")]
    EmptyExplicitList,
    #[error("Torsion {0} is not defined in the parameter set")]
    UnknownTorsion(TorsionKey),
}

/// Determines which torsions are tunable.
///
/// An explicit list wins and is kept in the given order and orientation, minus
/// duplicates. Otherwise every torsion that `stream` adds to or changes in
/// `base` is selected, in canonical orientation. A given `stream` is merged
/// into `base` either way, so its terms become the starting point of the fit.
pub fn select_torsions(
    base: &mut DihedralParameterSet,
    stream: Option<&DihedralParameterSet>,
    explicit: Option<&[TorsionKey]>,
) -> Result<Vec<TorsionKey>, SelectionError> {
    let selected = match (explicit, stream) {
        (Some(keys), _) => {
            if let Some(stream) = stream {
                info!(
                    "Merging {} stream torsion(s) into the base parameter set.",
                    stream.len()
                );
                base.merge(stream);
            }
            select_explicit(base, keys)?
        }
        (None, Some(stream)) => {
            let selected = diff_stream(base, stream);
            base.merge(stream);
            selected
        }
        (None, None) => return Err(SelectionError::NothingToOptimize),
    };

    if selected.is_empty() {
        return Err(SelectionError::NothingToOptimize);
    }
    info!("Selected {} torsion(s) to optimize.", selected.len());
    Ok(selected)
}

fn select_explicit(
    base: &DihedralParameterSet,
    keys: &[TorsionKey],
) -> Result<Vec<TorsionKey>, SelectionError> {
    if keys.is_empty() {
        return Err(SelectionError::EmptyExplicitList);
    }

    let mut selected: Vec<TorsionKey> = Vec::with_capacity(keys.len());
    for key in keys {
        if !base.contains_torsion(key) {
            return Err(SelectionError::UnknownTorsion(key.clone()));
        }
        if selected.iter().any(|s| s.same_torsion(key)) {
            debug!("Dropping duplicate torsion {} from the explicit list.", key);
            continue;
        }
        selected.push(key.clone());
    }
    Ok(selected)
}

fn diff_stream(base: &DihedralParameterSet, stream: &DihedralParameterSet) -> Vec<TorsionKey> {
    stream
        .torsions()
        .filter(|key| {
            let changed = match (base.get_terms(key), stream.get_terms(key)) {
                (Some(old), Some(new)) => old != new,
                (None, _) => !base.contains_torsion(key),
                (Some(_), None) => false,
            };
            if changed {
                debug!("Stream defines new or changed torsion {}.", key);
            }
            changed
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::params::DihedralTerm;
    use crate::core::models::torsion::Periodicity;

    fn key(s: &str) -> TorsionKey {
        s.parse().unwrap()
    }

    fn term(m: u8, phase: f64, k: f64) -> DihedralTerm {
        DihedralTerm::new(Periodicity::new(m).unwrap(), phase, k)
    }

    fn base_set() -> DihedralParameterSet {
        let mut set = DihedralParameterSet::new();
        set.insert(key("CG331-CG321-CG321-CG331"), vec![term(3, 0.0, 0.15)]);
        set.insert(key("HGA2-CG321-CG321-HGA2"), vec![term(3, 0.0, 0.19)]);
        set
    }

    #[test]
    fn explicit_list_is_used_verbatim() {
        let mut base = base_set();
        let keys = vec![key("HGA2-CG321-CG321-HGA2"), key("CG331-CG321-CG321-CG331")];
        let selected = select_torsions(&mut base, None, Some(&keys)).unwrap();
        assert_eq!(selected, keys);
    }

    #[test]
    fn explicit_list_drops_reversed_duplicates() {
        let mut base = DihedralParameterSet::new();
        base.insert(key("A-B-C-D"), vec![term(2, 0.0, 1.0)]);
        let keys = vec![key("A-B-C-D"), key("D-C-B-A")];
        let selected = select_torsions(&mut base, None, Some(&keys)).unwrap();
        assert_eq!(selected, vec![key("A-B-C-D")]);
    }

    #[test]
    fn explicit_list_with_unknown_torsion_fails() {
        let mut base = base_set();
        let keys = vec![key("X-Y-Z-W")];
        let result = select_torsions(&mut base, None, Some(&keys));
        assert_eq!(result, Err(SelectionError::UnknownTorsion(key("X-Y-Z-W"))));
    }

    #[test]
    fn empty_explicit_list_fails() {
        let mut base = base_set();
        let result = select_torsions(&mut base, None, Some(&[]));
        assert_eq!(result, Err(SelectionError::EmptyExplicitList));
    }

    #[test]
    fn no_list_and_no_stream_fails() {
        let mut base = base_set();
        assert_eq!(
            select_torsions(&mut base, None, None),
            Err(SelectionError::NothingToOptimize)
        );
    }

    #[test]
    fn stream_selects_new_and_changed_torsions_and_merges_them() {
        let mut base = base_set();
        let mut stream = DihedralParameterSet::new();
        stream.insert(key("CG331-CG321-CG321-CG331"), vec![term(3, 0.0, 0.15)]);
        stream.insert(key("HGA2-CG321-CG321-HGA2"), vec![term(3, 0.0, 0.30)]);
        stream.insert(key("OG311-CG321-CG321-HGA2"), vec![term(1, 0.0, 0.5)]);

        let selected = select_torsions(&mut base, Some(&stream), None).unwrap();

        assert_eq!(selected.len(), 2);
        assert!(selected.contains(&key("HGA2-CG321-CG321-HGA2")));
        assert!(selected.iter().any(|k| k.same_torsion(&key("OG311-CG321-CG321-HGA2"))));
        assert!(selected.iter().all(TorsionKey::is_canonical));
        assert_eq!(
            base.get_terms(&key("HGA2-CG321-CG321-HGA2")),
            Some(&[term(3, 0.0, 0.30)][..])
        );
        assert!(base.contains_torsion(&key("OG311-CG321-CG321-HGA2")));
    }

    #[test]
    fn stream_identical_to_base_selects_nothing() {
        let mut base = base_set();
        let stream = base_set();
        assert_eq!(
            select_torsions(&mut base, Some(&stream), None),
            Err(SelectionError::NothingToOptimize)
        );
    }
}
