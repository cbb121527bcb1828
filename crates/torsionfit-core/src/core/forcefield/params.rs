use crate::core::models::torsion::{Periodicity, TorsionKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// One periodicity record of a dihedral type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DihedralTerm {
    pub periodicity: Periodicity,
    /// Phase angle in degrees.
    pub phase: f64,
    /// Force constant in kcal/mol.
    pub force_constant: f64,
}

impl DihedralTerm {
    pub fn new(periodicity: Periodicity, phase: f64, force_constant: f64) -> Self {
        Self {
            periodicity,
            phase,
            force_constant,
        }
    }

    /// Zero-strength term used to pad a torsion up to the full set of candidate periodicities.
    pub fn placeholder(periodicity: Periodicity) -> Self {
        Self::new(periodicity, 0.0, 0.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StoreError {
    #[error("No dihedral terms are defined for torsion {0}")]
    MissingTorsion(TorsionKey),
    #[error(
        "Torsion {key} holds {forward} terms but its reverse holds {reverse}; the two orientations are out of sync"
    )]
    TwinMismatch {
        key: TorsionKey,
        forward: usize,
        reverse: usize,
    },
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DihedralFile {
    #[serde(default)]
    dihedral: Vec<DihedralRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DihedralRecord {
    atom_types: TorsionKey,
    #[serde(default)]
    terms: Vec<DihedralTerm>,
}

/// Dihedral types keyed by atom-type quadruple.
///
/// Every torsion is stored under both orientations, `(A, B, C, D)` and
/// `(D, C, B, A)`, as two independent term lists that the mutating methods
/// keep in lockstep. A palindromic torsion has a single entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DihedralParameterSet {
    dihedral_types: BTreeMap<TorsionKey, Vec<DihedralTerm>>,
}

impl DihedralParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let file: DihedralFile = toml::from_str(content)?;
        let mut set = Self::new();
        for record in file.dihedral {
            if set.contains_torsion(&record.atom_types) {
                warn!(
                    "Torsion {} is defined more than once; the last definition wins.",
                    record.atom_types
                );
            }
            set.insert(record.atom_types, record.terms);
        }
        Ok(set)
    }

    pub fn to_toml_string(&self) -> Result<String, ParamLoadError> {
        let file = DihedralFile {
            dihedral: self
                .torsions()
                .map(|key| DihedralRecord {
                    terms: self.dihedral_types[key].clone(),
                    atom_types: key.clone(),
                })
                .collect(),
        };
        Ok(toml::to_string(&file)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ParamLoadError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Inserts `terms` under both orientations of `key`, replacing any existing definition.
    pub fn insert(&mut self, key: TorsionKey, terms: Vec<DihedralTerm>) {
        let reversed = key.reversed();
        if reversed != key {
            self.dihedral_types.insert(reversed, terms.clone());
        }
        self.dihedral_types.insert(key, terms);
    }

    pub fn get_terms(&self, key: &TorsionKey) -> Option<&[DihedralTerm]> {
        self.dihedral_types.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &TorsionKey) -> bool {
        self.dihedral_types.contains_key(key)
    }

    /// True if the torsion is known under either orientation.
    pub fn contains_torsion(&self, key: &TorsionKey) -> bool {
        self.contains(key) || self.contains(&key.reversed())
    }

    /// Number of distinct torsions (an orientation pair counts once).
    pub fn len(&self) -> usize {
        self.torsions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.dihedral_types.is_empty()
    }

    /// Canonical keys of all torsions, in sorted order.
    pub fn torsions(&self) -> impl Iterator<Item = &TorsionKey> {
        self.dihedral_types
            .keys()
            .filter(|key| key.is_canonical() || !self.contains(&key.reversed()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TorsionKey, &[DihedralTerm])> {
        self.dihedral_types
            .iter()
            .map(|(key, terms)| (key, terms.as_slice()))
    }

    /// Appends `term` to both orientations of `key`.
    pub fn push_term(&mut self, key: &TorsionKey, term: DihedralTerm) -> Result<(), StoreError> {
        self.update_terms(key, |terms: &mut Vec<DihedralTerm>| {
            terms.push(term);
            Ok::<_, StoreError>(())
        })
    }

    /// Applies the same mutation to the term lists of `key` and of its reverse.
    ///
    /// `f` runs once per orientation and must be deterministic, so both lists
    /// end up identical if they were identical before.
    pub fn update_terms<E, F>(&mut self, key: &TorsionKey, mut f: F) -> Result<(), E>
    where
        E: From<StoreError>,
        F: FnMut(&mut Vec<DihedralTerm>) -> Result<(), E>,
    {
        let reversed = key.reversed();
        let forward_len = self
            .dihedral_types
            .get(key)
            .ok_or_else(|| StoreError::MissingTorsion(key.clone()))?
            .len();
        if reversed != *key {
            let reverse_len = self
                .dihedral_types
                .get(&reversed)
                .ok_or_else(|| StoreError::MissingTorsion(reversed.clone()))?
                .len();
            if reverse_len != forward_len {
                return Err(StoreError::TwinMismatch {
                    key: key.clone(),
                    forward: forward_len,
                    reverse: reverse_len,
                }
                .into());
            }
        }

        if let Some(terms) = self.dihedral_types.get_mut(key) {
            f(terms)?;
        }
        if reversed != *key {
            if let Some(terms) = self.dihedral_types.get_mut(&reversed) {
                f(terms)?;
            }
        }
        Ok(())
    }

    /// Copies every torsion of `other` into this set, replacing existing definitions.
    pub fn merge(&mut self, other: &DihedralParameterSet) {
        for key in other.torsions() {
            self.insert(key.clone(), other.dihedral_types[key].clone());
        }
    }
}
