use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TorsionKeyError {
    #[error("A torsion is defined by exactly 4 atom types, but {found} were given in '{input}'")]
    WrongArity { input: String, found: usize },
    #[error("Atom type at position {position} of a torsion is empty")]
    EmptyAtomType { position: usize },
    #[error("Atom type '{atom_type}' contains whitespace")]
    InvalidAtomType { atom_type: String },
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Periodicity must be an integer in 1..=6, got {0}")]
pub struct PeriodicityError(pub i64);

/// An ordered 4-tuple of atom-type labels identifying a dihedral type.
///
/// `(A, B, C, D)` and `(D, C, B, A)` describe the same physical torsion; use
/// [`TorsionKey::canonical`] to pick one representative orientation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TorsionKey([String; 4]);

impl TorsionKey {
    pub fn new(a: &str, b: &str, c: &str, d: &str) -> Result<Self, TorsionKeyError> {
        Self::from_types([a, b, c, d].map(str::to_string))
    }

    pub fn from_types(types: [String; 4]) -> Result<Self, TorsionKeyError> {
        for (position, atom_type) in types.iter().enumerate() {
            if atom_type.is_empty() {
                return Err(TorsionKeyError::EmptyAtomType { position });
            }
            if atom_type.chars().any(char::is_whitespace) {
                return Err(TorsionKeyError::InvalidAtomType {
                    atom_type: atom_type.clone(),
                });
            }
        }
        Ok(Self(types))
    }

    pub fn from_slice<S: AsRef<str>>(types: &[S]) -> Result<Self, TorsionKeyError> {
        match types {
            [a, b, c, d] => Self::new(a.as_ref(), b.as_ref(), c.as_ref(), d.as_ref()),
            _ => Err(TorsionKeyError::WrongArity {
                input: types
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<_>>()
                    .join("-"),
                found: types.len(),
            }),
        }
    }

    pub fn atom_types(&self) -> &[String; 4] {
        &self.0
    }

    pub fn reversed(&self) -> Self {
        let [a, b, c, d] = self.0.clone();
        Self([d, c, b, a])
    }

    pub fn is_palindromic(&self) -> bool {
        self.0[0] == self.0[3] && self.0[1] == self.0[2]
    }

    /// Returns the lexicographically smaller of the two orientations.
    pub fn canonical(&self) -> Self {
        let reversed = self.reversed();
        if reversed < *self {
            reversed
        } else {
            self.clone()
        }
    }

    pub fn is_canonical(&self) -> bool {
        *self <= self.reversed()
    }

    /// True if both keys name the same torsion, in either orientation.
    pub fn same_torsion(&self, other: &Self) -> bool {
        self == other || self.reversed() == *other
    }
}

impl fmt::Display for TorsionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}_{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for TorsionKey {
    type Err = TorsionKeyError;

    /// Accepts `A-B-C-D`, `A_B_C_D` or whitespace separated atom types.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = if s.contains('-') {
            s.split('-').map(str::trim).collect()
        } else if s.contains('_') {
            s.split('_').map(str::trim).collect()
        } else {
            s.split_whitespace().collect()
        };
        if parts.len() != 4 {
            return Err(TorsionKeyError::WrongArity {
                input: s.to_string(),
                found: parts.len(),
            });
        }
        Self::from_slice(&parts)
    }
}

impl Serialize for TorsionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TorsionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let types = Vec::<String>::deserialize(deserializer)?;
        Self::from_slice(&types).map_err(serde::de::Error::custom)
    }
}

/// Number of energy minima per full rotation of a dihedral term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Periodicity(u8);

impl Periodicity {
    pub const MAX: u8 = 6;

    pub fn new(value: u8) -> Result<Self, PeriodicityError> {
        Self::try_from(value as i64)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Bit `m - 1` of a multiplicity bitstring.
    pub fn mask(self) -> u8 {
        1 << (self.0 - 1)
    }

    pub fn is_five(self) -> bool {
        self.0 == 5
    }

    pub fn all() -> impl Iterator<Item = Periodicity> {
        (1..=Self::MAX).map(Periodicity)
    }
}

impl TryFrom<i64> for Periodicity {
    type Error = PeriodicityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (1..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(PeriodicityError(value))
        }
    }
}

impl From<Periodicity> for i64 {
    fn from(p: Periodicity) -> Self {
        p.0 as i64
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Periodicities sampled for every optimized torsion. Periodicity 5 is only
/// included on request.
pub fn candidate_periodicities(sample_n5: bool) -> Vec<Periodicity> {
    Periodicity::all()
        .filter(|p| sample_n5 || !p.is_five())
        .collect()
}
