use crate::core::models::torsion::Periodicity;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone, Copy)]
pub enum BitstringError {
    #[error("Multiplicity bitstring must lie in 0..=63, got {0}")]
    OutOfRange(i64),
    #[error("Multiplicity bitstring must be an integer, got {0}")]
    NotIntegral(f64),
}

/// Set of active periodicities of one torsion, encoded as six bits.
///
/// Bit `m - 1` is set when periodicity `m` contributes a force constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MultiplicityBitstring(u8);

impl MultiplicityBitstring {
    pub const MAX: u8 = 63;

    pub fn empty() -> Self {
        Self(0)
    }

    /// Decodes the current value of a sampled bitstring variable.
    pub fn from_value(value: f64) -> Result<Self, BitstringError> {
        if value.fract() != 0.0 || !value.is_finite() {
            return Err(BitstringError::NotIntegral(value));
        }
        let integer = value as i64;
        if !(0..=Self::MAX as i64).contains(&integer) {
            return Err(BitstringError::OutOfRange(integer));
        }
        Ok(Self(integer as u8))
    }

    pub fn encode<I>(periodicities: I) -> Self
    where
        I: IntoIterator<Item = Periodicity>,
    {
        let mut bitstring = Self::empty();
        for p in periodicities {
            bitstring.insert(p);
        }
        bitstring
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn insert(&mut self, periodicity: Periodicity) {
        self.0 |= periodicity.mask();
    }

    pub fn contains(self, periodicity: Periodicity) -> bool {
        self.0 & periodicity.mask() != 0
    }

    /// Active periodicities in ascending order.
    pub fn active(self) -> impl Iterator<Item = Periodicity> {
        Periodicity::all().filter(move |&p| self.contains(p))
    }
}

impl From<MultiplicityBitstring> for f64 {
    fn from(b: MultiplicityBitstring) -> Self {
        b.0 as f64
    }
}

impl fmt::Display for MultiplicityBitstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0b{:06b})", self.0, self.0)
    }
}
