use std::fmt;

pub const KJ_PER_KCAL: f64 = 4.184;

/// Energy unit reported by an energy evaluator. All fitting happens in kJ/mol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyUnit {
    #[default]
    KilojoulesPerMole,
    KilocaloriesPerMole,
}

impl EnergyUnit {
    #[inline]
    pub fn to_kilojoules_per_mole(self, value: f64) -> f64 {
        match self {
            EnergyUnit::KilojoulesPerMole => value,
            EnergyUnit::KilocaloriesPerMole => value * KJ_PER_KCAL,
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyUnit::KilojoulesPerMole => write!(f, "kJ/mol"),
            EnergyUnit::KilocaloriesPerMole => write!(f, "kcal/mol"),
        }
    }
}
