use crate::core::models::ids::VariableId;
use crate::core::models::torsion::{Periodicity, TorsionKey};
use rand::Rng;
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

pub const SIGMA_NAME: &str = "sigma";
pub const PRECISION_NAME: &str = "precision";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum VariableError {
    #[error("Value {value} for '{name}' lies outside its domain {domain}")]
    OutOfDomain {
        name: String,
        value: f64,
        domain: Domain,
    },
    #[error("Value {value} for discrete variable '{name}' is not an integer")]
    NotIntegral { name: String, value: f64 },
    #[error("Parameter '{0}' is registered twice")]
    Duplicate(String),
    #[error("No latent parameter named '{0}'")]
    UnknownName(String),
    #[error("Latent parameter handle {0:?} does not belong to this parameter space")]
    UnknownId(VariableId),
    #[error("'{0}' is derived from log_sigma and cannot be set directly")]
    Derived(String),
    #[error("The noise parameter log_sigma has not been registered")]
    MissingLogSigma,
}

/// Structured identity of a latent parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterKey {
    ForceConstant {
        torsion: TorsionKey,
        periodicity: Periodicity,
    },
    Phase {
        torsion: TorsionKey,
        periodicity: Periodicity,
    },
    MultiplicityBitstring {
        torsion: TorsionKey,
    },
    Offset {
        residue: String,
    },
    LogSigma,
}

impl fmt::Display for ParameterKey {
    /// Flat names as seen by a generic sampler, e.g. `A_B_C_D_3_K`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKey::ForceConstant {
                torsion,
                periodicity,
            } => write!(f, "{}_{}_K", torsion, periodicity),
            ParameterKey::Phase {
                torsion,
                periodicity,
            } => write!(f, "{}_{}_Phase", torsion, periodicity),
            ParameterKey::MultiplicityBitstring { torsion } => {
                write!(f, "{}_multiplicity_bitstring", torsion)
            }
            ParameterKey::Offset { residue } => write!(f, "{}_offset", residue),
            ParameterKey::LogSigma => write!(f, "log_sigma"),
        }
    }
}

/// Prior support of a latent parameter. Both variants are flat priors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Uniform { lower: f64, upper: f64 },
    DiscreteUniform { lower: i64, upper: i64 },
}

impl Domain {
    pub fn is_discrete(&self) -> bool {
        matches!(self, Domain::DiscreteUniform { .. })
    }

    pub fn contains(&self, value: f64) -> bool {
        match *self {
            Domain::Uniform { lower, upper } => value >= lower && value <= upper,
            Domain::DiscreteUniform { lower, upper } => {
                value.fract() == 0.0 && value >= lower as f64 && value <= upper as f64
            }
        }
    }

    pub fn log_density(&self, value: f64) -> f64 {
        if !self.contains(value) {
            return f64::NEG_INFINITY;
        }
        match *self {
            Domain::Uniform { lower, upper } => -(upper - lower).ln(),
            Domain::DiscreteUniform { lower, upper } => -((upper - lower + 1) as f64).ln(),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Domain::Uniform { lower, upper } => rng.gen_range(lower..=upper),
            Domain::DiscreteUniform { lower, upper } => rng.gen_range(lower..=upper) as f64,
        }
    }

    fn validate(&self, name: impl FnOnce() -> String, value: f64) -> Result<(), VariableError> {
        if self.is_discrete() && value.fract() != 0.0 {
            return Err(VariableError::NotIntegral {
                name: name(),
                value,
            });
        }
        if !self.contains(value) {
            return Err(VariableError::OutOfDomain {
                name: name(),
                value,
                domain: *self,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Uniform { lower, upper } => write!(f, "Uniform[{}, {}]", lower, upper),
            Domain::DiscreteUniform { lower, upper } => {
                write!(f, "DiscreteUniform{{{}..{}}}", lower, upper)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    key: ParameterKey,
    domain: Domain,
    value: f64,
}

impl Variable {
    pub fn key(&self) -> &ParameterKey {
        &self.key
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn name(&self) -> String {
        self.key.to_string()
    }
}

/// Registry of the model's latent parameters.
///
/// Variables are addressed by [`VariableId`] handles or by their structured
/// [`ParameterKey`]; the flat string names exist only for samplers that need
/// them. Iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct ParameterSpace {
    variables: SlotMap<VariableId, Variable>,
    by_key: HashMap<ParameterKey, VariableId>,
    by_name: HashMap<String, VariableId>,
    order: Vec<VariableId>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        key: ParameterKey,
        domain: Domain,
        initial: f64,
    ) -> Result<VariableId, VariableError> {
        let name = key.to_string();
        if self.by_key.contains_key(&key) || self.by_name.contains_key(&name) {
            return Err(VariableError::Duplicate(name));
        }
        domain.validate(|| name.clone(), initial)?;

        let id = self.variables.insert(Variable {
            key: key.clone(),
            domain,
            value: initial,
        });
        self.by_key.insert(key, id);
        self.by_name.insert(name, id);
        self.order.push(id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn id(&self, key: &ParameterKey) -> Option<VariableId> {
        self.by_key.get(key).copied()
    }

    pub fn id_by_name(&self, name: &str) -> Option<VariableId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id)
    }

    pub fn value(&self, id: VariableId) -> Result<f64, VariableError> {
        self.variables
            .get(id)
            .map(|v| v.value)
            .ok_or(VariableError::UnknownId(id))
    }

    pub fn value_of(&self, key: &ParameterKey) -> Option<f64> {
        self.id(key).and_then(|id| self.variables.get(id)).map(|v| v.value)
    }

    pub fn set_value(&mut self, id: VariableId, value: f64) -> Result<(), VariableError> {
        let variable = self
            .variables
            .get_mut(id)
            .ok_or(VariableError::UnknownId(id))?;
        variable
            .domain
            .validate(|| variable.key.to_string(), value)?;
        variable.value = value;
        Ok(())
    }

    pub fn set_by_key(&mut self, key: &ParameterKey, value: f64) -> Result<(), VariableError> {
        let id = self
            .id(key)
            .ok_or_else(|| VariableError::UnknownName(key.to_string()))?;
        self.set_value(id, value)
    }

    pub fn set_by_name(&mut self, name: &str, value: f64) -> Result<(), VariableError> {
        if name == SIGMA_NAME || name == PRECISION_NAME {
            return Err(VariableError::Derived(name.to_string()));
        }
        let id = self
            .id_by_name(name)
            .ok_or_else(|| VariableError::UnknownName(name.to_string()))?;
        self.set_value(id, value)
    }

    /// Variables in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (VariableId, &Variable)> {
        self.order.iter().map(|&id| (id, &self.variables[id]))
    }

    pub fn log_sigma(&self) -> Result<f64, VariableError> {
        self.value_of(&ParameterKey::LogSigma)
            .ok_or(VariableError::MissingLogSigma)
    }

    /// `exp(log_sigma)`, recomputed from the current value on every call.
    pub fn sigma(&self) -> Result<f64, VariableError> {
        Ok(self.log_sigma()?.exp())
    }

    /// `exp(-2 log_sigma)`, recomputed from the current value on every call.
    pub fn precision(&self) -> Result<f64, VariableError> {
        Ok((-2.0 * self.log_sigma()?).exp())
    }

    /// Sum of the prior log densities; `-inf` as soon as any value leaves its support.
    pub fn log_prior(&self) -> f64 {
        self.variables
            .values()
            .map(|v| v.domain.log_density(v.value))
            .sum()
    }

    pub fn draw_from_prior<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for id in &self.order {
            let variable = &mut self.variables[*id];
            variable.value = variable.domain.sample(rng);
        }
    }

    /// Current values keyed by flat name, including the derived `sigma` and `precision`.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        let mut values: BTreeMap<String, f64> = self
            .iter()
            .map(|(_, v)| (v.name(), v.value))
            .collect();
        if let (Ok(sigma), Ok(precision)) = (self.sigma(), self.precision()) {
            values.insert(SIGMA_NAME.to_string(), sigma);
            values.insert(PRECISION_NAME.to_string(), precision);
        }
        values
    }
}
