//! # Force Field Module
//!
//! Dihedral force-field parameters as consumed and mutated by the fitting
//! engine.
//!
//! ## Key Components
//!
//! - [`params`] - The dihedral parameter store, keyed by atom-type quadruple and
//!   kept in sync across both orientations of every torsion
//! - [`selection`] - Choosing which torsions are tunable, either from an explicit
//!   list or by diffing a parameter stream against the base set
//! - [`units`] - Energy units reported by external energy evaluators
//!
//! ## Usage
//!
//! ```ignore
//! use torsionfit::core::forcefield::params::DihedralParameterSet;
//! use torsionfit::core::forcefield::selection::select_torsions;
//!
//! let mut base = DihedralParameterSet::load(&base_path)?;
//! let stream = DihedralParameterSet::load(&stream_path)?;
//! let torsions = select_torsions(&mut base, Some(&stream), None)?;
//! ```

pub mod params;
pub mod selection;
pub mod units;
