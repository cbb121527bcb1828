//! # Core Module
//!
//! Stateless building blocks for torsion fitting: the dihedral parameter
//! store, torsion selection, and the data models for torsion keys and
//! QM-scanned fragments.
//!
//! - **Force field parameters** ([`forcefield`]) - Dihedral types, their TOML
//!   representation and the choice of torsions to optimize
//! - **Models** ([`models`]) - Torsion keys, periodicities, fragments and
//!   latent-variable handles

pub mod forcefield;
pub mod models;
