//! # Models Module
//!
//! Plain data types shared by the rest of the crate: torsion keys and
//! periodicities, QM-scanned fragments, and the handles used to address
//! latent variables.

pub mod fragment;
pub mod ids;
pub mod torsion;
