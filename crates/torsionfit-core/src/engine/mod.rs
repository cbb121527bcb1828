//! # Engine Module
//!
//! The model machinery behind [`crate::workflows::fit::TorsionFitModel`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Phase policy and periodicity options
//! - **Latent Parameters** ([`variables`]) - Typed registry of the sampled
//!   variables, their priors and flat sampler names
//! - **Bitstrings** ([`bitstring`]) - Encoding of the active periodicities of a torsion
//! - **Construction** ([`builder`], [`completion`]) - Seeding the latent
//!   parameters from the force field and padding missing periodicities
//! - **Evaluation** ([`update`], [`likelihood`]) - Writing latent values back
//!   into the parameter store and scoring the resulting MM energies
//! - **Error Handling** ([`error`]) - Engine-level error type
//!
//! Every evaluation mutates the parameter store in place, so a model must
//! never be evaluated concurrently against a shared store.

pub mod bitstring;
pub mod builder;
pub mod completion;
pub mod config;
pub mod error;
pub mod likelihood;
pub mod update;
pub mod variables;
