//! # Workflows Module
//!
//! High-level entry points that wire the engine together.
//!
//! - **Fitting** ([`fit`]) - [`fit::TorsionFitModel`], the model an external
//!   sampler drives: latent parameters, the MM-energy node and log densities.

pub mod fit;
