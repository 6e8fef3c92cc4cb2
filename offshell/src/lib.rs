#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

//! `offshell` computes tree-level scattering amplitudes for arbitrary field
//! theory models through off-shell current recursion and generates weighted
//! or unweighted Monte-Carlo events over the corresponding phase space.
//!
//! The building blocks, from the bottom up: a dense complex [`tensor`]
//! kernel, [`colour`] algebra and [`lorentz`] vertex structures, a
//! [`model`] registry with fusion lookup, the current recursion in [`tree`]
//! behind the [`algorithm`] facade, the adaptive [`parni`] grids and the
//! recursive phase-space decomposition in [`channels`], and the sampler and
//! [`generator`] layer on top.

pub mod algorithm;
pub mod bits;
pub mod channels;
pub mod colour;
pub mod colours;
pub mod config;
pub mod current;
pub mod cuts;
pub mod dirac;
pub mod error;
pub mod event;
pub mod generator;
pub mod helicity;
pub mod interaction;
pub mod invariants;
pub mod lorentz;
pub mod model;
pub mod models;
pub mod momentum;
pub mod parni;
pub mod particle;
pub mod process;
pub mod rambo;
pub mod tensor;
pub mod tree;
pub mod vertex;
