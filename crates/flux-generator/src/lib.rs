//! Synthetic event generation for DataFlux.
//!
//! - [`StreamSelector`]: weighted-random choice of the next stream
//! - [`EventFactory`]: builds an [`Event`](flux_core::Event) for a stream name
//! - [`generate_user_pool`]: the simulated users and their devices
//!
//! All randomness flows through a caller-provided [`StdRng`](rand::rngs::StdRng)
//! so a fixed seed reproduces the same pool and the same emission choices.

pub mod error;
pub mod factory;
pub mod pool;
pub mod selector;
pub mod streams;

pub use error::GeneratorError;
pub use factory::{DefaultEventFactory, EventFactory, FieldGenerator};
pub use pool::{generate_user_pool, pick_device};
pub use selector::StreamSelector;

/// Derive a per-emitter seed from the base seed and the emitter index.
///
/// Every emitter owns its own RNG; mixing the index in keeps their streams
/// of randomness independent while staying reproducible.
pub fn derive_seed(base: u64, index: u64) -> u64 {
    base.wrapping_add(index.wrapping_mul(0x9E3779B97F4A7C15))
}
