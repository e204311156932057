//! Provider-facing descriptors (data) and strategies (behavior).
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering HTTPS-only
//! authorization, token, and identity endpoints, client authentication preferences, and
//! provider quirks. `strategy` defines [`ProviderStrategy`], an HTTP-client-agnostic hook
//! used by the exchange client to augment token requests and classify failures.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
