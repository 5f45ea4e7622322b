//! # router-identity
//!
//! Onion-key rotation (`KeyRing`), `.onion` service identifiers, and
//! router descriptor assembly/signing.
//!
//! ## Modules
//!
//! - `keyring` — `KeyRing`, the mutex-protected identity/current/previous
//!   onion key triple
//! - `identity` — `service_id`, `onion_address`
//! - `descriptor` — `DescriptorInput`, `assemble`

pub mod descriptor;
pub mod identity;
pub mod keyring;

pub use descriptor::{assemble, DescriptorInput};
pub use identity::{onion_address, service_id};
pub use keyring::KeyRing;
