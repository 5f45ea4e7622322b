//! # relay-core
//!
//! Shared identifiers and collaborator trait seams for the relay circuit
//! runtime.
//!
//! This crate is protocol-agnostic: it fixes the interfaces of the
//! components §1 of the design spec declares out of scope (directory
//! protocol, TLS bottom half, cryptographic primitives, router selection)
//! without implementing any of them. `cellbuf`, `reputation`,
//! `router-identity`, and `hidden-service` all depend on this crate for
//! `RouterId`, `ExtendInfo`, and the trait definitions.
//!
//! ## Modules
//!
//! - `id` — `RouterId`, `ExtendInfo`
//! - `traits` — `CryptoProvider`, `TlsTransport`, `RouterOracle`, `DirectoryClient`
//! - `testing` — deterministic test doubles for all four traits

pub mod id;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use id::{ExtendInfo, RouterId};
pub use traits::{CryptoProvider, DhPrivate, DirectoryClient, IoOutcome, RouterOracle, RsaKeyHandle, TlsTransport};
