//! # relay-runtime
//!
//! The top-level runtime crate: the `Runtime` context wiring
//! `cellbuf`/`reputation`/`router-identity`/`hidden-service` together, the
//! onion-skin decrypt worker pool, leveled logging, and `RelayConfig`.
//!
//! ## Modules
//!
//! - `runtime` — `Runtime<C, R, D>`, `tick()`
//! - `decrypt_pool` — `DecryptPool`, `Job`
//! - `rlog` — leveled logging macros (`rerror!`, `rwarn!`, `rinfo!`,
//!   `rdebug!`, `rtrace!`)
//! - `config` — `RelayConfig`

pub mod config;
pub mod decrypt_pool;
pub mod rlog;
pub mod runtime;

pub use config::RelayConfig;
pub use decrypt_pool::{DecryptPool, Job};
pub use runtime::Runtime;
