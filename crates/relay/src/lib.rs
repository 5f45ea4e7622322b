//! # relay
//!
//! A thin facade re-exporting the public API of the relay circuit runtime's
//! component crates under one namespace, the way the teacher's `gvthread`
//! crate re-exports `gvthread-core`/`gvthread-runtime`.
//!
//! ## Quick start
//!
//! ```ignore
//! use relay::{Runtime, RelayConfig};
//!
//! let config = RelayConfig::new().nickname("example").or_port(9001);
//! config.validate().expect("invalid config");
//!
//! let mut runtime = Runtime::new(crypto, routers, directory, now);
//! runtime.start_decrypt_pool(0, 64);
//! runtime.tick(now);
//! ```

pub use relay_error::{Error, Result};

pub use relay_core::id::{ExtendInfo, RouterId};
pub use relay_core::traits::{CryptoProvider, DhPrivate, DirectoryClient, IoOutcome, RouterOracle, RsaKeyHandle, TlsTransport};

pub use cellbuf::framing::{deflate, http, line, socks, Outcome};
pub use cellbuf::{freelist, CellBuf};

pub use reputation::{BandwidthArray, HistoryMap, LinkHistory, OrHistory, PredictedInternalUsage, PredictedPortTable, RouterDigest};

pub use router_identity::{assemble, onion_address, service_id, DescriptorInput, KeyRing};

pub use hidden_service::{
    handle_introduce2, on_rendezvous_circuit_failed, on_rendezvous_circuit_open, Circuit, DescriptorVersion, IntroPoint,
    PortMapping, Purpose, Service, ServiceConfig, ServiceList, DESC_DIRTY_UPLOAD_THRESHOLD, INTRO_RETRY_PERIOD,
    MAX_INTRO_CIRCS_PER_PERIOD, MAX_REND_FAILURES, NUM_INTRO_POINTS, REND_POST_PERIOD,
};

pub use relay_runtime::{decrypt_pool, rlog, DecryptPool, Job, RelayConfig, Runtime};
pub use relay_runtime::{rdebug, rerror, rinfo, rtrace, rwarn};

#[cfg(feature = "testing")]
pub use relay_core::testing;
