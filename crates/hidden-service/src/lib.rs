//! # hidden-service
//!
//! The service-side hidden-service engine: circuit purposes, the periodic
//! `introduce()` tick that keeps a service's intro points populated,
//! INTRODUCE2/RENDEZVOUS1 handling, and descriptor upload scheduling.
//!
//! Client-side hidden-service purposes (connecting *to* a `.onion`
//! address) are a Non-goal; only the service side is modeled.
//!
//! ## Modules
//!
//! - `purpose` — `Purpose`, `Circuit`
//! - `service` — `Service`, `ServiceList`, `IntroPoint`, `introduce_tick`
//! - `introduce2` — INTRODUCE2 parsing/handling, RENDEZVOUS1

pub mod introduce2;
pub mod purpose;
pub mod service;

pub use introduce2::{handle_introduce2, on_rendezvous_circuit_failed, on_rendezvous_circuit_open};
pub use purpose::{Circuit, Purpose};
pub use service::{
    DescriptorVersion, IntroPoint, PortMapping, Service, ServiceConfig, ServiceList,
    DESC_DIRTY_UPLOAD_THRESHOLD, INTRO_RETRY_PERIOD, MAX_INTRO_CIRCS_PER_PERIOD, MAX_REND_FAILURES,
    NUM_INTRO_POINTS, REND_POST_PERIOD,
};
