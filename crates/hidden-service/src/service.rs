//! Service configuration, intro-point management, and the periodic
//! `introduce()` tick (§4.2).

use crate::purpose::Circuit;
use rand::Rng;
use relay_core::id::{ExtendInfo, RouterId};
use relay_core::traits::{CryptoProvider, DirectoryClient, RouterOracle, RsaKeyHandle};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;

/// Service-side tuning constants (§4.2).
pub const NUM_INTRO_POINTS: usize = 3;
pub const MAX_INTRO_CIRCS_PER_PERIOD: u32 = 10;
pub const INTRO_RETRY_PERIOD: u64 = 300;
pub const MAX_REND_FAILURES: u8 = 3;

/// How often a service re-posts its descriptor once an upload is due (the
/// real protocol's `RendPostPeriod`).
pub const REND_POST_PERIOD: u64 = 3600;

/// A dirtied descriptor is uploaded without waiting for a scheduled
/// upload once it has been dirty at least this long.
pub const DESC_DIRTY_UPLOAD_THRESHOLD: u64 = 30;

/// Size of the small, fixed authority set a v0 descriptor posts to.
const V0_AUTHORITY_COUNT: usize = 3;

/// Number of hidden-service-directory replicas a v2 descriptor posts to
/// per time period.
const V2_REPLICA_COUNT: usize = 2;

/// Length of a v2 descriptor's time period, used to key replica storage
/// and to decide whether an upload straddles a rotation boundary.
const V2_TIME_PERIOD_LENGTH: u64 = 86_400;

/// Window before a time-period boundary in which a v2 upload also
/// publishes the next period's replicas, so lookups on either side of the
/// rotation still find a descriptor.
const V2_ROTATION_WINDOW: u64 = REND_POST_PERIOD;

/// Whether a service publishes a v0 (legacy, no per-intro key) or v2
/// (per-intro RSA key) descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorVersion {
    V0,
    V2,
}

/// A virtual-port -> real-address mapping (`HiddenServicePort` in the
/// original config file format).
#[derive(Debug, Clone, Copy)]
pub struct PortMapping {
    pub virtual_port: u16,
    pub real_addr: IpAddr,
    pub real_port: u16,
}

/// Fields fixed for the lifetime of the service (everything the operator's
/// config file supplies up front).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub directory: PathBuf,
    pub ports: Vec<PortMapping>,
    pub intro_node_exclude: HashSet<RouterId>,
    pub service_key: RsaKeyHandle,
    pub service_id: String,
    pub key_digest: [u8; 20],
    pub descriptor_version: DescriptorVersion,
}

/// One candidate or live intro point: the relay it targets, the key it was
/// established under (service key for v0, a fresh per-intro key for v2),
/// and the circuit currently carrying it.
#[derive(Debug, Clone)]
pub struct IntroPoint {
    pub target: ExtendInfo,
    pub intro_key: Option<RsaKeyHandle>,
    pub key_digest: [u8; 20],
    pub circuit_id: u64,
}

/// A configured hidden service: immutable `config` plus the mutable intro
/// point set, in-flight circuits, and descriptor upload state.
pub struct Service {
    pub config: ServiceConfig,
    intro_points: Vec<IntroPoint>,
    circuits: HashMap<u64, Circuit>,
    next_circuit_id: u64,
    period_started: u64,
    launch_count: u32,
    pub descriptor: Option<String>,
    dirty_since: Option<u64>,
    next_upload_time: Option<u64>,
}

impl Service {
    pub fn new(config: ServiceConfig, now: u64) -> Service {
        Service {
            config,
            intro_points: Vec::new(),
            circuits: HashMap::new(),
            next_circuit_id: 1,
            period_started: now,
            launch_count: 0,
            descriptor: None,
            dirty_since: Some(now),
            next_upload_time: None,
        }
    }

    pub fn intro_points(&self) -> &[IntroPoint] {
        &self.intro_points
    }

    pub fn circuit(&self, id: u64) -> Option<&Circuit> {
        self.circuits.get(&id)
    }

    pub fn circuit_mut(&mut self, id: u64) -> Option<&mut Circuit> {
        self.circuits.get_mut(&id)
    }

    pub fn circuits(&self) -> impl Iterator<Item = &Circuit> {
        self.circuits.values()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_circuit_id;
        self.next_circuit_id += 1;
        id
    }

    /// Allocate a fresh circuit id without inserting a circuit yet, for
    /// callers (e.g. `introduce2::handle_introduce2`) that need the id
    /// before they can construct the `Circuit` itself.
    pub fn allocate_circuit_id(&mut self) -> u64 {
        self.next_id()
    }

    pub fn insert_circuit(&mut self, circuit: Circuit) {
        self.circuits.insert(circuit.id, circuit);
    }

    pub fn remove_circuit(&mut self, id: u64) -> Option<Circuit> {
        self.circuits.remove(&id)
    }

    /// Test-only accessors into the per-period launch bookkeeping, so
    /// tests can assert the reset happens without poking at private
    /// fields from outside the module.
    #[cfg(test)]
    pub fn period_started_for_test(&self) -> u64 {
        self.period_started
    }

    #[cfg(test)]
    pub fn launch_count_for_test(&self) -> u32 {
        self.launch_count
    }

    /// Test-only helper to wire up an `IntroPoint` directly, bypassing
    /// `introduce_tick`'s relay-selection loop.
    #[cfg(test)]
    pub fn register_intro_point_for_test(
        &mut self,
        target: ExtendInfo,
        intro_key: Option<RsaKeyHandle>,
        key_digest: [u8; 20],
        circuit_id: u64,
    ) {
        self.intro_points.push(IntroPoint { target, intro_key, key_digest, circuit_id });
    }

    fn mark_dirty(&mut self, now: u64) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(now);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    /// Resolve a virtual port to one real `(addr, port)`, picking uniformly
    /// at random among every mapping that matches. `None` if nothing maps.
    pub fn resolve_port(&self, virtual_port: u16) -> Option<(IpAddr, u16)> {
        let matches: Vec<&PortMapping> = self
            .config
            .ports
            .iter()
            .filter(|p| p.virtual_port == virtual_port)
            .collect();
        if matches.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..matches.len());
        let chosen = matches[idx];
        Some((chosen.real_addr, chosen.real_port))
    }

    /// The periodic intro-point maintenance tick (§4.2, 5 steps):
    /// 1. reset the launch counter once `INTRO_RETRY_PERIOD` has elapsed,
    /// 2. otherwise bail out once the per-period launch ceiling is hit,
    /// 3. drop any intro point whose circuit died or whose relay the
    ///    oracle no longer knows about,
    /// 4. if already at `NUM_INTRO_POINTS`, nothing else to do,
    /// 5. otherwise pick fresh relays (excluding current intro points and
    ///    the service's exclude list) and launch `EstablishIntro` circuits
    ///    toward them until the target count is reached or the oracle runs
    ///    dry.
    pub fn introduce_tick<C: CryptoProvider, R: RouterOracle>(&mut self, crypto: &C, oracle: &R, now: u64) {
        if now.saturating_sub(self.period_started) >= INTRO_RETRY_PERIOD {
            self.period_started = now;
            self.launch_count = 0;
        } else if self.launch_count >= MAX_INTRO_CIRCS_PER_PERIOD {
            return;
        }

        let circuits = &self.circuits;
        let mut dropped_any = false;
        self.intro_points.retain(|ip| {
            let known = oracle.is_known(&ip.target.id);
            let alive = circuits
                .get(&ip.circuit_id)
                .map(|c| c.purpose.is_establish_intro() || c.purpose.is_intro())
                .unwrap_or(false);
            let keep = known && alive;
            if !keep {
                dropped_any = true;
            }
            keep
        });
        if dropped_any {
            self.mark_dirty(now);
        }

        if self.intro_points.len() >= NUM_INTRO_POINTS {
            self.period_started = now;
            self.launch_count = 0;
            return;
        }

        let mut exclude = self.config.intro_node_exclude.clone();
        for ip in &self.intro_points {
            exclude.insert(ip.target.id);
        }

        while self.intro_points.len() < NUM_INTRO_POINTS && self.launch_count < MAX_INTRO_CIRCS_PER_PERIOD {
            let Some(target) = oracle.pick_relay(&exclude) else {
                break;
            };
            exclude.insert(target.id);

            let intro_key = match self.config.descriptor_version {
                DescriptorVersion::V2 => Some(crypto.generate_rsa_key()),
                DescriptorVersion::V0 => None,
            };
            let key_digest = match &intro_key {
                Some(k) => crypto.digest(&crypto.rsa_public_der(k)),
                None => self.config.key_digest,
            };

            let id = self.next_id();
            self.circuits.insert(id, Circuit::establish_intro(id, target.clone(), now));
            self.intro_points.push(IntroPoint { target, intro_key, key_digest, circuit_id: id });
            self.launch_count += 1;
            self.mark_dirty(now);
        }
    }

    /// Record a synthetic intro-circuit launch failure (a circuit build
    /// that never reached `EstablishIntro`), counting against the same
    /// per-period ceiling a successful launch would.
    pub fn note_intro_launch_failed(&mut self, now: u64) {
        if now.saturating_sub(self.period_started) >= INTRO_RETRY_PERIOD {
            self.period_started = now;
            self.launch_count = 0;
        }
        self.launch_count += 1;
    }

    /// Record that an `EstablishIntro` circuit's handshake completed.
    pub fn complete_intro_circuit(&mut self, circuit_id: u64, now: u64) {
        if let Some(c) = self.circuits.get_mut(&circuit_id) {
            c.mark_intro_established();
            self.mark_dirty(now);
        }
    }

    /// Build the descriptor text from the current intro point set. The
    /// text format itself is a Non-goal detail (§1); this only needs to be
    /// stable enough for the §8 scenario assertion that it lists exactly
    /// the current intro points.
    fn build_descriptor_text(&self) -> String {
        let mut out = format!("service-id {}\n", self.config.service_id);
        for ip in &self.intro_points {
            out.push_str(&format!("introduction-point {}\n", ip.target.id));
        }
        out
    }

    /// Rebuild the descriptor text without touching upload scheduling
    /// state. Exposed for callers that want the current descriptor body
    /// directly, e.g. diagnostics.
    pub fn regenerate_descriptor(&mut self) -> &str {
        self.descriptor = Some(self.build_descriptor_text());
        self.descriptor.as_deref().unwrap()
    }

    pub fn next_upload_time(&self) -> Option<u64> {
        self.next_upload_time
    }

    /// Descriptor upload scheduling (§4.2 "Descriptor upload"). Call once
    /// per tick. If the service has never uploaded, first schedules the
    /// initial upload at a uniformly random time in
    /// `[now, now + 2*REND_POST_PERIOD)`. Uploads when the scheduled time
    /// has arrived, or the descriptor has been dirty for at least
    /// `DESC_DIRTY_UPLOAD_THRESHOLD` seconds. Returns whether an upload
    /// happened.
    pub fn upload_tick<D: DirectoryClient>(&mut self, directory: &D, now: u64) -> relay_error::Result<bool> {
        if self.next_upload_time.is_none() {
            let jitter = rand::rng().random_range(0..2 * REND_POST_PERIOD);
            self.next_upload_time = Some(now + jitter);
        }

        let dirty_long_enough = self
            .dirty_since
            .map(|since| now.saturating_sub(since) >= DESC_DIRTY_UPLOAD_THRESHOLD)
            .unwrap_or(false);
        let due = self.next_upload_time.map(|t| now >= t).unwrap_or(false) || dirty_long_enough;
        if !due {
            return Ok(false);
        }

        let body = self.build_descriptor_text();
        match self.config.descriptor_version {
            DescriptorVersion::V0 => {
                for authority in 0..V0_AUTHORITY_COUNT {
                    let key = format!("authority-{authority}/{}", self.config.service_id);
                    directory.publish(&key, &body)?;
                }
                self.next_upload_time = Some(now + REND_POST_PERIOD);
            }
            DescriptorVersion::V2 => {
                let period = now / V2_TIME_PERIOD_LENGTH;
                Self::publish_v2_replicas(directory, &self.config.service_id, &body, period)?;

                let until_boundary = V2_TIME_PERIOD_LENGTH - (now % V2_TIME_PERIOD_LENGTH);
                if until_boundary <= V2_ROTATION_WINDOW {
                    Self::publish_v2_replicas(directory, &self.config.service_id, &body, period + 1)?;
                }
                self.next_upload_time = Some(now + REND_POST_PERIOD);
            }
        }

        self.descriptor = Some(body);
        self.dirty_since = None;
        Ok(true)
    }

    fn publish_v2_replicas<D: DirectoryClient>(
        directory: &D,
        service_id: &str,
        body: &str,
        period: u64,
    ) -> relay_error::Result<()> {
        for replica in 0..V2_REPLICA_COUNT {
            let key = format!("hsdir-{replica}/period-{period}/{service_id}");
            directory.publish(&key, body)?;
        }
        Ok(())
    }
}

/// A named collection of configured services, keyed by service id.
#[derive(Default)]
pub struct ServiceList {
    services: HashMap<String, Service>,
}

impl ServiceList {
    pub fn new() -> ServiceList {
        ServiceList::default()
    }

    pub fn insert(&mut self, service: Service) {
        self.services.insert(service.config.service_id.clone(), service);
    }

    pub fn get(&self, service_id: &str) -> Option<&Service> {
        self.services.get(service_id)
    }

    pub fn get_mut(&mut self, service_id: &str) -> Option<&mut Service> {
        self.services.get_mut(service_id)
    }

    pub fn services_mut(&mut self) -> impl Iterator<Item = &mut Service> {
        self.services.values_mut()
    }

    /// Find the service whose intro point was established under
    /// `key_digest`, along with the matching `IntroPoint`.
    pub fn find_by_key_digest(&self, key_digest: &[u8; 20]) -> Option<(&Service, &IntroPoint)> {
        self.services.values().find_map(|svc| {
            svc.intro_points
                .iter()
                .find(|ip| &ip.key_digest == key_digest)
                .map(|ip| (svc, ip))
        })
    }
}
