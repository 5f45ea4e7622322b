//! `Runtime` — the single owned context replacing the original's
//! process-wide statics (§3 Design Note 1).

use crate::decrypt_pool::DecryptPool;
use crate::{rinfo, rwarn};
use relay_core::traits::{CryptoProvider, DirectoryClient, RouterOracle};
use router_identity::KeyRing;
use std::sync::Arc;

/// Owns every piece of event-loop-local state plus the three out-of-scope
/// collaborators, wrapped in `Arc` so the background decrypt pool can share
/// them without requiring `CryptoProvider`/`RouterOracle`/`DirectoryClient`
/// to be `Clone`.
pub struct Runtime<C: CryptoProvider, R: RouterOracle, D: DirectoryClient> {
    pub history: reputation::HistoryMap,
    pub bandwidth: reputation::BandwidthArray,
    pub predicted_ports: reputation::PredictedPortTable,
    pub predicted_internal: reputation::PredictedInternalUsage,
    pub identity: Arc<KeyRing>,
    pub services: hidden_service::ServiceList,
    crypto: Arc<C>,
    routers: Arc<R>,
    directory: Arc<D>,
    decrypt_pool: Option<DecryptPool>,
}

impl<C, R, D> Runtime<C, R, D>
where
    C: CryptoProvider,
    R: RouterOracle,
    D: DirectoryClient,
{
    pub fn new(crypto: C, routers: R, directory: D, now: u64) -> Self {
        let crypto = Arc::new(crypto);
        Runtime {
            history: reputation::HistoryMap::new(),
            bandwidth: reputation::BandwidthArray::new(),
            predicted_ports: reputation::PredictedPortTable::new(now),
            predicted_internal: reputation::PredictedInternalUsage::default(),
            identity: Arc::new(KeyRing::new(crypto.as_ref(), now)),
            services: hidden_service::ServiceList::new(),
            crypto,
            routers: Arc::new(routers),
            directory: Arc::new(directory),
            decrypt_pool: None,
        }
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    pub fn routers(&self) -> &R {
        &self.routers
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Start the onion-skin decrypt worker pool. `worker_count == 0` means
    /// "auto-detect" (see `DecryptPool::default_worker_count`).
    pub fn start_decrypt_pool(&mut self, worker_count: usize, queue_capacity: usize)
    where
        C: Send + Sync + 'static,
    {
        self.decrypt_pool = Some(DecryptPool::start(
            self.crypto.clone(),
            self.identity.clone(),
            worker_count,
            queue_capacity,
        ));
    }

    pub fn decrypt_pool(&self) -> Option<&DecryptPool> {
        self.decrypt_pool.as_ref()
    }

    /// One event-loop pass: age out stale connection history, run every
    /// service's intro-point maintenance tick and descriptor upload
    /// schedule, drain completed decrypt jobs, and sweep the cellbuf
    /// freelists. Cell I/O and per-circuit framing dispatch are driven by
    /// the caller against its own transports; this only advances the
    /// shared, time-driven state.
    pub fn tick(&mut self, now: u64) {
        self.history.gc(now);

        for svc in self.services.services_mut() {
            svc.introduce_tick(self.crypto.as_ref(), self.routers.as_ref(), now);
            match svc.upload_tick(self.directory.as_ref(), now) {
                Ok(true) => rinfo!("uploaded descriptor for service {}", svc.config.service_id),
                Ok(false) => {}
                Err(e) => rwarn!("descriptor upload failed for service {}: {e}", svc.config.service_id),
            }
        }

        if let Some(pool) = &self.decrypt_pool {
            for (id, result) in pool.poll() {
                match result {
                    Ok(plaintext) => rinfo!("decrypt job {id} completed ({} bytes)", plaintext.len()),
                    Err(e) => rwarn!("decrypt job {id} failed: {e}"),
                }
            }
        }

        cellbuf::freelist::sweep_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::{FakeCrypto, FakeDirectory, FakeRouterOracle};

    #[test]
    fn test_new_seeds_predicted_port_80() {
        let runtime = Runtime::new(FakeCrypto::new(), FakeRouterOracle::new(vec![]), FakeDirectory::new(), 0);
        assert!(runtime.predicted_ports.is_active(80, 0));
    }

    #[test]
    fn test_tick_runs_without_services() {
        let mut runtime = Runtime::new(FakeCrypto::new(), FakeRouterOracle::new(vec![]), FakeDirectory::new(), 0);
        runtime.tick(1);
        runtime.tick(2);
    }

    #[test]
    fn test_decrypt_pool_starts_and_reports_worker_count() {
        let mut runtime = Runtime::new(FakeCrypto::new(), FakeRouterOracle::new(vec![]), FakeDirectory::new(), 0);
        runtime.start_decrypt_pool(2, 8);
        assert_eq!(runtime.decrypt_pool().unwrap().worker_count(), 2);
    }

    #[test]
    fn test_tick_uploads_dirty_service_descriptor() {
        use hidden_service::{DescriptorVersion, PortMapping, Service, ServiceConfig};
        use relay_core::traits::CryptoProvider;
        use std::collections::HashSet;
        use std::net::{IpAddr, Ipv4Addr};

        let mut runtime = Runtime::new(FakeCrypto::new(), FakeRouterOracle::new(vec![]), FakeDirectory::new(), 0);
        let service_key = runtime.crypto().generate_rsa_key();
        let key_digest = runtime.crypto().digest(&runtime.crypto().rsa_public_der(&service_key));
        let config = ServiceConfig {
            directory: "/tmp/hs".into(),
            ports: vec![PortMapping { virtual_port: 80, real_addr: IpAddr::V4(Ipv4Addr::LOCALHOST), real_port: 8080 }],
            intro_node_exclude: HashSet::new(),
            service_key,
            service_id: "svcabc".into(),
            key_digest,
            descriptor_version: DescriptorVersion::V0,
        };
        runtime.services.insert(Service::new(config, 0));

        // Dirty since construction (now=0); by now=40 the 30s dirty
        // threshold has elapsed, so the tick must upload without waiting
        // for the randomized schedule.
        runtime.tick(40);
        // v0 posts to a small fixed authority set (3 keys), not just one.
        assert_eq!(runtime.directory().published_count(), 3);
    }
}
