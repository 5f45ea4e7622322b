//! Thin wiring example: one hidden service driven through a few ticks
//! against the `relay-core` test doubles. Not a CLI — every value below is
//! hardcoded, the way `cmd/ksvc-smoke/src/main.rs` hardcodes its scenario.

use relay::testing::{FakeCrypto, FakeDirectory, FakeRouterOracle};
use relay::{
    rinfo, CryptoProvider, DescriptorVersion, ExtendInfo, PortMapping, RouterId, Runtime, Service,
    ServiceConfig,
};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::ExitCode;

fn relay_stub(n: u8) -> ExtendInfo {
    ExtendInfo {
        nickname: format!("relay{n}"),
        id: RouterId([n; 20]),
        addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, n)),
        port: 9001,
        onion_key_der: vec![n],
    }
}

fn run() -> relay::Result<()> {
    relay::rlog::init();

    let crypto = FakeCrypto::new();
    let routers = FakeRouterOracle::new((1..=6).map(relay_stub).collect());
    let directory = FakeDirectory::new();

    let mut runtime = Runtime::new(crypto, routers, directory, 0);
    runtime.start_decrypt_pool(0, 64);

    let service_key = runtime.crypto().generate_rsa_key();
    let key_digest = runtime.crypto().digest(&runtime.crypto().rsa_public_der(&service_key));
    let config = ServiceConfig {
        directory: PathBuf::from("/var/lib/relay/hidden_service"),
        ports: vec![PortMapping {
            virtual_port: 80,
            real_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            real_port: 8080,
        }],
        intro_node_exclude: HashSet::new(),
        service_key,
        service_id: "exampleonionid".into(),
        key_digest,
        descriptor_version: DescriptorVersion::V2,
    };
    runtime.services.insert(Service::new(config, 0));

    // `Runtime::tick` drives both intro-point maintenance and descriptor
    // upload scheduling; by now=40 the service's initial dirty descriptor
    // has been dirty past the 30s threshold, so the scheduler uploads it
    // without waiting on the randomized initial schedule.
    for now in [0u64, 1, 40] {
        runtime.tick(now);
    }

    if let Some(svc) = runtime.services.get("exampleonionid") {
        rinfo!("service has {} live intro points", svc.intro_points().len());
        rinfo!("next descriptor upload scheduled for t={:?}", svc.next_upload_time());
    }
    rinfo!("directory holds {} published descriptor replica(s)", runtime.directory().published_count());

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ relay::Error::Crypto(_)) => {
            eprintln!("key error: {e}");
            ExitCode::from(2)
        }
        Err(e @ relay::Error::IoError(_)) => {
            eprintln!("directory upload failure: {e}");
            ExitCode::from(3)
        }
        Err(e) => {
            eprintln!("startup error: {e}");
            ExitCode::from(1)
        }
    }
}
