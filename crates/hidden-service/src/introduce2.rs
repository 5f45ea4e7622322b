//! INTRODUCE2 handling and RENDEZVOUS1 launch (§4.2).

use crate::purpose::Circuit;
use crate::service::{Service, ServiceList, MAX_REND_FAILURES};
use relay_core::id::{ExtendInfo, RouterId};
use relay_core::traits::CryptoProvider;
use std::net::{IpAddr, Ipv4Addr};

pub const DIGEST_LEN: usize = 20;
pub const COOKIE_LEN: usize = 20;
/// TAP Diffie-Hellman public value length, as used by the historical
/// rendezvous handshake this protocol is modeled on.
pub const DH_KEY_LEN: usize = 128;
/// Bytes of keying material the rendezvous KDF derives (digest + two
/// cipher-key/digest-key pairs for the forward and backward cpath hop).
pub const CPATH_KEY_MATERIAL_LEN: usize = 72;

/// A parsed rendezvous-point description: the relay the client wants the
/// service to meet at, plus the rendezvous cookie and the client's DH
/// public value.
struct ParsedIntroduce2 {
    rend_target: ExtendInfo,
    cookie: [u8; 20],
    client_dh_public: Vec<u8>,
}

/// Parse an already hybrid-decrypted INTRODUCE2 body (§4.2 step 4-5).
///
/// Only the version-2 "extend-info" rendezvous-point form is fully
/// resolvable here: versions 1 (hex digest/nickname) and the plain-nickname
/// form name a relay by identifier only, and resolving an identifier to an
/// address requires the directory component this crate does not own (§1).
fn parse_introduce2_body(decrypted: &[u8]) -> relay_error::Result<ParsedIntroduce2> {
    if decrypted.is_empty() {
        return Err(relay_error::Error::Protocol("INTRODUCE2: empty body"));
    }
    let version = decrypted[0];
    if version != 2 {
        return Err(relay_error::Error::Protocol(
            "INTRODUCE2: nickname-form rendezvous point requires directory resolution, unsupported here",
        ));
    }

    let mut pos = 1usize;
    let need = |buf: &[u8], pos: usize, n: usize| -> relay_error::Result<()> {
        if buf.len() < pos + n {
            Err(relay_error::Error::Protocol("INTRODUCE2: truncated body"))
        } else {
            Ok(())
        }
    };

    need(decrypted, pos, 4)?;
    let addr = Ipv4Addr::new(decrypted[pos], decrypted[pos + 1], decrypted[pos + 2], decrypted[pos + 3]);
    pos += 4;

    need(decrypted, pos, 2)?;
    let port = u16::from_be_bytes([decrypted[pos], decrypted[pos + 1]]);
    pos += 2;

    need(decrypted, pos, DIGEST_LEN)?;
    let mut identity = [0u8; DIGEST_LEN];
    identity.copy_from_slice(&decrypted[pos..pos + DIGEST_LEN]);
    pos += DIGEST_LEN;

    need(decrypted, pos, 2)?;
    let key_len = u16::from_be_bytes([decrypted[pos], decrypted[pos + 1]]) as usize;
    pos += 2;

    need(decrypted, pos, key_len)?;
    let onion_key_der = decrypted[pos..pos + key_len].to_vec();
    pos += key_len;

    need(decrypted, pos, COOKIE_LEN)?;
    let mut cookie = [0u8; COOKIE_LEN];
    cookie.copy_from_slice(&decrypted[pos..pos + COOKIE_LEN]);
    pos += COOKIE_LEN;

    need(decrypted, pos, DH_KEY_LEN)?;
    let client_dh_public = decrypted[pos..pos + DH_KEY_LEN].to_vec();
    pos += DH_KEY_LEN;

    if pos != decrypted.len() {
        return Err(relay_error::Error::Protocol("INTRODUCE2: trailing bytes after DH public value"));
    }

    Ok(ParsedIntroduce2 {
        rend_target: ExtendInfo {
            nickname: String::new(),
            id: RouterId(identity),
            addr: IpAddr::V4(addr),
            port,
            onion_key_der,
        },
        cookie,
        client_dh_public,
    })
}

/// Handle one INTRODUCE2 cell (§4.2, 8 steps): sanity-check the length,
/// match the leading digest against a known intro point's key, hybrid
/// decrypt with that key, parse out the rendezvous point, derive the DH
/// shared secret and keying material, and launch an `S_CONNECT_REND`
/// circuit. Returns the new circuit's id.
pub fn handle_introduce2<C: CryptoProvider>(
    services: &mut ServiceList,
    crypto: &C,
    payload: &[u8],
    now: u64,
) -> relay_error::Result<u64> {
    if payload.len() <= DIGEST_LEN {
        return Err(relay_error::Error::Protocol("INTRODUCE2: payload too short for key digest"));
    }
    let mut key_digest = [0u8; DIGEST_LEN];
    key_digest.copy_from_slice(&payload[..DIGEST_LEN]);
    let ciphertext = &payload[DIGEST_LEN..];

    let (service_id, decrypt_key) = {
        let (svc, ip) = services.find_by_key_digest(&key_digest).ok_or(relay_error::Error::NoService)?;
        let key = ip.intro_key.clone().unwrap_or_else(|| svc.config.service_key.clone());
        (svc.config.service_id.clone(), key)
    };

    let decrypted = crypto.hybrid_decrypt(&decrypt_key, ciphertext)?;
    let parsed = parse_introduce2_body(&decrypted)?;

    let (my_sk, my_pub) = crypto.dh_generate();
    let shared = crypto.dh_shared_secret(&my_sk, &parsed.client_dh_public)?;
    let handshake_material = crypto.kdf(&shared, DIGEST_LEN + CPATH_KEY_MATERIAL_LEN);

    let svc = services.get_mut(&service_id).expect("service vanished between lookup and mutation");
    let expiry = now + rend_expiry_window();
    let id = svc.allocate_circuit_id();
    let mut circuit = Circuit::connect_rend(id, parsed.rend_target, parsed.cookie, expiry, now);
    circuit.handshake_material = Some(handshake_material);
    svc.insert_circuit(circuit);
    Ok(id)
}

/// How long a `ConnectRend` circuit may sit unjoined before it's abandoned.
/// Not named directly by the spec; chosen generously relative to
/// `MAX_REND_FAILURES` retries at ordinary circuit-build timescales.
fn rend_expiry_window() -> u64 {
    600
}

/// RENDEZVOUS1 handling: an `S_CONNECT_REND` circuit opened. Send the
/// rendezvous cell (`rendezvous_cookie || DH_public_B || handshake_digest`)
/// and transition the circuit to `RendJoined`.
///
/// `dh_public_b` and `handshake_digest` are supplied by the caller (the
/// runtime layer owns sending cells over the transport; this only performs
/// the bookkeeping transition and returns the bytes to send).
pub fn on_rendezvous_circuit_open(
    service: &mut Service,
    circuit_id: u64,
    dh_public_b: &[u8],
    handshake_digest: &[u8; 20],
) -> relay_error::Result<Vec<u8>> {
    let handshake_material = {
        let circuit = service.circuit_mut(circuit_id).ok_or(relay_error::Error::Protocol("unknown circuit"))?;
        if !circuit.purpose.is_connect_rend() {
            return Err(relay_error::Error::Protocol("circuit is not awaiting rendezvous"));
        }
        circuit.handshake_material.clone().unwrap_or_default()
    };

    let cookie = match service.circuit(circuit_id).map(|c| &c.purpose) {
        Some(crate::purpose::Purpose::ConnectRend { cookie, .. }) => *cookie,
        _ => return Err(relay_error::Error::Protocol("circuit is not awaiting rendezvous")),
    };

    let mut cell = Vec::with_capacity(COOKIE_LEN + dh_public_b.len() + handshake_digest.len());
    cell.extend_from_slice(&cookie);
    cell.extend_from_slice(dh_public_b);
    cell.extend_from_slice(handshake_digest);

    let circuit = service.circuit_mut(circuit_id).unwrap();
    circuit.mark_rend_joined(handshake_material);
    Ok(cell)
}

/// Handle a failed build attempt on an in-flight `ConnectRend` circuit.
/// Relaunches toward the same target up to `MAX_REND_FAILURES`, unless the
/// very first hop failed (nothing useful to retry) or the circuit's expiry
/// has already passed.
pub fn on_rendezvous_circuit_failed(
    service: &mut Service,
    circuit_id: u64,
    first_hop_failed: bool,
    now: u64,
) -> relay_error::Result<Option<u64>> {
    let Some(circuit) = service.circuit(circuit_id) else {
        return Ok(None);
    };
    let (cookie, attempts, expiry, target) = match &circuit.purpose {
        crate::purpose::Purpose::ConnectRend { cookie, attempts, expiry } => {
            (*cookie, *attempts, *expiry, circuit.target.clone())
        }
        _ => return Err(relay_error::Error::Protocol("circuit is not a rendezvous attempt")),
    };

    service.remove_circuit(circuit_id);

    if first_hop_failed || now >= expiry || attempts + 1 >= MAX_REND_FAILURES {
        return Err(relay_error::Error::ConnectFailed);
    }

    let id = service.allocate_circuit_id();
    let mut new_circuit = Circuit::connect_rend(id, target, cookie, expiry, now);
    new_circuit.note_rend_attempt_failed();
    for _ in 0..attempts {
        new_circuit.note_rend_attempt_failed();
    }
    service.insert_circuit(new_circuit);
    Ok(Some(id))
}
