//! Router descriptor assembly (§6 text format) and signing.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use relay_core::traits::CryptoProvider;
use std::net::IpAddr;

/// Everything needed to render one router descriptor, aside from the
/// identity/onion keys themselves (supplied separately so the same
/// struct can be reused to re-sign after a key rotation).
#[derive(Debug, Clone)]
pub struct DescriptorInput {
    pub nickname: String,
    pub address: IpAddr,
    pub or_port: u16,
    pub dir_port: u16,
    pub platform: String,
    pub published_at: u64,
    pub fingerprint_hex: String,
    pub uptime_secs: u64,
    pub bandwidth_rate: u64,
    pub bandwidth_burst: u64,
    pub bandwidth_capacity: u64,
    pub onion_key_pem: String,
    pub signing_key_pem: String,
    pub family: Vec<String>,
    pub contact: Option<String>,
    pub exit_policy: Vec<String>,
    pub read_history_line: String,
    pub write_history_line: String,
}

fn render_unsigned(input: &DescriptorInput) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "router {} {} {} 0 {}\n",
        input.nickname, input.address, input.or_port, input.dir_port
    ));
    out.push_str(&format!("platform {}\n", input.platform));

    let published = chrono::DateTime::from_timestamp(input.published_at as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "1970-01-01 00:00:00".to_string());
    out.push_str(&format!("published {published}\n"));

    out.push_str(&format!("opt fingerprint {}\n", input.fingerprint_hex));
    out.push_str(&format!("opt uptime {}\n", input.uptime_secs));
    out.push_str(&format!(
        "bandwidth {} {} {}\n",
        input.bandwidth_rate, input.bandwidth_burst, input.bandwidth_capacity
    ));
    out.push_str("onion-key\n");
    out.push_str(&input.onion_key_pem);
    out.push_str("signing-key\n");
    out.push_str(&input.signing_key_pem);

    if !input.family.is_empty() {
        out.push_str(&format!("opt family {}\n", input.family.join(" ")));
    }

    out.push_str(&input.read_history_line);
    out.push('\n');
    out.push_str(&input.write_history_line);
    out.push('\n');

    if let Some(contact) = &input.contact {
        out.push_str(&format!("opt contact {contact}\n"));
    }

    for rule in &input.exit_policy {
        out.push_str(rule);
        out.push('\n');
    }

    out.push_str("router-signature\n");
    out
}

/// Assemble and sign a router descriptor, returning the full text
/// document. The signature covers the SHA-1 digest of everything up to
/// and including `router-signature\n`.
pub fn assemble<C: CryptoProvider>(
    crypto: &C,
    identity_key: &relay_core::traits::RsaKeyHandle,
    input: &DescriptorInput,
) -> String {
    let mut text = render_unsigned(input);
    let digest = crypto.digest(text.as_bytes());
    let signature = crypto.rsa_sign(identity_key, &digest);
    let sig_b64 = STANDARD.encode(signature);

    text.push_str("-----BEGIN SIGNATURE-----\n");
    text.push_str(&sig_b64);
    text.push('\n');
    text.push_str("-----END SIGNATURE-----\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::FakeCrypto;
    use std::net::Ipv4Addr;

    fn sample_input() -> DescriptorInput {
        DescriptorInput {
            nickname: "relaytest".into(),
            address: IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)),
            or_port: 9001,
            dir_port: 0,
            platform: "Tor 0.0.0 on Linux".into(),
            published_at: 0,
            fingerprint_hex: "AAAA BBBB".into(),
            uptime_secs: 3600,
            bandwidth_rate: 1000,
            bandwidth_burst: 2000,
            bandwidth_capacity: 3000,
            onion_key_pem: "-----BEGIN RSA PUBLIC KEY-----\nAAAA\n-----END RSA PUBLIC KEY-----\n".into(),
            signing_key_pem: "-----BEGIN RSA PUBLIC KEY-----\nBBBB\n-----END RSA PUBLIC KEY-----\n".into(),
            family: vec![],
            contact: None,
            exit_policy: vec!["reject *:*".into()],
            read_history_line: "opt read-history 1970-01-01T00:00:00Z (900 s) 0".into(),
            write_history_line: "opt write-history 1970-01-01T00:00:00Z (900 s) 0".into(),
        }
    }

    #[test]
    fn test_descriptor_contains_required_lines_in_order() {
        let crypto = FakeCrypto::new();
        let key = crypto.generate_rsa_key();
        let text = assemble(&crypto, &key, &sample_input());

        let router_idx = text.find("router relaytest").unwrap();
        let platform_idx = text.find("platform ").unwrap();
        let published_idx = text.find("published ").unwrap();
        let onion_key_idx = text.find("onion-key\n").unwrap();
        let signing_key_idx = text.find("signing-key\n").unwrap();
        let sig_idx = text.find("router-signature\n").unwrap();
        let begin_sig_idx = text.find("-----BEGIN SIGNATURE-----").unwrap();

        assert!(router_idx < platform_idx);
        assert!(platform_idx < published_idx);
        assert!(published_idx < onion_key_idx);
        assert!(onion_key_idx < signing_key_idx);
        assert!(signing_key_idx < sig_idx);
        assert!(sig_idx < begin_sig_idx);
        assert!(text.ends_with("-----END SIGNATURE-----\n"));
    }

    #[test]
    fn test_signature_verifies_against_signing_key() {
        let crypto = FakeCrypto::new();
        let key = crypto.generate_rsa_key();
        let text = assemble(&crypto, &key, &sample_input());

        let marker = "router-signature\n";
        let idx = text.find(marker).unwrap() + marker.len();
        let signed_portion = &text[..idx];
        let digest = crypto.digest(signed_portion.as_bytes());

        let sig_start = text.find("-----BEGIN SIGNATURE-----\n").unwrap() + "-----BEGIN SIGNATURE-----\n".len();
        let sig_end = text.find("\n-----END SIGNATURE-----").unwrap();
        let sig_b64 = &text[sig_start..sig_end];
        let sig_bytes = STANDARD.decode(sig_b64).unwrap();

        let public_der = crypto.rsa_public_der(&key);
        assert!(crypto.rsa_verify(&public_der, &digest, &sig_bytes));
    }
}
