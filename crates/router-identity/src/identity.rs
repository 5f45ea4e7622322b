//! Service identifiers: the `.onion` address derived from a service's
//! long-term public key.

use relay_core::traits::CryptoProvider;

/// First 10 bytes of `digest(public_der)`, base32-encoded — the classic
/// v2 `.onion` address body (16 lowercase characters, no padding).
pub fn service_id<C: CryptoProvider>(crypto: &C, public_der: &[u8]) -> String {
    let digest = crypto.digest(public_der);
    let truncated = &digest[..10];
    base32::encode(base32::Alphabet::RFC4648 { padding: false }, truncated).to_lowercase()
}

/// `service_id` with the conventional `.onion` suffix appended.
pub fn onion_address<C: CryptoProvider>(crypto: &C, public_der: &[u8]) -> String {
    format!("{}.onion", service_id(crypto, public_der))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::testing::FakeCrypto;

    #[test]
    fn test_service_id_is_deterministic_and_16_chars() {
        let crypto = FakeCrypto::new();
        let pk = b"fake-der:some-public-key-bytes";
        let id1 = service_id(&crypto, pk);
        let id2 = service_id(&crypto, pk);
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 16);
    }

    #[test]
    fn test_distinct_keys_yield_distinct_ids() {
        let crypto = FakeCrypto::new();
        assert_ne!(service_id(&crypto, b"key-a"), service_id(&crypto, b"key-b"));
    }

    #[test]
    fn test_onion_address_has_suffix() {
        let crypto = FakeCrypto::new();
        assert!(onion_address(&crypto, b"key").ends_with(".onion"));
    }
}
