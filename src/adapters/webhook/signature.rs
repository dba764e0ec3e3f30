//! Outbound payload signing.
//!
//! The HMAC always covers the canonical JSON serialization of the payload,
//! regardless of the configured wire format, so receivers verify against
//! one well-defined byte sequence. Signatures are hex-encoded with an
//! algorithm prefix in the configured header.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::{Sha256, Sha512};

use crate::config::{SignatureAlgorithm, SignatureSettings};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;
type HmacMd5 = Hmac<Md5>;

/// Computes the signature header value for a canonical payload.
///
/// Format: `<algorithm>=<hex digest>`, e.g. `sha256=ab12...`.
pub fn sign(settings: &SignatureSettings, canonical_body: &[u8]) -> String {
    let digest = match settings.algorithm {
        SignatureAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(settings.secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(canonical_body);
            hex::encode(mac.finalize().into_bytes())
        }
        SignatureAlgorithm::Sha512 => {
            let mut mac = HmacSha512::new_from_slice(settings.secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(canonical_body);
            hex::encode(mac.finalize().into_bytes())
        }
        SignatureAlgorithm::Md5 => {
            let mut mac = HmacMd5::new_from_slice(settings.secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(canonical_body);
            hex::encode(mac.finalize().into_bytes())
        }
    };

    let prefix = match settings.algorithm {
        SignatureAlgorithm::Sha256 => "sha256",
        SignatureAlgorithm::Sha512 => "sha512",
        SignatureAlgorithm::Md5 => "md5",
    };

    format!("{prefix}={digest}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn settings(algorithm: SignatureAlgorithm) -> SignatureSettings {
        SignatureSettings {
            secret: "super-secret-key".into(),
            header: "X-Signature".into(),
            algorithm,
        }
    }

    #[test]
    fn test_sha256_shape() {
        let value = sign(&settings(SignatureAlgorithm::Sha256), b"payload");
        assert!(value.starts_with("sha256="));
        assert_eq!(value.len(), "sha256=".len() + 64);
        assert!(value["sha256=".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_lengths_per_algorithm() {
        assert_eq!(
            sign(&settings(SignatureAlgorithm::Sha512), b"payload").len(),
            "sha512=".len() + 128
        );
        assert_eq!(
            sign(&settings(SignatureAlgorithm::Md5), b"payload").len(),
            "md5=".len() + 32
        );
    }

    #[test]
    fn test_different_secrets_differ() {
        let a = sign(&settings(SignatureAlgorithm::Sha256), b"payload");
        let mut other = settings(SignatureAlgorithm::Sha256);
        other.secret = "a-different-secret".into();
        let b = sign(&other, b"payload");
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn test_signature_is_deterministic(body in proptest::collection::vec(any::<u8>(), 0..512)) {
            let cfg = settings(SignatureAlgorithm::Sha256);
            prop_assert_eq!(sign(&cfg, &body), sign(&cfg, &body));
        }

        #[test]
        fn test_signature_depends_on_body(body in proptest::collection::vec(any::<u8>(), 1..256)) {
            let cfg = settings(SignatureAlgorithm::Sha256);
            let mut tampered = body.clone();
            tampered[0] = tampered[0].wrapping_add(1);
            prop_assert_ne!(sign(&cfg, &body), sign(&cfg, &tampered));
        }
    }
}
