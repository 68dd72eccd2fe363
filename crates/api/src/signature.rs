use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";
const MAX_SIGNED_PAYLOAD_BYTES: usize = 256 * 1024;

type HmacSha256 = Hmac<Sha256>;

/// `sha256=<hex hmac>` of `payload` keyed with the app secret, as Meta sends
/// it in `X-Hub-Signature-256`.
pub fn sign_payload(payload: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

pub fn verify_meta_signature(header: &str, payload: &[u8], secret: &str) -> bool {
    if payload.len() > MAX_SIGNED_PAYLOAD_BYTES {
        return false;
    }
    let Some(digest) = header.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Compares without short-circuiting on the first differing byte.
pub(crate) fn tokens_match(lhs: &[u8], rhs: &[u8]) -> bool {
    lhs.len() == rhs.len()
        && lhs
            .iter()
            .zip(rhs)
            .fold(0_u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}
