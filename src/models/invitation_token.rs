use base64::Engine;
use rand::Rng;

/// Prefix on every invitation token.
pub const INVITATION_TOKEN_PREFIX: &str = "inv_";

/// Length of the encoded random part (32 bytes, base64 URL-safe, no padding).
const RANDOM_PART_LEN: usize = 43;

/// Generate a new invitation token.
///
/// 32 random bytes (256 bits of entropy), URL-safe base64 without padding so
/// the token can travel in a registration link unescaped.
pub fn generate_invitation_token() -> String {
    let mut rng = rand::thread_rng();
    let mut random_bytes = [0u8; 32];
    rng.fill(&mut random_bytes);

    let random_part = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes);

    format!("{}{}", INVITATION_TOKEN_PREFIX, random_part)
}

/// Cheap shape check before touching storage.
pub fn is_well_formed_token(token: &str) -> bool {
    let Some(random_part) = token.strip_prefix(INVITATION_TOKEN_PREFIX) else {
        return false;
    };
    random_part.len() == RANDOM_PART_LEN
        && random_part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
