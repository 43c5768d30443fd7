use chrono::Duration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use postbox_types::api::Claims;

/// Registration tokens are short-lived; the client is expected to log in for
/// a session token.
pub fn registration_ttl() -> Duration {
    Duration::minutes(15)
}

pub fn session_ttl() -> Duration {
    Duration::days(1)
}

pub fn issue_token(secret: &str, user_id: Uuid, username: &str, ttl: Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// `None` for signature mismatch, malformed payload, and elapsed expiry
/// alike — callers get a single opaque failure, never the cause.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issue_then_verify_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, user_id, "alice", session_ttl()).unwrap();

        let claims = verify_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn expired_token_is_rejected() {
        // Well past the default 60s validation leeway
        let token = issue_token(SECRET, Uuid::new_v4(), "alice", Duration::minutes(-5)).unwrap();
        assert!(verify_token(SECRET, &token).is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), "alice", session_ttl()).unwrap();
        assert!(verify_token("other-secret", &token).is_none());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue_token(SECRET, Uuid::new_v4(), "alice", session_ttl()).unwrap();

        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        assert_eq!(parts.len(), 3);
        // base64url payload with no '=' padding: swapping a char keeps it
        // decodable but breaks the signature
        parts[1] = parts[1].replacen(
            parts[1].chars().next().unwrap(),
            if parts[1].starts_with('A') { "B" } else { "A" },
            1,
        );
        let tampered = parts.join(".");

        assert!(verify_token(SECRET, &tampered).is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_token(SECRET, "not-a-token").is_none());
        assert!(verify_token(SECRET, "").is_none());
        assert!(verify_token(SECRET, "a.b.c").is_none());
    }
}
