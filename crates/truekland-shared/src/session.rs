use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::types::UserId;

// Claims signed by the server, client presents them as a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn new(user_id: UserId, ttl: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            user_id,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

/// Encode and sign `claims` as `base64url(json).base64url(signature)`.
pub fn issue_token(claims: &SessionClaims, signing_key: &SigningKey) -> String {
    // Serializing a struct of ids and timestamps cannot fail.
    let payload = serde_json::to_vec(claims).unwrap_or_default();
    let signature = signing_key.sign(&payload);

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload),
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

pub fn verify_token(token: &str, verifying_key: &VerifyingKey) -> Result<SessionClaims, SessionError> {
    verify_token_at(token, verifying_key, Utc::now())
}

pub fn verify_token_at(
    token: &str,
    verifying_key: &VerifyingKey,
    now: DateTime<Utc>,
) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.trim().split_once('.').ok_or(SessionError::Malformed)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| SessionError::Malformed)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| SessionError::Malformed)?;

    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return Err(SessionError::Malformed);
    };

    verifying_key
        .verify(&payload, &signature)
        .map_err(|_| SessionError::BadSignature)?;

    let claims: SessionClaims =
        serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;

    if now >= claims.expires_at {
        return Err(SessionError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_session_token_valid() {
        let key = SigningKey::generate(&mut OsRng);
        let claims = SessionClaims::new(UserId::new(), Duration::hours(1));

        let token = issue_token(&claims, &key);
        let verified = verify_token(&token, &key.verifying_key()).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_session_token_expired() {
        let key = SigningKey::generate(&mut OsRng);
        let claims = SessionClaims::new(UserId::new(), Duration::hours(1));
        let token = issue_token(&claims, &key);

        let later = Utc::now() + Duration::hours(2);
        assert_eq!(
            verify_token_at(&token, &key.verifying_key(), later),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn test_session_token_wrong_server_key() {
        let key = SigningKey::generate(&mut OsRng);
        let wrong = SigningKey::generate(&mut OsRng);
        let claims = SessionClaims::new(UserId::new(), Duration::hours(1));
        let token = issue_token(&claims, &key);

        assert_eq!(
            verify_token(&token, &wrong.verifying_key()),
            Err(SessionError::BadSignature)
        );
    }

    #[test]
    fn test_session_token_tampered_payload() {
        let key = SigningKey::generate(&mut OsRng);
        let claims = SessionClaims::new(UserId::new(), Duration::hours(1));
        let token = issue_token(&claims, &key);
        let (_, sig) = token.split_once('.').unwrap();

        let forged = SessionClaims::new(UserId::new(), Duration::days(365));
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{forged_payload}.{sig}");

        assert_eq!(
            verify_token(&forged_token, &key.verifying_key()),
            Err(SessionError::BadSignature)
        );
    }

    #[test]
    fn test_session_token_garbage() {
        let key = SigningKey::generate(&mut OsRng);
        assert_eq!(
            verify_token("not-a-token", &key.verifying_key()),
            Err(SessionError::Malformed)
        );
        assert_eq!(
            verify_token("abc.def", &key.verifying_key()),
            Err(SessionError::Malformed)
        );
    }
}
