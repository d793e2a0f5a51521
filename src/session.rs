use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Claims carried by every session token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user email)
    pub jti: String, // Session identifier, the revocation handle
    pub iat: i64,    // Issued at
    pub exp: i64,    // Expiration time
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("signature verification failed")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("session is no longer active")]
    NotActive,

    #[error("session not found")]
    NotFound,
}

/// Record kept per live session in the allow-set.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub subject: String,
    pub expires_at: i64,
}

/// A session verified against all three checks: signature, expiry, liveness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub subject: String,
    pub jti: String,
}

pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: i64,
}

/// Storage for the allow-set of live sessions.
///
/// The polarity matters: this is an allow-set, not a deny-list. A token is
/// trusted only while its jti is present here, and logout simply deletes the
/// entry. A token whose jti was never tracked, or was removed, is invalid no
/// matter how good its signature looks.
pub trait SessionStore: Send + Sync {
    fn insert(&self, jti: String, record: SessionRecord);
    fn contains(&self, jti: &str) -> bool;
    /// Returns true if the jti was present and has been removed.
    fn remove(&self, jti: &str) -> bool;
    /// Drop entries whose recorded expiry is at or before `now`.
    fn prune_expired(&self, now: i64);
}

/// Process-memory allow-set. All sessions die with the process; a restart
/// implicitly logs everyone out.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, jti: String, record: SessionRecord) {
        self.sessions.lock().unwrap().insert(jti, record);
    }

    fn contains(&self, jti: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(jti)
    }

    fn remove(&self, jti: &str) -> bool {
        self.sessions.lock().unwrap().remove(jti).is_some()
    }

    fn prune_expired(&self, now: i64) {
        self.sessions
            .lock()
            .unwrap()
            .retain(|_, record| record.expires_at > now);
    }
}

/// Issues, verifies and revokes session tokens.
///
/// The signing scheme is stateless, so a signed token cannot itself be
/// recalled before its natural expiry. Revocation is layered on top through
/// the [`SessionStore`]: the store is the single source of truth for "is
/// this session still live", and the signature and expiry checks are
/// necessary but not sufficient.
pub struct SessionAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    store: Arc<dyn SessionStore>,
}

impl SessionAuthenticator {
    pub fn new(secret: &str, token_ttl_minutes: i64, store: Arc<dyn SessionStore>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl: Duration::minutes(token_ttl_minutes),
            store,
        }
    }

    /// Mint a token bound to `subject` and start tracking it as live.
    pub fn issue(&self, subject: &str) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let expires_at = (now + self.token_ttl).timestamp();
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: subject.to_owned(),
            jti: jti.clone(),
            iat: now.timestamp(),
            exp: expires_at,
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)?;

        // Sessions that expired without a logout would otherwise sit in the
        // allow-set forever. Expired tokens already fail verification, so
        // clearing them here never changes an answer.
        self.store.prune_expired(now.timestamp());
        self.store.insert(
            jti.clone(),
            SessionRecord {
                subject: subject.to_owned(),
                expires_at,
            },
        );

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Check signature, expiry and allow-set membership, in that order.
    /// Fails closed: a malformed token is rejected like a forged one.
    pub fn verify(&self, token: &str) -> Result<VerifiedSession, SessionError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => SessionError::Expired,
                    _ => SessionError::InvalidSignature,
                }
            })?;

        if !self.store.contains(&token_data.claims.jti) {
            return Err(SessionError::NotActive);
        }

        Ok(VerifiedSession {
            subject: token_data.claims.sub,
            jti: token_data.claims.jti,
        })
    }

    /// Remove `jti` from the allow-set. An absent jti is reported, not fatal.
    pub fn revoke(&self, jti: &str) -> Result<(), SessionError> {
        if self.store.remove(jti) {
            Ok(())
        } else {
            Err(SessionError::NotFound)
        }
    }
}
