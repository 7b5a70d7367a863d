//! Encrypted CSRF tokens
//!
//! A token is `base64url(nonce || AES-256-GCM(json{sid, uid, exp}))`. It is
//! bound to one session and one user and expires on its own; there is no
//! server-side state, so rotating the secret invalidates every token.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub const CSRF_HEADER: &str = "x-csrf-token";

const NONCE_LEN: usize = 12;

#[derive(Error, Debug, PartialEq)]
pub enum CsrfError {
    #[error("CSRF secret must be 32 bytes, got {0}")]
    InvalidSecret(usize),

    #[error("malformed CSRF token")]
    Malformed,

    #[error("CSRF token expired")]
    Expired,

    #[error("CSRF token does not belong to this session")]
    Mismatch,

    #[error("failed to seal CSRF token")]
    Seal,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sid: String,
    uid: Uuid,
    exp: i64,
}

#[derive(Clone)]
pub struct CsrfCodec {
    cipher: Aes256Gcm,
    ttl: Duration,
}

impl CsrfCodec {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, CsrfError> {
        let cipher =
            Aes256Gcm::new_from_slice(secret).map_err(|_| CsrfError::InvalidSecret(secret.len()))?;
        Ok(Self { cipher, ttl })
    }

    pub fn issue(&self, session_id: &str, user_id: Uuid) -> Result<String, CsrfError> {
        let claims = Claims {
            sid: session_id.to_string(),
            uid: user_id,
            exp: Utc::now().timestamp() + self.ttl.as_secs() as i64,
        };
        self.seal(&claims)
    }

    fn seal(&self, claims: &Claims) -> Result<String, CsrfError> {
        let plaintext = serde_json::to_vec(claims).map_err(|_| CsrfError::Seal)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| CsrfError::Seal)?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Accept `token` only if it decrypts, has not expired and names this
    /// session and user
    pub fn verify(&self, token: &str, session_id: &str, user_id: Uuid) -> Result<(), CsrfError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CsrfError::Malformed)?;
        if sealed.len() <= NONCE_LEN {
            return Err(CsrfError::Malformed);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CsrfError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&plaintext).map_err(|_| CsrfError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(CsrfError::Expired);
        }
        if claims.sid != session_id || claims.uid != user_id {
            return Err(CsrfError::Mismatch);
        }
        Ok(())
    }
}
