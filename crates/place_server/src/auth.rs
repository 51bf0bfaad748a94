//! Token authentication.
//!
//! Tokens are HMAC-SHA256 signed and carry their issue time so they can
//! expire without server-side state.
//!
//! ## Token Format
//!
//! - 8 bytes: user id (big-endian)
//! - 8 bytes: issue time (Unix millis, big-endian)
//! - 32 bytes: HMAC-SHA256 over the first 16 bytes
//!
//! Total: 48 bytes, base64url-encoded without padding for transport.

use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use place_storage::{UserDirectory, UserId, UserRecord};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const CLAIMS_LEN: usize = 16;
const TOKEN_LEN: usize = CLAIMS_LEN + 32;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(30 * 24 * 60 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and checks session tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Creates a token for `user_id`, issued now.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the secret cannot key the MAC.
    pub fn create_token(&self, user_id: UserId) -> ServerResult<String> {
        self.create_token_at(user_id, now_millis())
    }

    /// Creates a token for `user_id` with an explicit issue time.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the secret cannot key the MAC.
    pub fn create_token_at(&self, user_id: UserId, issued_ms: u64) -> ServerResult<String> {
        let mut token = Vec::with_capacity(TOKEN_LEN);
        token.extend_from_slice(&user_id.to_be_bytes());
        token.extend_from_slice(&issued_ms.to_be_bytes());

        let mac = self.mac(&token)?;
        token.extend_from_slice(&mac.finalize().into_bytes());
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Validates a token and returns the user id it was issued for.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] if the token is
    /// malformed, forged or expired.
    pub fn validate_token(&self, token: &str) -> ServerResult<UserId> {
        let raw = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| ServerError::AuthenticationFailed("token is not base64url".into()))?;
        if raw.len() != TOKEN_LEN {
            return Err(ServerError::AuthenticationFailed(
                "invalid token length".into(),
            ));
        }

        let (claims, signature) = raw.split_at(CLAIMS_LEN);
        self.mac(claims)?
            .verify_slice(signature)
            .map_err(|_| ServerError::AuthenticationFailed("invalid signature".into()))?;

        let mut user_bytes = [0u8; 8];
        user_bytes.copy_from_slice(&claims[..8]);
        let mut issued_bytes = [0u8; 8];
        issued_bytes.copy_from_slice(&claims[8..]);

        let issued = u64::from_be_bytes(issued_bytes);
        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now_millis() > issued.saturating_add(expiry_millis) {
            return Err(ServerError::AuthenticationFailed("token expired".into()));
        }

        Ok(u64::from_be_bytes(user_bytes))
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Config(format!("unusable auth secret: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

/// Resolves tokens to user records.
///
/// Verification and lookup run under one lock; calls are made from the
/// worker pool.
pub struct Authenticator {
    validator: TokenValidator,
    directory: Arc<dyn UserDirectory>,
    lock: Mutex<()>,
}

impl Authenticator {
    /// Creates an authenticator over `directory`.
    pub fn new(validator: TokenValidator, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            validator,
            directory,
            lock: Mutex::new(()),
        }
    }

    /// Returns the token validator.
    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Verifies `token` and loads the user it names.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::AuthenticationFailed`] for bad tokens and
    /// unknown users, or a storage error if the lookup fails.
    pub fn resolve(&self, token: &str) -> ServerResult<UserRecord> {
        let _guard = self.lock.lock();
        let user_id = self.validator.validate_token(token)?;
        self.directory
            .get(user_id)?
            .ok_or_else(|| ServerError::AuthenticationFailed(format!("unknown user {user_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use place_storage::{LocalDirectory, Role};

    fn validator() -> TokenValidator {
        TokenValidator::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec()))
    }

    #[test]
    fn token_creation_and_validation() {
        let validator = validator();
        let token = validator.create_token(42).unwrap();
        assert_eq!(validator.validate_token(&token).unwrap(), 42);
    }

    #[test]
    fn token_wrong_secret() {
        let token = validator().create_token(7).unwrap();
        let other = TokenValidator::new(AuthConfig::new(b"another-secret".to_vec()));
        assert!(matches!(
            other.validate_token(&token),
            Err(ServerError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn token_tampered_user() {
        let validator = validator();
        let token = validator.create_token(7).unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        raw[7] ^= 0x01;
        let forged = URL_SAFE_NO_PAD.encode(raw);
        assert!(validator.validate_token(&forged).is_err());
    }

    #[test]
    fn token_garbage() {
        let validator = validator();
        assert!(validator.validate_token("not a token!").is_err());
        assert!(validator.validate_token("").is_err());
        assert!(validator.validate_token("AAAA").is_err());
    }

    #[test]
    fn token_expired() {
        let validator = TokenValidator::new(
            AuthConfig::new(b"secret".to_vec()).with_expiry(Duration::from_secs(60)),
        );
        let token = validator
            .create_token_at(1, now_millis() - 120_000)
            .unwrap();
        assert!(validator.validate_token(&token).is_err());

        let fresh = validator.create_token_at(1, now_millis() - 1_000).unwrap();
        assert_eq!(validator.validate_token(&fresh).unwrap(), 1);
    }

    #[test]
    fn authenticator_resolves_users() {
        let directory = Arc::new(LocalDirectory::in_memory());
        let alice = directory.add_user("alice", Role::User).unwrap();
        let auth = Authenticator::new(validator(), directory);

        let token = auth.validator().create_token(alice.id).unwrap();
        assert_eq!(auth.resolve(&token).unwrap().name, "alice");

        let ghost = auth.validator().create_token(999).unwrap();
        assert!(matches!(
            auth.resolve(&ghost),
            Err(ServerError::AuthenticationFailed(_))
        ));
    }
}
