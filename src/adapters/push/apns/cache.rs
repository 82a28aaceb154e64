use super::token::{AuthTokenError, create_auth_token};
use crate::domain::credential::SigningCredential;
use opentelemetry::{global, metrics::Counter};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug)]
struct CachedToken {
    fingerprint: String,
    token: String,
    created_at: Instant,
}

/// Reuses a signed provider token until it ages out of the reuse window.
///
/// Entries are keyed by credential fingerprint, so a rotated key is signed
/// immediately. A zero window signs on every call.
#[derive(Debug)]
pub struct AuthTokenCache {
    ttl: Duration,
    cached: Mutex<Option<CachedToken>>,
    signed: Counter<u64>,
}

impl AuthTokenCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let meter = global::meter("movee-push");
        Self {
            ttl,
            cached: Mutex::new(None),
            signed: meter
                .u64_counter("push_auth_tokens_signed_total")
                .with_description("Total number of APNs provider tokens signed")
                .build(),
        }
    }

    /// Returns a token for `credential`, signing a new one if needed.
    ///
    /// # Errors
    /// Returns `AuthTokenError` if a fresh token has to be signed and signing fails.
    pub fn get_or_sign(&self, credential: &SigningCredential) -> Result<String, AuthTokenError> {
        let fingerprint = credential.fingerprint();
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(token) = self.fresh(cached.as_ref(), &fingerprint) {
            return Ok(token);
        }

        let token = create_auth_token(credential, unix_now())?;
        self.signed.add(1, &[]);
        tracing::debug!(key_id = %credential.key_id(), "Signed new APNs provider token");

        *cached = Some(CachedToken { fingerprint, token: token.clone(), created_at: Instant::now() });
        Ok(token)
    }
}

impl AuthTokenCache {
    fn fresh(&self, entry: Option<&CachedToken>, fingerprint: &str) -> Option<String> {
        entry
            .filter(|e| e.fingerprint == fingerprint && e.created_at.elapsed() < self.ttl)
            .map(|e| e.token.clone())
    }

    #[cfg(test)]
    fn cached_for(&self, credential: &SigningCredential) -> Option<String> {
        let cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        self.fresh(cached.as_ref(), &credential.fingerprint())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = include_str!("../../../../tests/fixtures/apns_test_key.p8");

    fn credential(key_id: &str) -> SigningCredential {
        SigningCredential::new("TEAM", key_id, TEST_KEY, "app.movee")
    }

    #[test]
    fn test_reuses_token_within_window() {
        let cache = AuthTokenCache::new(Duration::from_secs(3300));
        let first = cache.get_or_sign(&credential("KEY")).unwrap();
        assert_eq!(cache.cached_for(&credential("KEY")), Some(first.clone()));
        assert_eq!(cache.get_or_sign(&credential("KEY")).unwrap(), first);
    }

    #[test]
    fn test_zero_window_signs_every_time() {
        let cache = AuthTokenCache::new(Duration::ZERO);
        assert!(cache.get_or_sign(&credential("KEY")).is_ok());
        assert_eq!(cache.cached_for(&credential("KEY")), None);
    }

    #[test]
    fn test_credential_change_resigns() {
        let cache = AuthTokenCache::new(Duration::from_secs(3300));
        let first = cache.get_or_sign(&credential("KEY_A")).unwrap();
        let second = cache.get_or_sign(&credential("KEY_B")).unwrap();
        assert_ne!(first, second);
        assert_eq!(cache.cached_for(&credential("KEY_A")), None);
    }

    #[test]
    fn test_signing_failure_is_not_cached() {
        let cache = AuthTokenCache::new(Duration::from_secs(3300));
        let broken = SigningCredential::new("TEAM", "KEY", "AAAA", "app.movee");
        assert!(cache.get_or_sign(&broken).is_err());
        assert!(cache.get_or_sign(&credential("KEY")).is_ok());
    }
}
