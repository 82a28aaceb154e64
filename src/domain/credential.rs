use sha2::{Digest, Sha256};
use std::fmt;

/// Everything needed to sign an APNs provider token for one app.
///
/// Loaded from configuration for each invocation and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredential {
    team_id: String,
    key_id: String,
    private_key_pem: String,
    bundle_id: String,
}

impl SigningCredential {
    #[must_use]
    pub fn new(
        team_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key_pem: impl Into<String>,
        bundle_id: impl Into<String>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            key_id: key_id.into(),
            private_key_pem: private_key_pem.into(),
            bundle_id: bundle_id.into(),
        }
    }

    #[must_use]
    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        &self.private_key_pem
    }

    #[must_use]
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// Stable hex digest identifying this credential, safe to keep around and log.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.team_id, &self.key_id, &self.bundle_id, &self.private_key_pem] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("team_id", &self.team_id)
            .field("key_id", &self.key_id)
            .field("bundle_id", &self.bundle_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_private_key() {
        let credential = SigningCredential::new("TEAM", "KEY", "super-secret-pem", "app.movee");
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("TEAM"));
        assert!(!rendered.contains("super-secret-pem"));
    }

    #[test]
    fn test_fingerprint_changes_with_any_field() {
        let base = SigningCredential::new("TEAM", "KEY", "pem", "app.movee");
        let other_key = SigningCredential::new("TEAM", "KEY2", "pem", "app.movee");
        let other_pem = SigningCredential::new("TEAM", "KEY", "pem2", "app.movee");

        assert_eq!(base.fingerprint(), base.clone().fingerprint());
        assert_ne!(base.fingerprint(), other_key.fingerprint());
        assert_ne!(base.fingerprint(), other_pem.fingerprint());
        assert_eq!(base.fingerprint().len(), 64);
    }
}
