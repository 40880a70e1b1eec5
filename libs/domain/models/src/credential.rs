use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored credential for an upstream source. `password_ciphertext` is opaque
/// at rest; plaintext only ever exists transiently in memory after a
/// successful decrypt (see `blacklist-core-crypto-vault`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub service_name: String,
    pub username: String,
    pub password_ciphertext: String,
    pub enabled: bool,
    pub collection_interval_seconds: i64,
    pub last_collection: Option<DateTime<Utc>>,
}

/// A decrypted credential, held only transiently.
#[derive(Clone)]
pub struct PlaintextCredential {
    pub service_name: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for PlaintextCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaintextCredential")
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fields accepted by a settings-only credential update. A settings-only
/// update must not require re-supplying the password.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CredentialSettingsUpdate {
    pub enabled: Option<bool>,
    pub collection_interval_seconds: Option<i64>,
}
