use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use bridge_types::{AccountConfig, BridgeError, Result};

/// Filesystem locations an authenticated session's artifacts are persisted
/// under (spec.md §6: "Persisted state: authentication session artifacts
/// under configured sessionPath, cachePath, profilesFolder").
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub session_path: PathBuf,
    pub cache_path: PathBuf,
    pub profiles_folder: PathBuf,
}

impl SessionPaths {
    pub fn from_account(account: &AccountConfig) -> Self {
        Self {
            session_path: PathBuf::from(&account.session_path),
            cache_path: PathBuf::from(&account.cache_path),
            profiles_folder: PathBuf::from(&account.profiles_folder),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at_unix_ms: u64,
}

/// Minimal wrapper around the account's persisted session, able to refresh
/// an expired token against an external auth endpoint.
///
/// Grounded on `rucord_rest::RequestManager`: a thin `reqwest::Client`
/// wrapper that attaches a bearer token and deserializes a JSON response.
/// The actual authentication protocol (Microsoft OAuth device flow, or
/// whatever a given game server expects) is the out-of-scope collaborator;
/// this type only owns the locally-persisted artifact and the refresh call
/// shape.
pub struct AuthSessionStore {
    client: reqwest::Client,
    auth_endpoint: String,
}

impl AuthSessionStore {
    pub fn new(auth_endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth_endpoint: auth_endpoint.into(),
        }
    }

    pub fn load_cached(&self, paths: &SessionPaths) -> Option<SessionArtifact> {
        let data = std::fs::read(&paths.session_path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    pub fn persist(&self, paths: &SessionPaths, artifact: &SessionArtifact) -> Result<()> {
        if let Some(parent) = paths.session_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BridgeError::Internal(format!("creating session dir: {e}")))?;
        }
        let data = serde_json::to_vec_pretty(artifact)
            .map_err(|e| BridgeError::Internal(format!("serializing session: {e}")))?;
        std::fs::write(&paths.session_path, data)
            .map_err(|e| BridgeError::Internal(format!("persisting session: {e}")))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionArtifact> {
        let response = self
            .client
            .post(&self.auth_endpoint)
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|e| BridgeError::Auth(format!("refresh request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BridgeError::Auth(format!(
                "refresh rejected with status {}",
                response.status()
            )));
        }

        response
            .json::<SessionArtifact>()
            .await
            .map_err(|e| BridgeError::Auth(format!("refresh response malformed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_types::{AccountConfig, AuthMethod, ReconnectionPolicy};

    fn account(dir: &std::path::Path) -> AccountConfig {
        AccountConfig {
            username: "Bot".into(),
            auth_method: AuthMethod::Offline,
            session_path: dir.join("session.json").display().to_string(),
            cache_path: dir.join("cache").display().to_string(),
            profiles_folder: dir.join("profiles").display().to_string(),
            chat_length_limit: 256,
            reconnection: ReconnectionPolicy::default(),
        }
    }

    #[test]
    fn persists_and_reloads_session_artifact() {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("bridge_session_test_{unique}"));
        let account = account(&dir);
        let paths = SessionPaths::from_account(&account);
        let store = AuthSessionStore::new("https://auth.example.invalid/refresh");

        let artifact = SessionArtifact {
            access_token: "token".into(),
            refresh_token: "refresh".into(),
            expires_at_unix_ms: 1_700_000_000_000,
        };

        store.persist(&paths, &artifact).unwrap();
        let reloaded = store.load_cached(&paths).unwrap();
        assert_eq!(reloaded.access_token, artifact.access_token);

        std::fs::remove_dir_all(&dir).ok();
    }
}
