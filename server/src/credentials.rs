//! # Credential Store
//!
//! Loads the relay's authentication data once at startup from a JSON
//! file and serves it for the lifetime of the process. There is no
//! mutation path and no hot reload: a changed credentials file requires
//! a restart (§4.2).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::CredentialsError;

/// On-disk shape of the credentials file:
/// `{"edge-agents": {name: secret}, "access-client-secrets": [secret]}`.
#[derive(Debug, Deserialize)]
struct RawCredentials {
    #[serde(rename = "edge-agents")]
    edge_agents: HashMap<String, String>,
    #[serde(rename = "access-client-secrets")]
    access_client_secrets: Vec<String>,
}

/// Immutable, in-memory view of the relay's credentials.
#[derive(Debug)]
pub struct Credentials {
    agent_secrets: HashMap<String, String>,
    client_secrets: HashSet<String>,
}

impl Credentials {
    /// Reads and parses the credentials file at `path`.
    ///
    /// Any failure here is fatal to the relay: it is called once from
    /// `main` before the listener binds, and its `Err` propagates all
    /// the way out to a non-zero exit.
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let raw: RawCredentials =
            serde_json::from_str(&contents).map_err(|source| CredentialsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            agent_secrets: raw.edge_agents,
            client_secrets: raw.access_client_secrets.into_iter().collect(),
        })
    }

    /// `true` iff `name` is a known agent and `secret` matches.
    pub fn verify_agent(&self, name: &str, secret: &str) -> bool {
        self.agent_secrets
            .get(name)
            .is_some_and(|expected| expected == secret)
    }

    /// `true` iff `secret` is one of the configured access-client secrets.
    pub fn verify_client(&self, secret: &str) -> bool {
        self.client_secrets.contains(secret)
    }
}

/// Default path for the credentials file, matching the CLI default.
pub fn default_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn verifies_known_agent_and_secret() {
        let file = write_temp(
            r#"{"edge-agents": {"test_agent": "A"}, "access-client-secrets": ["C"]}"#,
        );
        let creds = Credentials::load(file.path()).unwrap();
        assert!(creds.verify_agent("test_agent", "A"));
        assert!(!creds.verify_agent("test_agent", "wrong"));
        assert!(!creds.verify_agent("ghost", "A"));
    }

    #[test]
    fn verifies_client_secret_set() {
        let file = write_temp(r#"{"edge-agents": {}, "access-client-secrets": ["C", "D"]}"#);
        let creds = Credentials::load(file.path()).unwrap();
        assert!(creds.verify_client("C"));
        assert!(creds.verify_client("D"));
        assert!(!creds.verify_client("E"));
    }

    #[test]
    fn rejects_malformed_file() {
        let file = write_temp("not json");
        assert!(Credentials::load(file.path()).is_err());
    }

    #[test]
    fn rejects_missing_file() {
        let missing = PathBuf::from("/nonexistent/credentials.json");
        assert!(Credentials::load(&missing).is_err());
    }
}
