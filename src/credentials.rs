// Bearer token lookup.
//
// The environment variable wins; the per-user token file is only read when
// the variable is unset or blank. Both values are trimmed.

use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{ClientError, Result};

/// An API bearer token. Never empty, never padded with whitespace.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` when the trimmed value is empty.
    pub fn new(raw: &str) -> Option<Self> {
        let token = raw.trim();
        if token.is_empty() {
            None
        } else {
            Some(Credential(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct CredentialResolver {
    env_var: String,
    token_file: Option<PathBuf>,
}

impl CredentialResolver {
    pub fn new(env_var: impl Into<String>, token_file: Option<PathBuf>) -> Self {
        Self {
            env_var: env_var.into(),
            token_file,
        }
    }

    pub fn resolve(&self) -> Result<Credential> {
        if let Some(token) = std::env::var(&self.env_var).ok().and_then(|v| Credential::new(&v)) {
            debug!(source = %self.env_var, "using token from environment");
            return Ok(token);
        }

        if let Some(path) = &self.token_file {
            match std::fs::read_to_string(path) {
                Ok(data) => {
                    let first = data.trim().lines().next().unwrap_or_default();
                    if let Some(token) = Credential::new(first) {
                        debug!(source = %path.display(), "using token from file");
                        return Ok(token);
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ClientError::io(path, e)),
            }
        }

        Err(ClientError::MissingCredential(self.describe_sources()))
    }

    fn describe_sources(&self) -> String {
        match &self.token_file {
            Some(path) => format!("set {} or write the token to {}", self.env_var, path.display()),
            None => format!("set {}", self.env_var),
        }
    }
}
