// Client configuration.
//
// A single value built once in `main` and handed to each collaborator, so
// nothing reads process-wide state after start-up.

use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::CredentialResolver;

pub const DEFAULT_BASE_URL: &str = "https://jabbercracky.com";

/// Environment variable holding the bearer token.
pub const TOKEN_ENV_VAR: &str = "JABBERCRACKY_API_KEY";

/// Token file name, looked up in the user's home directory.
pub const TOKEN_FILE_NAME: &str = ".jabbercracky";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between two auto-submit rounds.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub token_env: String,
    /// `None` when the home directory cannot be determined.
    pub token_file: Option<PathBuf>,
    pub interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_env: TOKEN_ENV_VAR.to_string(),
            token_file: dirs::home_dir().map(|home| home.join(TOKEN_FILE_NAME)),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_token_sources(mut self, env_var: impl Into<String>, file: Option<PathBuf>) -> Self {
        self.token_env = env_var.into();
        self.token_file = file;
        self
    }

    /// Resolver reading the token sources configured here.
    pub fn credentials(&self) -> CredentialResolver {
        CredentialResolver::new(self.token_env.clone(), self.token_file.clone())
    }
}
