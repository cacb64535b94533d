use url::Url;

use crate::ConfigError;

pub const ENV_TOKEN: &str = "GITLAB_TOKEN";
pub const ENV_BASE_URL: &str = "GITLAB_BASE_URL";
pub const ENV_VERIFY_TLS: &str = "GITLAB_VERIFY_TLS";

/// Connection settings for the CI API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// API root without a trailing slash, e.g. `https://gitlab.example.com/api/v4`.
    pub base_url: String,
    pub token: String,
    /// Certificate verification is off unless the environment opts in.
    pub verify_tls: bool,
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl ApiSettings {
    /// Build settings from a key lookup; the binary passes the process environment.
    ///
    /// Empty values count as missing. The token is checked before the base url.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let token = non_empty(ENV_TOKEN).ok_or(ConfigError::MissingEnv(ENV_TOKEN))?;
        let raw_url = non_empty(ENV_BASE_URL).ok_or(ConfigError::MissingEnv(ENV_BASE_URL))?;
        Url::parse(raw_url.trim()).map_err(|err| ConfigError::InvalidBaseUrl {
            url: raw_url.clone(),
            message: err.to_string(),
        })?;
        let verify_tls = non_empty(ENV_VERIFY_TLS)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);

        Ok(Self {
            base_url: raw_url.trim().trim_end_matches('/').to_string(),
            token,
            verify_tls,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
