//! REST server configuration.

use axum::http::HeaderValue;
use meditache_core::{MeditacheError, MeditacheResult};

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 5550;

/// Maximum number of files accepted by one attachment upload.
pub const MAX_UPLOAD_FILES: usize = 5;
/// Maximum size of a single uploaded file.
pub const MAX_UPLOAD_FILE_BYTES: usize = 5 * 1024 * 1024;

// Room for multipart boundaries and part headers on top of the file payloads.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Shared key required in `x-api-key` when set.
    pub api_key: Option<String>,
    pub max_upload_files: usize,
    pub max_upload_bytes: usize,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_API_HOST.into(),
            port: DEFAULT_API_PORT,
            cors_origins: Vec::new(),
            api_key: None,
            max_upload_files: MAX_UPLOAD_FILES,
            max_upload_bytes: MAX_UPLOAD_FILE_BYTES,
        }
    }
}

impl RestConfig {
    /// Builds a configuration from raw values (typically `API_HOST`, `API_PORT`, `CORS_ORIGINS`
    /// and `API_KEY`).
    ///
    /// Missing or blank values fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MeditacheError::InvalidConfig`] if the port is not a valid `u16` or a CORS origin
    /// is not a valid header value.
    pub fn from_env_values(
        host: Option<String>,
        port: Option<String>,
        cors_origins: Option<String>,
        api_key: Option<String>,
    ) -> MeditacheResult<Self> {
        fn non_blank(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let port = match non_blank(port) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                MeditacheError::InvalidConfig(format!("API_PORT must be a port number, got '{}'", raw))
            })?,
            None => DEFAULT_API_PORT,
        };

        let cors_origins: Vec<String> = non_blank(cors_origins)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(MeditacheError::InvalidConfig(format!(
                "invalid CORS origin '{}'",
                bad
            )));
        }

        Ok(Self {
            host: non_blank(host).unwrap_or_else(|| DEFAULT_API_HOST.into()),
            port,
            cors_origins,
            api_key: non_blank(api_key),
            ..Self::default()
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Request body limit for the upload route.
    pub fn upload_body_limit(&self) -> usize {
        self.max_upload_files
            .saturating_mul(self.max_upload_bytes)
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_values() {
        let cfg = RestConfig::from_env_values(None, Some(" ".into()), None, Some("".into())).unwrap();

        assert_eq!(cfg, RestConfig::default());
        assert_eq!(cfg.bind_addr(), "0.0.0.0:5550");
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let cfg = RestConfig::from_env_values(
            Some("127.0.0.1".into()),
            Some("8080".into()),
            Some("https://a.example, https://b.example,,".into()),
            Some("secret".into()),
        )
        .unwrap();

        assert_eq!(
            cfg.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(cfg.api_key.as_deref(), Some("secret"));
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn rejects_bad_port() {
        assert!(matches!(
            RestConfig::from_env_values(None, Some("http".into()), None, None),
            Err(MeditacheError::InvalidConfig(_))
        ));
    }
}
