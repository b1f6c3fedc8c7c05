//! Configuration loading for the ingestion worker
//!
//! OAuth client credentials are loaded from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Worker settings come from an optional `ingest.json` in the config
//! directory, overlaid by environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Credentials filename in the config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Settings filename in the config directory
const SETTINGS_FILE: &str = "ingest.json";

/// Redirect URI used when none is configured
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/oauth2/callback";

/// OAuth client credentials for the Google APIs
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl GoogleCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials (for production builds)
    /// 2. JSON file (~/.config/kmrl/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time via environment variables.
    /// Build with: GCLIENT_ID=xxx GCLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GCLIENT_ID")?;
        let client_secret = option_env!("GCLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: option_env!("GREDIRECT_URI")
                .unwrap_or(DEFAULT_REDIRECT_URI)
                .to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from a GoogleCredentialFile
    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Support both "installed" (desktop) and "web" credential types
        let section = creds
            .installed
            .or(creds.web)
            .context("Credentials file missing 'installed' or 'web' section")?;

        let redirect_uri = std::env::var("GREDIRECT_URI")
            .ok()
            .or_else(|| section.redirect_uris.into_iter().next())
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            redirect_uri,
        })
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id =
            std::env::var("GCLIENT_ID").context("GCLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GCLIENT_SECRET")
            .context("GCLIENT_SECRET environment variable not set")?;
        let redirect_uri =
            std::env::var("GREDIRECT_URI").unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Get the default credentials file path (~/.config/kmrl/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

/// Worker settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory for saved attachments and uploaded documents
    pub upload_dir: PathBuf,
    /// SQLite database path
    pub db_path: PathBuf,
    /// Gmail label applied to processed messages
    pub label_name: String,
    /// Expected sender of ingestible messages
    pub self_email: Option<String>,
    /// Also remove UNREAD from processed messages
    pub mark_read: bool,
    /// Timeout applied to every remote call
    pub http_timeout_secs: u64,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            db_path: PathBuf::from("db.sqlite"),
            label_name: "KMRL_Processed".to_string(),
            self_email: None,
            mark_read: false,
            http_timeout_secs: 30,
            openai_api_key: None,
            openai_model: "gpt-3.5-turbo".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from ~/.config/kmrl/ingest.json (if present), then
    /// apply environment overrides
    pub fn load() -> Result<Self> {
        let base = if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)?
        } else {
            Self::default()
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup (the environment in production)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(label) = lookup("KMRL_LABEL_NAME") {
            self.label_name = label;
        }
        if let Some(email) = lookup("KMRL_SELF_EMAIL") {
            self.self_email = Some(email);
        }
        if let Some(flag) = lookup("KMRL_MARK_READ") {
            self.mark_read = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(secs) = lookup("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid HTTP_TIMEOUT_SECS: {:?}", secs))?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.openai_model = model;
        }
        Ok(self)
    }

    /// Timeout applied to each remote call
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Build the HTTP agent shared by all remote clients
    pub fn http_agent(&self) -> ureq::Agent {
        ureq::Agent::config_builder()
            .timeout_global(Some(self.http_timeout()))
            .build()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_web_credentials_with_redirect() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret",
                "redirect_uris": ["http://localhost:9000/cb"]
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "web-secret");
        if std::env::var("GREDIRECT_URI").is_err() {
            assert_eq!(creds.redirect_uri, "http://localhost:9000/cb");
        }
    }

    #[test]
    fn test_parse_installed_credentials_default_redirect() {
        let json = r#"{
            "installed": {
                "client_id": "test-client-id.apps.googleusercontent.com",
                "client_secret": "test-secret"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "test-client-id.apps.googleusercontent.com");
        if std::env::var("GREDIRECT_URI").is_err() {
            assert_eq!(creds.redirect_uri, DEFAULT_REDIRECT_URI);
        }
    }

    #[test]
    fn test_invalid_json() {
        let json = r#"{ "other": {} }"#;
        assert!(GoogleCredentials::from_json(json).is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.label_name, "KMRL_Processed");
        assert_eq!(settings.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(settings.http_timeout(), Duration::from_secs(30));
        assert!(!settings.mark_read);
    }

    #[test]
    fn test_settings_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("UPLOAD_DIR", "/srv/uploads"),
            ("KMRL_SELF_EMAIL", "ops@example.com"),
            ("KMRL_MARK_READ", "true"),
            ("HTTP_TIMEOUT_SECS", "15"),
        ]);

        let settings = Settings::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(settings.self_email.as_deref(), Some("ops@example.com"));
        assert!(settings.mark_read);
        assert_eq!(settings.http_timeout(), Duration::from_secs(15));
        assert_eq!(settings.db_path, PathBuf::from("db.sqlite"));
    }

    #[test]
    fn test_settings_invalid_timeout() {
        let result = Settings::default().with_overrides(|k| {
            (k == "HTTP_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_partial_json() {
        let settings: Settings =
            serde_json::from_str(r#"{ "label_name": "Ingested", "mark_read": true }"#).unwrap();
        assert_eq!(settings.label_name, "Ingested");
        assert!(settings.mark_read);
        assert_eq!(settings.http_timeout_secs, 30);
    }
}
