//! API key handling
//!
//! Keys are looked up, in order, from the `MESHY_API_KEY` environment
//! variable, a `.meshy` file in the working directory or any parent, and
//! `~/.meshy`. The file may be JSON (`{"apiKey": "msy_..."}`) or plain
//! `MESHY_API_KEY=msy_...` lines.

use crate::error::{MeshyError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "MESHY_API_KEY";

/// Name of the credentials file
pub const CONFIG_FILE: &str = ".meshy";

/// Prefix of secret keys issued by the service
pub const SECRET_KEY_PREFIX: &str = "msy_";

/// Bearer token for the Meshy API
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

#[derive(Deserialize)]
struct AuthFile {
    #[serde(alias = "apiKey", alias = "api_key", alias = "MESHY_API_KEY")]
    key: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(MeshyError::Authentication(
                "API key cannot be empty".to_string(),
            ));
        }
        if !key.starts_with(SECRET_KEY_PREFIX) {
            tracing::debug!("API key does not start with '{}'", SECRET_KEY_PREFIX);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Key from `MESHY_API_KEY`, if set and non-blank
    pub fn from_env() -> Option<Self> {
        Self::from_optional(std::env::var(API_KEY_ENV).ok())
    }

    fn from_optional(value: Option<String>) -> Option<Self> {
        value.and_then(|v| Self::new(v).ok())
    }

    /// Look for `filename` in `directory`, then in each parent when
    /// `search_up` is set
    pub fn from_directory(
        directory: impl AsRef<Path>,
        filename: &str,
        search_up: bool,
    ) -> Result<Option<Self>> {
        let filename = if filename.trim().is_empty() {
            CONFIG_FILE
        } else {
            filename
        };

        for dir in directory.as_ref().ancestors() {
            let path = dir.join(filename);
            if path.is_file() {
                let contents = std::fs::read_to_string(&path)?;
                if let Some(key) = parse_auth_file(&contents) {
                    tracing::debug!("Loaded API key from {}", path.display());
                    return Ok(Some(key));
                }
            }
            if !search_up {
                break;
            }
        }
        Ok(None)
    }

    /// Key from `~/.meshy`
    pub fn from_home() -> Result<Option<Self>> {
        match dirs::home_dir() {
            Some(home) => Self::from_directory(home, CONFIG_FILE, false),
            None => Ok(None),
        }
    }

    /// Environment, then the working directory and its parents, then home
    pub fn load_default() -> Result<Self> {
        if let Some(key) = Self::from_env() {
            return Ok(key);
        }
        let cwd: PathBuf = std::env::current_dir()?;
        if let Some(key) = Self::from_directory(&cwd, CONFIG_FILE, true)? {
            return Ok(key);
        }
        if let Some(key) = Self::from_home()? {
            return Ok(key);
        }
        Err(MeshyError::Authentication(format!(
            "No API key found; set {} or create a {} file",
            API_KEY_ENV, CONFIG_FILE
        )))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.0.chars().take(SECRET_KEY_PREFIX.len()).collect();
        write!(f, "ApiKey({}***)", shown)
    }
}

fn parse_auth_file(contents: &str) -> Option<ApiKey> {
    if let Ok(file) = serde_json::from_str::<AuthFile>(contents) {
        return ApiKey::new(file.key).ok();
    }

    // Legacy `KEY=value` / `KEY: value` lines
    let mut found = None;
    for line in contents.lines() {
        let parts: Vec<&str> = line.split(['=', ':']).collect();
        for pair in parts.windows(2) {
            if pair[0].trim() == API_KEY_ENV {
                found = Some(pair[1].trim().to_string());
            }
        }
    }
    found.and_then(|key| ApiKey::new(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            ApiKey::new("   "),
            Err(MeshyError::Authentication(_))
        ));
    }

    #[test]
    fn test_bearer_header() {
        let key = ApiKey::new("msy_abc123").unwrap();
        assert_eq!(key.bearer(), "Bearer msy_abc123");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let key = ApiKey::new("msy_supersecret").unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains("supersecret"));
        assert_eq!(debug, "ApiKey(msy_***)");
    }

    #[test]
    fn test_from_optional() {
        assert!(ApiKey::from_optional(None).is_none());
        assert!(ApiKey::from_optional(Some(String::new())).is_none());
        assert_eq!(
            ApiKey::from_optional(Some("msy_x".to_string())).map(|k| k.0),
            Some("msy_x".to_string())
        );
    }

    #[test]
    fn test_parse_json_file() {
        let key = parse_auth_file(r#"{"apiKey": "msy_json"}"#).unwrap();
        assert_eq!(key.as_str(), "msy_json");
    }

    #[test]
    fn test_parse_legacy_lines() {
        let key = parse_auth_file("# meshy\nMESHY_API_KEY=msy_legacy\n").unwrap();
        assert_eq!(key.as_str(), "msy_legacy");

        let key = parse_auth_file("MESHY_API_KEY: msy_colon").unwrap();
        assert_eq!(key.as_str(), "msy_colon");

        assert!(parse_auth_file("OTHER=value").is_none());
    }

    #[test]
    fn test_from_directory_searches_up() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join(CONFIG_FILE), "MESHY_API_KEY=msy_parent").unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let key = ApiKey::from_directory(&nested, CONFIG_FILE, true)
            .unwrap()
            .unwrap();
        assert_eq!(key.as_str(), "msy_parent");

        let none = ApiKey::from_directory(&nested, CONFIG_FILE, false).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_from_directory_custom_filename() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("meshy.json"), r#"{"api_key":"msy_custom"}"#).unwrap();
        let key = ApiKey::from_directory(root.path(), "meshy.json", false)
            .unwrap()
            .unwrap();
        assert_eq!(key.as_str(), "msy_custom");
    }
}
