//! Persistent user settings.
//!
//! Settings live in a small JSON file under the user's configuration directory.  The file
//! is created with defaults on first use so that there is always something to edit.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::client::DEFAULT_ENDPOINT;
use crate::error::{Error, Result};
use crate::types::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};

/// Environment variable that overrides the stored credential.
pub const AUTH_KEY_ENV: &str = "TGPT_AUTH_KEY";

/// File consulted for a proxy address when none is configured.
pub const PROXY_FILE: &str = "proxy.txt";

const PROXY_PREFIXES: &[&str] = &["http://", "https://", "socks5://"];

/// Values loaded from the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base64 encoding of the API credential.
    pub auth_key: String,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub proxy: Option<String>,
    pub chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            proxy: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Settings {
    /// Returns the decoded credential.
    ///
    /// `override_key` (normally the value of [`AUTH_KEY_ENV`]) is used verbatim when
    /// present and non-empty; otherwise the stored key is base64-decoded.
    pub fn credential(&self, override_key: Option<&str>) -> Result<Vec<u8>> {
        if let Some(key) = override_key.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(key.as_bytes().to_vec());
        }
        let stored = self.auth_key.trim();
        if stored.is_empty() {
            return Err(Error::authentication(format!(
                "no credential configured; set {AUTH_KEY_ENV} or auth_key in the settings file"
            )));
        }
        STANDARD
            .decode(stored)
            .map_err(|err| Error::authentication(format!("auth_key is not valid base64: {err}")))
    }

    /// Stores `credential` base64-encoded.
    pub fn set_credential(&mut self, credential: &[u8]) {
        self.auth_key = STANDARD.encode(credential);
    }
}

/// Reads and writes the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/tgpt/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("tgpt").join("config.json"))
            .ok_or_else(|| {
                Error::configuration("could not locate the user configuration directory", None)
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the settings, writing a default file first if none exists.
    pub fn read_or_create(&self) -> Result<Settings> {
        match fs::read(&self.path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|err| {
                Error::configuration(
                    format!("invalid settings file {}: {err}", self.path.display()),
                    Some("config".to_string()),
                )
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let settings = Settings::default();
                self.write(&settings)?;
                tracing::info!(path = %self.path.display(), "created default settings file");
                Ok(settings)
            }
            Err(err) => Err(Error::io(
                format!("failed to read settings from {}", self.path.display()),
                err,
            )),
        }
    }

    pub fn write(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                Error::io(format!("failed to create {}", parent.display()), err)
            })?;
        }
        let data = serde_json::to_vec_pretty(settings).map_err(|err| {
            Error::serialization("failed to serialize settings", Some(Box::new(err)))
        })?;
        fs::write(&self.path, data).map_err(|err| {
            Error::io(
                format!("failed to write settings to {}", self.path.display()),
                err,
            )
        })
    }
}

/// Reads a proxy address from `path`.
///
/// A missing or empty file means no proxy.  Addresses with an unsupported scheme are
/// ignored with a warning.
pub fn read_proxy_file(path: &Path) -> Result<Option<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::io(
                format!("failed to read proxy file {}", path.display()),
                err,
            ));
        }
    };
    Ok(accept_proxy(contents.trim()))
}

/// Returns `address` if it names a supported proxy scheme.
pub fn accept_proxy(address: &str) -> Option<String> {
    let address = address.trim();
    if address.is_empty() {
        return None;
    }
    if PROXY_PREFIXES.iter().any(|prefix| address.starts_with(prefix)) {
        Some(address.to_string())
    } else {
        tracing::warn!(address, "ignoring proxy with unsupported scheme");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tgpt").join("config.json");
        let store = SettingsStore::new(&path);
        let settings = store.read_or_create().unwrap();
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(store.read_or_create().unwrap(), settings);
    }

    #[test]
    fn partial_file_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"model":"gpt-4o","proxy":"socks5://127.0.0.1:9050"}"#).unwrap();
        let settings = SettingsStore::new(&path).read_or_create().unwrap();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let err = SettingsStore::new(&path).read_or_create().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn credential_resolution() {
        let mut settings = Settings::default();
        assert!(settings.credential(None).unwrap_err().is_authentication());

        settings.set_credential(b"sk-stored");
        assert_eq!(settings.auth_key, "c2stc3RvcmVk");
        assert_eq!(settings.credential(None).unwrap(), b"sk-stored");
        assert_eq!(settings.credential(Some("sk-env")).unwrap(), b"sk-env");
        assert_eq!(settings.credential(Some("  ")).unwrap(), b"sk-stored");

        settings.auth_key = "***".to_string();
        assert!(settings.credential(None).unwrap_err().is_authentication());
    }

    #[test]
    fn proxy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROXY_FILE);
        assert_eq!(read_proxy_file(&path).unwrap(), None);

        fs::write(&path, "  http://127.0.0.1:8080\n").unwrap();
        assert_eq!(
            read_proxy_file(&path).unwrap().as_deref(),
            Some("http://127.0.0.1:8080")
        );

        fs::write(&path, "ftp://127.0.0.1:21").unwrap();
        assert_eq!(read_proxy_file(&path).unwrap(), None);

        fs::write(&path, "\n").unwrap();
        assert_eq!(read_proxy_file(&path).unwrap(), None);
    }
}
