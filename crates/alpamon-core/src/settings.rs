//! Process-wide, immutable settings (Configuration file, credentials, TLS policy).
//!
//! Settings are loaded once during startup and handed around behind an
//! `Arc` from then on, per the "Global mutable state" design note in :
//! initialize once, then treat as a read-only value type passed by reference.

use crate::error::ConfigError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TLS verification policy derived from the `[ssl]` section.
#[derive(Debug, Clone)]
pub struct TlsPolicy {
    pub verify: bool,
    pub ca_cert: Option<PathBuf>,
}

/// Process-wide configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the control plane, trailing slash stripped.
    pub server_url: String,
    /// Derived backhaul URL (`http`→`ws`, `https`→`wss`, `/ws/servers/backhaul/` appended).
    pub backhaul_url: String,
    pub credential_id: String,
    pub credential_key: String,
    pub tls: TlsPolicy,
    pub debug: bool,
    /// Number of reporter-pool workers draining the priority queue (default 4).
    pub http_workers: usize,
}

impl Settings {
    /// Locations searched in order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/alpamon/alpamon.conf")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".alpamon.conf"));
        }
        paths
    }

    /// Loads and validates configuration from the first path in
    /// [`Settings::search_paths`] that exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::search_paths()
            .into_iter()
            .find(|p| p.exists())
            .ok_or(ConfigError::NotFound)?;
        Self::load_from(&path)
    }

    /// Loads and validates configuration from an explicit path, used by tests
    /// and by `alpamon configure` to re-check a file before handing it to `$EDITOR`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let ini = ini::Ini::load_from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source: ini::Error::Parse(source),
        })?;

        let server = ini.section(Some("server"));
        let raw_url = server
            .and_then(|s| s.get("url"))
            .ok_or(ConfigError::MissingKey {
                section: "server",
                key: "url",
            })?;
        let credential_id = server
            .and_then(|s| s.get("id"))
            .ok_or(ConfigError::MissingKey {
                section: "server",
                key: "id",
            })?
            .to_string();
        let credential_key = server
            .and_then(|s| s.get("key"))
            .ok_or(ConfigError::MissingKey {
                section: "server",
                key: "key",
            })?
            .to_string();

        let server_url = normalize_url(raw_url)?;
        let backhaul_url = derive_backhaul_url(&server_url);

        let ssl = ini.section(Some("ssl"));
        let verify = ssl
            .and_then(|s| s.get("verify"))
            .map(parse_bool)
            .unwrap_or(true);
        let ca_cert = ssl
            .and_then(|s| s.get("ca_cert"))
            .map(PathBuf::from);

        let logging = ini.section(Some("logging"));
        let debug = logging
            .and_then(|s| s.get("debug"))
            .map(parse_bool)
            .unwrap_or(false);

        Ok(Settings {
            server_url,
            backhaul_url,
            credential_id,
            credential_key,
            tls: TlsPolicy { verify, ca_cert },
            debug,
            http_workers: 4,
        })
    }

    /// Header value sent on every outbound HTTP request and control-channel
    /// upgrade, per `Authorization: id="<ID>", key="<KEY>"`.
    pub fn authorization_header(&self) -> String {
        format!(
            "id=\"{}\", key=\"{}\"",
            self.credential_id, self.credential_key
        )
    }

    /// Default per-call HTTP timeout used by the reporter pool.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn derive_backhaul_url(server_url: &str) -> String {
    let (scheme, rest) = if let Some(rest) = server_url.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        ("ws", rest)
    } else {
        unreachable!("server_url is normalized before this is called")
    };
    format!("{scheme}://{rest}/ws/servers/backhaul/")
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_conf(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn derives_backhaul_url_from_https() {
        assert_eq!(
            derive_backhaul_url("https://alpacon.example.com"),
            "wss://alpacon.example.com/ws/servers/backhaul/"
        );
    }

    #[test]
    fn derives_backhaul_url_from_http() {
        assert_eq!(
            derive_backhaul_url("http://localhost:8000"),
            "ws://localhost:8000/ws/servers/backhaul/"
        );
    }

    #[test]
    fn strips_trailing_slash() {
        assert_eq!(
            normalize_url("https://alpacon.example.com/").unwrap(),
            "https://alpacon.example.com"
        );
    }

    #[test]
    fn rejects_url_without_scheme() {
        assert!(matches!(
            normalize_url("alpacon.example.com"),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn loads_minimal_config() {
        let f = write_conf(
            "[server]\nurl = https://alpacon.example.com\nid = abc\nkey = secret\n",
        );
        let settings = Settings::load_from(f.path()).unwrap();
        assert_eq!(settings.server_url, "https://alpacon.example.com");
        assert_eq!(settings.backhaul_url, "wss://alpacon.example.com/ws/servers/backhaul/");
        assert!(settings.tls.verify);
        assert!(!settings.debug);
    }

    #[test]
    fn loads_ssl_and_logging_sections() {
        let f = write_conf(
            "[server]\nurl = http://10.0.0.1:8000\nid = a\nkey = b\n\n[ssl]\nverify = false\nca_cert = /etc/alpamon/ca.pem\n\n[logging]\ndebug = true\n",
        );
        let settings = Settings::load_from(f.path()).unwrap();
        assert!(!settings.tls.verify);
        assert_eq!(settings.tls.ca_cert, Some(PathBuf::from("/etc/alpamon/ca.pem")));
        assert!(settings.debug);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let f = write_conf("[server]\nurl = https://alpacon.example.com\n");
        let err = Settings::load_from(f.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[test]
    fn config_parse_is_a_fixed_point() {
        let original = "[server]\nurl = https://alpacon.example.com\nid = abc\nkey = secret\n\n[ssl]\nverify = true\n\n[logging]\ndebug = false\n";
        let f = write_conf(original);
        let first = Settings::load_from(f.path()).unwrap();

        // re-serialize through the same template shape and re-parse
        let reserialized = format!(
            "[server]\nurl = {}\nid = {}\nkey = {}\n\n[ssl]\nverify = {}\n\n[logging]\ndebug = {}\n",
            first.server_url,
            first.credential_id,
            first.credential_key,
            first.tls.verify,
            first.debug,
        );
        let f2 = write_conf(&reserialized);
        let second = Settings::load_from(f2.path()).unwrap();

        assert_eq!(first.server_url, second.server_url);
        assert_eq!(first.credential_id, second.credential_id);
        assert_eq!(first.tls.verify, second.tls.verify);
        assert_eq!(first.debug, second.debug);
    }
}
