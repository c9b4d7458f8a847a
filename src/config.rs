use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Built-in client defaults. Every field can be overridden by the config file or environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the REST API, e.g. `http://127.0.0.1:8000/api/`
    pub api_base_url: String,
    /// Directory holding the persisted session keys
    pub session_dir: PathBuf,
    pub request_timeout_ms: u64,
    /// Email domains accepted for registration and password reset
    pub allowed_email_domains: Vec<String>,
    /// Consecutive ambiguous privilege probes tolerated before downgrading. None never downgrades.
    pub privilege_downgrade_after: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api/".to_string(),
            session_dir: PathBuf::from(".complaint_desk"),
            request_timeout_ms: 15_000,
            allowed_email_domains: vec!["astanait.edu.kz".to_string()],
            privilege_downgrade_after: None,
        }
    }
}

/// Optional file layer. Unspecified values inherit from the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub session_dir: Option<PathBuf>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub allowed_email_domains: Option<Vec<String>>,
    #[serde(default)]
    pub privilege_downgrade_after: Option<u32>,
}

/// Environment layer, captured as plain strings so it can be built in tests without touching the process env.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub api_base_url: Option<String>,
    pub session_dir: Option<String>,
    pub request_timeout_ms: Option<String>,
    pub allowed_email_domains: Option<String>,
    pub privilege_downgrade_after: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_base_url: var("COMPLAINT_API_BASE"),
            session_dir: var("COMPLAINT_SESSION_DIR"),
            request_timeout_ms: var("COMPLAINT_TIMEOUT_MS"),
            allowed_email_domains: var("COMPLAINT_ALLOWED_EMAIL_DOMAINS"),
            privilege_downgrade_after: var("COMPLAINT_PRIVILEGE_DOWNGRADE_AFTER"),
        }
    }
}

impl ClientConfig {
    /// Defaults, then file, then environment. Unparseable numeric env values are ignored with a warning.
    pub fn from_layers(file: &FileConfig, env: &EnvOverrides) -> Self {
        let mut cfg = Self::default();
        if let Some(v) = &file.api_base_url { cfg.api_base_url = v.clone(); }
        if let Some(v) = &file.session_dir { cfg.session_dir = v.clone(); }
        if let Some(v) = file.request_timeout_ms { cfg.request_timeout_ms = v; }
        if let Some(v) = &file.allowed_email_domains { cfg.allowed_email_domains = normalize_domains(v.iter().map(|s| s.as_str())); }
        if file.privilege_downgrade_after.is_some() { cfg.privilege_downgrade_after = file.privilege_downgrade_after; }

        if let Some(v) = &env.api_base_url { cfg.api_base_url = v.trim().to_string(); }
        if let Some(v) = &env.session_dir { cfg.session_dir = PathBuf::from(v.trim()); }
        if let Some(v) = &env.request_timeout_ms {
            match v.trim().parse::<u64>() {
                Ok(ms) => cfg.request_timeout_ms = ms,
                Err(_) => tracing::warn!(target: "complaint_desk::config", "ignoring COMPLAINT_TIMEOUT_MS='{}'", v),
            }
        }
        if let Some(v) = &env.allowed_email_domains { cfg.allowed_email_domains = normalize_domains(v.split(',')); }
        if let Some(v) = &env.privilege_downgrade_after {
            match v.trim().parse::<u32>() {
                Ok(0) => cfg.privilege_downgrade_after = None,
                Ok(n) => cfg.privilege_downgrade_after = Some(n),
                Err(_) => tracing::warn!(target: "complaint_desk::config", "ignoring COMPLAINT_PRIVILEGE_DOWNGRADE_AFTER='{}'", v),
            }
        }
        if !cfg.api_base_url.ends_with('/') { cfg.api_base_url.push('/'); }
        cfg
    }

    /// Resolve from the process: optional JSON file named by COMPLAINT_DESK_CONFIG plus env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let file = match std::env::var("COMPLAINT_DESK_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                let bytes = std::fs::read(path.trim())?;
                serde_json::from_slice::<FileConfig>(&bytes)?
            }
            _ => FileConfig::default(),
        };
        Ok(Self::from_layers(&file, &EnvOverrides::from_env()))
    }

    /// Resolve an avatar or media reference into an absolute URL.
    pub fn media_url(&self, path: &str) -> String {
        let path = path.trim();
        if path.is_empty() { return String::new(); }
        if path.starts_with("http://") || path.starts_with("https://") { return path.to_string(); }
        let base = self.api_base_url.trim_end_matches('/');
        let base = base.strip_suffix("/api").unwrap_or(base);
        if path.starts_with('/') { format!("{}{}", base, path) } else { format!("{}/{}", base, path) }
    }
}

fn normalize_domains<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_default_file_env() {
        let file = FileConfig {
            api_base_url: Some("https://complaints.example.edu/api".into()),
            request_timeout_ms: Some(5_000),
            privilege_downgrade_after: Some(3),
            ..Default::default()
        };
        let env = EnvOverrides {
            request_timeout_ms: Some("2500".into()),
            allowed_email_domains: Some(" Example.EDU , ,uni.kz".into()),
            ..Default::default()
        };
        let cfg = ClientConfig::from_layers(&file, &env);
        assert_eq!(cfg.api_base_url, "https://complaints.example.edu/api/");
        assert_eq!(cfg.request_timeout_ms, 2500);
        assert_eq!(cfg.allowed_email_domains, vec!["example.edu".to_string(), "uni.kz".to_string()]);
        assert_eq!(cfg.privilege_downgrade_after, Some(3));
        assert_eq!(cfg.session_dir, PathBuf::from(".complaint_desk"));
    }

    #[test]
    fn bad_env_numbers_are_ignored() {
        let env = EnvOverrides { request_timeout_ms: Some("soon".into()), privilege_downgrade_after: Some("0".into()), ..Default::default() };
        let file = FileConfig { privilege_downgrade_after: Some(2), ..Default::default() };
        let cfg = ClientConfig::from_layers(&file, &env);
        assert_eq!(cfg.request_timeout_ms, 15_000);
        assert_eq!(cfg.privilege_downgrade_after, None);
    }

    #[test]
    fn media_url_resolution() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.media_url(""), "");
        assert_eq!(cfg.media_url("https://cdn.example.com/a.png"), "https://cdn.example.com/a.png");
        assert_eq!(cfg.media_url("/media/avatars/a.png"), "http://127.0.0.1:8000/media/avatars/a.png");
        assert_eq!(cfg.media_url("media/avatars/a.png"), "http://127.0.0.1:8000/media/avatars/a.png");
    }
}
