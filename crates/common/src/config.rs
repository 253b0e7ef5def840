use std::path::PathBuf;

use tokio::sync::Semaphore;

use crate::types::FailurePolicy;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port (default: 8080)
    pub web_port: u16,

    /// Capacity of the outbound notification queue (default: 100, at most
    /// `Semaphore::MAX_PERMITS`)
    pub notification_queue_capacity: usize,

    /// Mail domain used in generated message ids
    pub mail_domain: String,

    /// Display name of the sender
    pub mail_from_name: String,

    /// Sender address
    pub mail_from_address: String,

    /// HTTP mail API endpoint. When unset, mail is only logged.
    pub mail_api_url: Option<String>,

    /// Bearer key for the HTTP mail API
    pub mail_api_key: Option<String>,

    /// Directory generated documents are written to (default: ./tmp)
    pub document_dir: PathBuf,

    /// Simulated latency of document generation in milliseconds (default: 1000)
    pub document_render_delay_ms: u64,

    /// How the error aggregator treats reported failures (default: fatal)
    pub failure_policy: FailurePolicy,

    /// Report one extra failure after every delivered manual
    pub synthetic_failure: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let notification_queue_capacity: usize = lookup("NOTIFICATION_QUEUE_CAPACITY")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("NOTIFICATION_QUEUE_CAPACITY must be a valid usize"))?;
        if notification_queue_capacity == 0 {
            anyhow::bail!("NOTIFICATION_QUEUE_CAPACITY must be greater than zero");
        }
        if notification_queue_capacity > Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "NOTIFICATION_QUEUE_CAPACITY must be at most {}",
                Semaphore::MAX_PERMITS
            );
        }

        Ok(Self {
            web_port: lookup("WEB_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WEB_PORT must be a valid u16"))?,
            notification_queue_capacity,
            mail_domain: lookup("MAIL_DOMAIN").unwrap_or_else(|| "localhost".to_string()),
            mail_from_name: lookup("MAIL_FROM_NAME").unwrap_or_else(|| "info".to_string()),
            mail_from_address: lookup("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|| "info@company.com".to_string()),
            mail_api_url: lookup("MAIL_API_URL"),
            mail_api_key: lookup("MAIL_API_KEY"),
            document_dir: lookup("DOCUMENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./tmp")),
            document_render_delay_ms: lookup("DOCUMENT_RENDER_DELAY_MS")
                .unwrap_or_else(|| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DOCUMENT_RENDER_DELAY_MS must be a valid u64"))?,
            failure_policy: lookup("FAILURE_POLICY")
                .unwrap_or_else(|| "fatal".to_string())
                .parse()?,
            synthetic_failure: lookup("SYNTHETIC_FAILURE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.web_port, 8080);
        assert_eq!(config.notification_queue_capacity, 100);
        assert_eq!(config.mail_from_address, "info@company.com");
        assert_eq!(config.document_dir, PathBuf::from("./tmp"));
        assert_eq!(config.document_render_delay_ms, 1000);
        assert_eq!(config.failure_policy, FailurePolicy::Fatal);
        assert!(!config.synthetic_failure);
        assert!(config.mail_api_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("WEB_PORT", "9000"),
            ("NOTIFICATION_QUEUE_CAPACITY", "8"),
            ("FAILURE_POLICY", "log"),
            ("SYNTHETIC_FAILURE", "true"),
            ("MAIL_API_URL", "http://mail.local/emails"),
        ])
        .unwrap();
        assert_eq!(config.web_port, 9000);
        assert_eq!(config.notification_queue_capacity, 8);
        assert_eq!(config.failure_policy, FailurePolicy::LogOnly);
        assert!(config.synthetic_failure);
        assert_eq!(
            config.mail_api_url.as_deref(),
            Some("http://mail.local/emails")
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = config_from(&[("NOTIFICATION_QUEUE_CAPACITY", "0")]).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_oversized_capacity_rejected() {
        let too_big = (Semaphore::MAX_PERMITS + 1).to_string();
        let err = config_from(&[("NOTIFICATION_QUEUE_CAPACITY", too_big.as_str())]).unwrap_err();
        assert!(err.to_string().contains("at most"));

        let usize_max = usize::MAX.to_string();
        let err = config_from(&[("NOTIFICATION_QUEUE_CAPACITY", usize_max.as_str())]).unwrap_err();
        assert!(err.to_string().contains("at most"));

        let max = Semaphore::MAX_PERMITS.to_string();
        let config = config_from(&[("NOTIFICATION_QUEUE_CAPACITY", max.as_str())]).unwrap();
        assert_eq!(config.notification_queue_capacity, Semaphore::MAX_PERMITS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config_from(&[("WEB_PORT", "http")]).is_err());
        assert!(config_from(&[("FAILURE_POLICY", "panic")]).is_err());
    }
}
