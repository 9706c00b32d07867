use crate::error::ConfigError;
use crate::grid::MAX_DAYS;
use crate::upload::Endpoint;

/// Used when the page host is unknown (native builds).
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
/// Port the optimization server listens on.
pub const SERVER_PORT: u16 = 8000;
/// Days shown by the native preview window when none are given.
pub const DEFAULT_PREVIEW_DAYS: u32 = 30;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    /// Absolute base URL of the optimization server, without a trailing path.
    pub server: String,
    /// Grid drawn before any summary arrives.
    pub preview_days: Option<u32>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            server: DEFAULT_SERVER.to_string(),
            preview_days: None,
        }
    }
}

impl SiteConfig {
    /// Server on the same host that served the page.
    pub fn for_host(host: &str) -> Self {
        let host = if host.is_empty() { "127.0.0.1" } else { host };
        SiteConfig {
            server: format!("http://{}:{}", host, SERVER_PORT),
            ..SiteConfig::default()
        }
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.server.trim_end_matches('/'), endpoint.path())
    }

    pub fn with_server(mut self, server: &str) -> Result<Self, ConfigError> {
        self.server = parse_server(server)?;
        Ok(self)
    }

    pub fn with_preview_days(mut self, days: &str) -> Result<Self, ConfigError> {
        self.preview_days = Some(parse_days(days)?);
        Ok(self)
    }
}

pub fn parse_days(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(days) if days > 0 && days <= MAX_DAYS => Ok(days),
        _ => Err(ConfigError::InvalidDays(value.to_string())),
    }
}

pub fn parse_server(value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidServer(value.to_string()));
    }
    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_gets_server_port() {
        let config = SiteConfig::for_host("192.168.56.3");
        assert_eq!(config.server, "http://192.168.56.3:8000");
        assert_eq!(SiteConfig::for_host("").server, DEFAULT_SERVER);
    }

    #[test]
    fn days_must_be_positive() {
        assert_eq!(parse_days(" 365 "), Ok(365));
        assert_eq!(parse_days("0"), Err(ConfigError::InvalidDays("0".into())));
        assert!(parse_days("-4").is_err());
        assert!(parse_days("many").is_err());
        assert_eq!(parse_days("100000"), Ok(MAX_DAYS));
        assert_eq!(parse_days("100001"), Err(ConfigError::InvalidDays("100001".into())));
        let config = SiteConfig::default().with_preview_days("12").unwrap();
        assert_eq!(config.preview_days, Some(12));
    }

    #[test]
    fn server_is_normalized() {
        let config = SiteConfig::default().with_server("https://optim.local:9000/").unwrap();
        assert_eq!(config.server, "https://optim.local:9000");
        assert!(SiteConfig::default().with_server("optim.local").is_err());
        assert_eq!(config.endpoint_url(Endpoint::SummaryJson), "https://optim.local:9000/optim-json");
    }
}
