use std::env;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) stage: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OpsAlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service: ServiceContext,
    pub(crate) ops_alert: Option<OpsAlertConfig>,
    /// Logged once the subscriber exists.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let component = component.trim().to_string();

        let service = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            stage: non_empty("STAGE").unwrap_or_else(|| "local".to_string()),
            component,
        };

        let mut warnings = Vec::new();

        let webhook_url = match non_empty("OPS_ALERT_WEBHOOK_URL") {
            Some(raw) => match Url::parse(&raw) {
                Ok(url) if url.scheme() == "https" || url.scheme() == "http" => Some(url),
                Ok(_) => {
                    warnings.push(
                        "OPS_ALERT_WEBHOOK_URL must be http(s); ops alerts disabled".to_string(),
                    );
                    None
                }
                // The url embeds a token, so only the parse error is reported.
                Err(err) => {
                    warnings.push(format!("OPS_ALERT_WEBHOOK_URL is invalid ({err}); ops alerts disabled"));
                    None
                }
            },
            None => None,
        };

        let ops_alert = webhook_url.map(|webhook_url| {
            let min_level = match non_empty("OPS_ALERT_LEVEL") {
                Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                    warnings.push(format!("OPS_ALERT_LEVEL `{raw}` is not a level; using error"));
                    Level::ERROR
                }),
                None => Level::ERROR,
            };
            OpsAlertConfig {
                webhook_url,
                min_level,
            }
        });

        Self {
            service,
            ops_alert,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}
