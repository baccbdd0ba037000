mod alert;
mod config;
mod discord;
mod layer;

use alert::{AlertDispatcher, AlertSink};
use anyhow::Result;
use config::ObservabilityConfig;
use discord::DiscordAlertSink;
use layer::OpsAlertLayer;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber: local-time fmt output filtered by `RUST_LOG`,
/// plus ops alerts when `OPS_ALERT_WEBHOOK_URL` is set. Must run inside a tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.ops_alert.as_ref() {
        Some(alert) => {
            let sink: Arc<dyn AlertSink> =
                Arc::new(DiscordAlertSink::new(alert.webhook_url.clone())?);
            let dispatcher = AlertDispatcher::spawn(vec![sink]);
            Some(
                OpsAlertLayer::new(dispatcher, config.service.clone(), alert.min_level)
                    .with_filter(LevelFilter::from_level(alert.min_level)),
            )
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .try_init()?;

    for warning in &config.warnings {
        warn!(warning = %warning, "observability: config warning");
    }

    info!(
        service = %config.service.service_name,
        stage = %config.service.stage,
        component = %config.service.component,
        ops_alerts = config.ops_alert.is_some(),
        "observability: initialized"
    );

    Ok(())
}
