use super::alert::{AlertDispatcher, AlertEvent};
use super::config::ServiceContext;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_MARKERS: &[&str] = &[
    "secret",
    "password",
    "token",
    "authorization",
    "signature",
    "api_key",
    "webhook_url",
];

/// Turns events at or above `min_level` into ops alerts.
pub(crate) struct OpsAlertLayer {
    dispatcher: AlertDispatcher,
    service: ServiceContext,
    min_level: Level,
}

impl OpsAlertLayer {
    pub(crate) fn new(
        dispatcher: AlertDispatcher,
        service: ServiceContext,
        min_level: Level,
    ) -> Self {
        Self {
            dispatcher,
            service,
            min_level,
        }
    }
}

#[derive(Default)]
struct AlertFields {
    message: Option<String>,
    fields: BTreeMap<String, String>,
}

impl AlertFields {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.fields
                .insert(field.name().to_string(), redact(field.name(), value));
        }
    }
}

impl Visit for AlertFields {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }
}

impl<S> Layer<S> for OpsAlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // Level ordering in tracing is inverted: ERROR is the "smallest".
        if *metadata.level() > self.min_level {
            return;
        }
        // The dispatcher logs its own delivery failures; alerting on those would loop.
        if metadata.target().starts_with(module_path!().trim_end_matches("::layer")) {
            return;
        }

        let mut visitor = AlertFields::default();
        event.record(&mut visitor);

        let span_path = ctx
            .event_scope(event)
            .map(|scope| {
                scope
                    .from_root()
                    .map(|span| span.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let location = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            _ => None,
        };

        let alert = AlertEvent {
            level: *metadata.level(),
            occurred_at: Utc::now(),
            service_name: self.service.service_name.clone(),
            stage: self.service.stage.clone(),
            component: self.service.component.clone(),
            target: metadata.target().to_string(),
            location,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
            span_path,
        };

        self.dispatcher.dispatch(alert);
    }
}

fn redact(field_name: &str, value: String) -> String {
    let name = field_name.to_ascii_lowercase();
    if SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker)) {
        return REDACTED.to_string();
    }
    value
}
