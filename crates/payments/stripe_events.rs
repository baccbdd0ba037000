use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const CUSTOMER_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Raw event envelope as Stripe posts it.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

/// Stripe fields that are an id string unless the request asked for expansion.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub subscription: Option<Expandable>,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubscriptionObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<Expandable>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    Updated,
    Deleted,
}

/// The subset of events the provisioning flow reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        event_id: String,
        session: CheckoutSessionObject,
    },
    SubscriptionChanged {
        event_id: String,
        change: SubscriptionChange,
        subscription: SubscriptionObject,
    },
    Ignored {
        event_id: String,
        event_type: String,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("malformed {event_type} payload: {source}")]
pub struct WebhookPayloadError {
    pub event_type: String,
    #[source]
    pub source: serde_json::Error,
}

impl StripeEvent {
    pub fn into_webhook_event(self) -> Result<WebhookEvent, WebhookPayloadError> {
        let StripeEvent { id, type_, data } = self;
        let parse_err = |event_type: &str, source| WebhookPayloadError {
            event_type: event_type.to_string(),
            source,
        };

        match type_.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let session = serde_json::from_value(data.object)
                    .map_err(|err| parse_err(&type_, err))?;
                Ok(WebhookEvent::CheckoutCompleted {
                    event_id: id,
                    session,
                })
            }
            CUSTOMER_SUBSCRIPTION_UPDATED | CUSTOMER_SUBSCRIPTION_DELETED => {
                let subscription = serde_json::from_value(data.object)
                    .map_err(|err| parse_err(&type_, err))?;
                let change = if type_ == CUSTOMER_SUBSCRIPTION_DELETED {
                    SubscriptionChange::Deleted
                } else {
                    SubscriptionChange::Updated
                };
                Ok(WebhookEvent::SubscriptionChanged {
                    event_id: id,
                    change,
                    subscription,
                })
            }
            _ => Ok(WebhookEvent::Ignored {
                event_id: id,
                event_type: type_,
            }),
        }
    }
}
