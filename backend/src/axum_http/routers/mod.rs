pub mod accounts;
pub mod catalog;
pub mod checkout;
pub mod servers;
pub mod subscriptions;
pub mod webhooks;
