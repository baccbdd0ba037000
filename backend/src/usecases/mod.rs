pub mod accounts;
pub mod catalog;
pub mod checkout;
pub mod console;
pub mod dashboard;
pub mod gateways;
pub mod provisioning;
