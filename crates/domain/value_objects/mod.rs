pub mod catalog;
pub mod checkout;
pub mod enums;
pub mod plans;
pub mod subscriptions;
