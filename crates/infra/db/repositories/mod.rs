pub mod games;
pub mod plans;
pub mod subscriptions;
pub mod users;
