pub mod client;
pub mod console;
pub mod models;
