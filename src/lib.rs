pub mod api;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod checkout;
pub mod config;
pub mod db;
pub mod identity;
pub mod models;
pub mod notifications;
pub mod outbox;
pub mod routes;
pub mod schema;
pub mod swagger;
