// Library exports for the idea board
// This allows integration tests and external code to use board modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod routes;
pub mod state;
pub mod store;
pub mod tenant;
