pub mod api;
pub mod auth;
pub mod config;
pub mod handlers;
pub mod merge;
