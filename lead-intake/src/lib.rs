pub mod adf;
pub mod api;
pub mod config;
pub mod dealerships;
pub mod ingest;
pub mod router;
