pub mod metrics;
pub mod model;
pub mod notify;
pub mod store;
pub mod time;
