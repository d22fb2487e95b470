pub mod cache;
pub mod external_apis;
pub mod models;
