pub mod cache;
pub mod external_apis;
