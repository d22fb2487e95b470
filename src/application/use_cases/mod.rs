pub mod cached_resolve_ci_status;
pub mod resolve_ci_status;
pub mod stream_ci_status;
