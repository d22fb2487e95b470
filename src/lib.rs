pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructures;

#[cfg(test)]
pub(crate) mod test_support;
