//! # Web Integration Tests

pub mod app_middleware_tests;
pub mod health_endpoint_tests;
pub mod ops_endpoint_tests;
pub mod test_infrastructure;
