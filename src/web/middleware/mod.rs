//! # Web Middleware
//!
//! Layers installed around the host application's router.

pub mod auth;
pub mod logging;
pub mod metrics;
pub mod problems;
pub mod recovery;
pub mod request_id;
pub mod trace;
