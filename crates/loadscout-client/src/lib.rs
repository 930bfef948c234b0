//! HTTP client for the presence service under test.

pub mod http;

pub use http::{HttpClientConfig, HttpPresenceClient};
