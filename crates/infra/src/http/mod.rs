//! HTTP adapters

pub mod client;
pub mod token_endpoint;

pub use client::{HttpClient, HttpClientBuilder};
pub use token_endpoint::HttpTokenEndpoint;
