//! HTTP client factory with consistent timeout configuration.
//!
//! Every outbound client in this crate is built here so that profile probing,
//! token exchange and grant requests share the same connect and request
//! timeouts. A timed-out request is reported like any other failed call.

use std::time::Duration;

use reqwest::Client;

use crate::config::SessionConfig;

pub fn try_build_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .build()
}

pub fn try_build_client_for(config: &SessionConfig) -> Result<Client, reqwest::Error> {
    try_build_client(config.connect_timeout, config.request_timeout)
}
