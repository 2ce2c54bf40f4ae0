use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;

pub const APP_USER_AGENT: &str = concat!("BlockLaunch/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client. Timeouts apply per connection attempt and per read,
/// never to a whole transfer, so large jars are not cut off mid-stream.
pub fn build_http_client(
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    // Content-Length must describe the bytes we hash.
    default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    Client::builder()
        .user_agent(APP_USER_AGENT)
        .default_headers(default_headers)
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .build()
}
