mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use crate::error::FeedError;

/// Fetches the raw bytes of a feed over HTTP.
///
/// A non-success status is returned as [`FeedError::Status`] without the
/// response body ever being read; an error page must not reach the protobuf
/// decoder downstream.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<u8>, FeedError> {
    let url = url
        .parse()
        .map_err(|_| FeedError::BadUrl(url.to_string()))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status(status));
    }

    Ok(resp.bytes().await?.to_vec())
}
