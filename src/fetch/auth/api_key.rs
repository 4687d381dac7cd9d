use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::HeaderName;

/// An [`HttpClient`] wrapper that injects a static API key as an HTTP header.
///
/// `header_name` is the header field to set (`"x-api-key"` for the feeds this
/// crate targets, but providers vary) and `key` is the raw value written into
/// that header. The key is sent on every request; there is no refresh or
/// rotation logic.
pub struct ApiKey<C> {
    pub inner: C,
    pub header_name: String,
    pub key: String,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            inner,
            header_name: header_name.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let header_name = HeaderName::from_bytes(self.header_name.as_bytes())
            .expect("ApiKey: invalid header name");
        req.headers_mut()
            .insert(header_name, self.key.parse().unwrap());
        self.inner.execute(req).await
    }
}
