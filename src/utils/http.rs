// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};

use crate::error::{AppError, FetchError, Result};
use crate::models::HttpConfig;

/// Create the shared asynchronous HTTP client.
///
/// One client (connection pool, default headers, cookie jar) is reused by
/// every adapter for the whole process lifetime.
pub fn create_async_client(config: &HttpConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    let language = HeaderValue::from_str(&config.accept_language)
        .map_err(|e| AppError::config(format!("http.accept_language: {e}")))?;
    headers.insert(ACCEPT_LANGUAGE, language);

    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Send a request and return the body of a 2xx response.
pub async fn fetch_text(request: RequestBuilder) -> std::result::Result<String, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}
