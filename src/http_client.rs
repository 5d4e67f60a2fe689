use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;

const TIMEOUT_SECONDS: u64 = 30;

const USER_AGENT: &str = "ForwardWidgets/1.0.0";

/// 全局 HTTP 客户端
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECONDS))
        .user_agent(USER_AGENT)
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to create HTTP client")
});

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    RequestFailed(String),
    #[error("响应异常状态码: {0}")]
    BadStatus(u16),
}

fn map_send_error(e: reqwest::Error) -> HttpClientError {
    if e.is_timeout() {
        HttpClientError::Timeout
    } else {
        HttpClientError::RequestFailed(e.to_string())
    }
}

/// GET 请求
pub async fn get(url: &str) -> Result<Response, HttpClientError> {
    let response = HTTP_CLIENT
        .get(url)
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(HttpClientError::BadStatus(response.status().as_u16()));
    }

    Ok(response)
}

/// GET 请求并解析 JSON
pub async fn get_json<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, HttpClientError> {
    let response = get(url).await?;
    response
        .json()
        .await
        .map_err(|e| HttpClientError::RequestFailed(e.to_string()))
}

/// POST 请求（空请求体）。状态码不在这里检查，由调用方判断
pub async fn post_empty(url: &str) -> Result<Response, HttpClientError> {
    HTTP_CLIENT
        .post(url)
        .header("Content-Type", "application/json")
        .send()
        .await
        .map_err(map_send_error)
}
