use super::{
    PointsInfo, RateLimitStatus, SendOutcome, SessionClient, SessionFactory, ThreadId,
    ThreadSummary,
};
use crate::config::KlokConfig;
use async_trait::async_trait;
use chrono::Utc;
use core_logic::{Credential, NetworkError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0";

const BROWSER_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-encoding", "gzip, deflate, br, zstd"),
    ("accept-language", "en-US,en;q=0.9"),
    ("origin", "https://klokapp.ai"),
    ("referer", "https://klokapp.ai/"),
    (
        "sec-ch-ua",
        "\"Not(A:Brand\";v=\"99\", \"Microsoft Edge\";v=\"133\", \"Chromium\";v=\"133\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-site"),
];

/// Connection settings shared by every client the factory builds.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub ip_check_url: String,
    pub request_timeout: Duration,
    pub ip_check_timeout: Duration,
    pub model: String,
    pub language: String,
}

impl From<&KlokConfig> for ClientSettings {
    fn from(config: &KlokConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            ip_check_url: config.ip_check_url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            ip_check_timeout: Duration::from_secs(config.ip_check_timeout_secs),
            model: config.model.clone(),
            language: config.language.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    id: &'a str,
    title: &'static str,
    messages: Vec<ChatMessage<'a>>,
    sources: Vec<serde_json::Value>,
    model: &'a str,
    created_at: String,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    #[serde(default)]
    remaining: i64,
    #[serde(default)]
    reset_time: u64,
}

#[derive(Debug, Deserialize)]
struct ThreadsResponse {
    #[serde(default)]
    data: Vec<ThreadSummary>,
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

pub struct KlokClient {
    client: Client,
    settings: ClientSettings,
}

impl KlokClient {
    pub fn new(credential: &Credential, settings: ClientSettings) -> Result<Self, NetworkError> {
        let mut headers = HeaderMap::new();
        for (name, value) in BROWSER_HEADERS {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        let token =
            HeaderValue::from_str(&credential.token).map_err(|e| NetworkError::InvalidHeader {
                name: "x-session-token".to_string(),
                reason: e.to_string(),
            })?;
        headers.insert(HeaderName::from_static("x-session-token"), token);

        let invalid_proxy = |reason: String| NetworkError::InvalidProxy {
            proxy: credential.proxy.url.clone(),
            reason,
        };

        let mut proxy =
            reqwest::Proxy::all(&credential.proxy.url).map_err(|e| invalid_proxy(e.to_string()))?;
        if let (Some(u), Some(p)) = (&credential.proxy.username, &credential.proxy.password) {
            proxy = proxy.basic_auth(u, p);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .proxy(proxy)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| invalid_proxy(e.to_string()))?;

        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, NetworkError> {
        let endpoint = self.url(path);
        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&endpoint, self.settings.request_timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            })
    }

    async fn post_chat(&self, thread_id: &str, text: &str) -> Result<SendOutcome, NetworkError> {
        let endpoint = self.url("/chat");
        let payload = chat_payload(thread_id, text, &self.settings);
        let timeout = self.settings.request_timeout;

        let response = match self.client.post(&endpoint).json(&payload).send().await {
            Ok(response) => response,
            Err(e) if is_stream_abort(&e) => {
                debug!("Chat stream aborted for thread {}: {}", thread_id, e);
                return Ok(SendOutcome::StreamAborted);
            }
            Err(e) => return Err(map_reqwest_error(&endpoint, timeout, e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint,
            });
        }

        match response.text().await {
            Ok(body) => Ok(SendOutcome::Delivered(body)),
            Err(e) if is_stream_abort(&e) => {
                debug!("Chat stream aborted for thread {}: {}", thread_id, e);
                Ok(SendOutcome::StreamAborted)
            }
            Err(e) => Err(map_reqwest_error(&endpoint, timeout, e)),
        }
    }
}

#[async_trait]
impl SessionClient for KlokClient {
    async fn check_rate_limit(&self) -> Result<RateLimitStatus, NetworkError> {
        let data: RateLimitResponse = self.get_json("/rate-limit").await?;
        Ok(RateLimitStatus::from_wire(data.remaining, data.reset_time))
    }

    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, NetworkError> {
        let data: ThreadsResponse = self.get_json("/threads").await?;
        Ok(data.data)
    }

    async fn create_thread(&self, initial_message: &str) -> Result<ThreadId, NetworkError> {
        let thread_id = Uuid::new_v4().to_string();
        self.post_chat(&thread_id, initial_message).await?;
        Ok(thread_id)
    }

    async fn send_message(&self, thread_id: &str, text: &str) -> Result<SendOutcome, NetworkError> {
        self.post_chat(thread_id, text).await
    }

    async fn get_points(&self) -> Result<PointsInfo, NetworkError> {
        self.get_json("/points").await
    }

    async fn resolve_proxy_ip(&self) -> Result<String, NetworkError> {
        let endpoint = self.settings.ip_check_url.clone();
        let timeout = self.settings.ip_check_timeout;

        let response = self
            .client
            .get(&endpoint)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&endpoint, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint,
            });
        }

        let data: IpResponse = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse {
                endpoint,
                reason: e.to_string(),
            })?;
        Ok(data.ip)
    }
}

pub struct HttpSessionFactory {
    settings: ClientSettings,
}

impl HttpSessionFactory {
    pub fn new(config: &KlokConfig) -> Self {
        Self {
            settings: ClientSettings::from(config),
        }
    }
}

impl SessionFactory for HttpSessionFactory {
    fn connect(&self, credential: &Credential) -> Result<Box<dyn SessionClient>, NetworkError> {
        let client = KlokClient::new(credential, self.settings.clone())?;
        Ok(Box::new(client))
    }
}

fn chat_payload<'a>(
    thread_id: &'a str,
    text: &'a str,
    settings: &'a ClientSettings,
) -> ChatRequest<'a> {
    ChatRequest {
        id: thread_id,
        title: "",
        messages: vec![ChatMessage {
            role: "user",
            content: text,
        }],
        sources: Vec::new(),
        model: &settings.model,
        created_at: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        language: &settings.language,
    }
}

/// The reply body broke off mid-read. Timeouts do not count.
fn is_stream_abort(e: &reqwest::Error) -> bool {
    (e.is_body() || e.is_decode()) && !e.is_timeout()
}

fn map_reqwest_error(endpoint: &str, timeout: Duration, e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            endpoint: endpoint.to_string(),
        }
    } else if let Some(status) = e.status() {
        NetworkError::HttpError {
            status_code: status.as_u16(),
            endpoint: endpoint.to_string(),
        }
    } else if e.is_connect() {
        NetworkError::ConnectionRefused {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    } else {
        NetworkError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}
