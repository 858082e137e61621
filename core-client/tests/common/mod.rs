//! Scripted transport shared by the client integration tests.

#![allow(dead_code)]

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStreamResponse};
use bridge_traits::SettingsStore;
use bytes::Bytes;
use core_runtime::config::{CoreConfig, EtaConfig, TimeoutConfig};
use core_sync::{encode_event, SyncEvent};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Reply {
    Buffered(BridgeResult<HttpResponse>),
    Events { events: Vec<SyncEvent>, hang: bool },
}

struct Step {
    delay: Duration,
    reply: Reply,
}

#[derive(Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(self, status: u16, body: &str) -> Self {
        self.json_after(Duration::ZERO, status, body)
    }

    pub fn json_after(self, delay: Duration, status: u16, body: &str) -> Self {
        self.push(
            delay,
            Reply::Buffered(Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::from(body.to_string()),
            })),
        )
    }

    pub fn error(self, error: BridgeError) -> Self {
        self.push(Duration::ZERO, Reply::Buffered(Err(error)))
    }

    /// NDJSON stream of `events`, one line per chunk.
    pub fn events(self, events: Vec<SyncEvent>) -> Self {
        self.push(
            Duration::ZERO,
            Reply::Events {
                events,
                hang: false,
            },
        )
    }

    /// NDJSON stream that stays open after `events`.
    pub fn events_then_hang(self, events: Vec<SyncEvent>) -> Self {
        self.push(Duration::ZERO, Reply::Events { events, hang: true })
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    fn push(self, delay: Duration, reply: Reply) -> Self {
        self.steps.lock().unwrap().push_back(Step { delay, reply });
        self
    }

    async fn next(&self, request: HttpRequest) -> Reply {
        self.urls.lock().unwrap().push(request.url.clone());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(step) => {
                core_async::time::sleep(step.delay).await;
                step.reply
            }
            None => Reply::Buffered(Err(BridgeError::NotAvailable(format!(
                "unscripted request to {}",
                request.url
            )))),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        match self.next(request).await {
            Reply::Buffered(result) => result,
            Reply::Events { .. } => Err(BridgeError::OperationFailed(
                "stream scripted for a buffered request".to_string(),
            )),
        }
    }

    async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<HttpStreamResponse> {
        match self.next(request).await {
            Reply::Buffered(result) => result.map(HttpStreamResponse::from),
            Reply::Events { events, hang } => {
                let chunks: Vec<BridgeResult<Bytes>> = events
                    .iter()
                    .map(|e| Ok(encode_event(e).unwrap()))
                    .collect();
                let body = stream::iter(chunks);
                let body = if hang {
                    body.chain(stream::pending()).boxed()
                } else {
                    body.boxed()
                };
                Ok(HttpStreamResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body,
                })
            }
        }
    }
}

pub fn fast_timeouts() -> TimeoutConfig {
    TimeoutConfig {
        list_sheets: Duration::from_millis(500),
        schema_first_attempt: Duration::from_millis(150),
        schema_retry_delay: Duration::from_millis(10),
        schema_retry_attempt: Duration::from_millis(250),
        request: Duration::from_millis(500),
    }
}

pub fn config(
    transport: Arc<ScriptedTransport>,
    settings: Arc<dyn SettingsStore>,
    prefix: Option<&str>,
) -> CoreConfig {
    let mut builder = CoreConfig::builder()
        .api_base_url("https://backoffice.example.com/api")
        .bearer_token("session-token")
        .http_client(transport)
        .settings_store(settings)
        .timeouts(fast_timeouts())
        .eta(EtaConfig {
            tick_interval: Duration::from_millis(20),
            default_ms_per_row: 20.0,
        });
    if let Some(prefix) = prefix {
        builder = builder.sheet_name_prefix(prefix);
    }
    builder.build().unwrap()
}
