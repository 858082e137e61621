//! Scripted transport for unit tests.

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, HttpStreamResponse};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

enum Reply {
    Buffered(BridgeResult<HttpResponse>),
    Chunks(Vec<BridgeResult<Bytes>>),
}

struct Step {
    delay: Duration,
    reply: Reply,
}

/// Replies to requests in order, optionally after a delay.
#[derive(Default)]
pub(crate) struct ScriptedHttp {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.respond_after(Duration::ZERO, status, body)
    }

    pub fn respond_after(self, delay: Duration, status: u16, body: &str) -> Self {
        self.push(
            delay,
            Reply::Buffered(Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::from(body.to_string()),
            })),
        )
    }

    pub fn fail(self, error: BridgeError) -> Self {
        self.push(Duration::ZERO, Reply::Buffered(Err(error)))
    }

    /// A 200 streamed response made of `chunks`.
    pub fn stream(self, chunks: &[&str]) -> Self {
        let chunks = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        self.push(Duration::ZERO, Reply::Chunks(chunks))
    }

    /// A 200 streamed response whose body breaks after `chunks`.
    pub fn stream_then_fail(self, chunks: &[&str], error: BridgeError) -> Self {
        let mut items: Vec<BridgeResult<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        items.push(Err(error));
        self.push(Duration::ZERO, Reply::Chunks(items))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(self, delay: Duration, reply: Reply) -> Self {
        self.steps.lock().unwrap().push_back(Step { delay, reply });
        self
    }

    async fn next(&self, request: HttpRequest) -> Reply {
        self.requests.lock().unwrap().push(request);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(step) => {
                if !step.delay.is_zero() {
                    core_async::time::sleep(step.delay).await;
                }
                step.reply
            }
            None => Reply::Buffered(Err(BridgeError::NotAvailable(
                "no scripted reply".to_string(),
            ))),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        match self.next(request).await {
            Reply::Buffered(result) => result,
            Reply::Chunks(_) => Err(BridgeError::OperationFailed(
                "streamed reply scripted for a buffered request".to_string(),
            )),
        }
    }

    async fn execute_stream(&self, request: HttpRequest) -> BridgeResult<HttpStreamResponse> {
        match self.next(request).await {
            Reply::Buffered(result) => result.map(HttpStreamResponse::from),
            Reply::Chunks(chunks) => Ok(HttpStreamResponse {
                status: 200,
                headers: HashMap::new(),
                body: stream::iter(chunks).boxed(),
            }),
        }
    }
}
