//! HTTP spoke.
//!
//! In the consumer role the spoke serves HTTP on the hub's listen port. Every
//! inbound request becomes a [`CanonicalMessage`] and waits for the next
//! message travelling back towards the consumer, which is turned into the HTTP
//! response. Requests and replies are paired first-in first-out.
//!
//! In the producer role the spoke originates one HTTP request per message it
//! is asked to send, and emits the producer's response on its receive stream.

use actix_web::dev::ServerHandle;
use actix_web::http::{header, StatusCode};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::{closed_signal, MessageStream, Spoke, SpokeFactory, SpokeRole};
use crate::models::{meta, CanonicalMessage, Endpoint, Protocol, TranslatorError, TranslatorResult};

/// HTTP spoke settings
#[derive(Debug, Clone)]
pub struct HttpSpokeConfig {
    /// TCP connect timeout towards producers
    pub connect_timeout: Duration,
    /// How long a consumer request waits for its reply, and the overall
    /// timeout of a producer request
    pub reply_timeout: Duration,
    /// Messages buffered between the wire and the hub
    pub queue_depth: usize,
}

impl Default for HttpSpokeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_secs(30),
            queue_depth: 64,
        }
    }
}

/// Opens HTTP spokes
pub struct HttpSpokeFactory {
    config: HttpSpokeConfig,
    client: reqwest::Client,
}

impl HttpSpokeFactory {
    pub fn new(config: HttpSpokeConfig) -> TranslatorResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.reply_timeout)
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl SpokeFactory for HttpSpokeFactory {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn open(&self, role: SpokeRole, endpoint: &Endpoint) -> TranslatorResult<Arc<dyn Spoke>> {
        match role {
            SpokeRole::Consumer(listener) => {
                let spoke = HttpConsumerSpoke::start(listener, endpoint, &self.config)?;
                Ok(Arc::new(spoke))
            }
            SpokeRole::Producer => Ok(Arc::new(HttpProducerSpoke::new(
                endpoint.clone(),
                self.client.clone(),
                self.config.queue_depth,
            ))),
        }
    }
}

// ============================================================================
// Consumer side
// ============================================================================

struct InboxState {
    sender: Option<mpsc::Sender<CanonicalMessage>>,
    pending: VecDeque<oneshot::Sender<CanonicalMessage>>,
}

/// Shared between the HTTP workers and the spoke
struct ConsumerInbox {
    state: Mutex<InboxState>,
    reply_timeout: Duration,
}

/// Serves the consumer's HTTP requests on the hub's listen port
pub struct HttpConsumerSpoke {
    port: u16,
    inbox: web::Data<ConsumerInbox>,
    receiver: Mutex<Option<mpsc::Receiver<CanonicalMessage>>>,
    server: ServerHandle,
    task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
    closed: AtomicBool,
}

impl HttpConsumerSpoke {
    fn start(
        listener: TcpListener,
        endpoint: &Endpoint,
        config: &HttpSpokeConfig,
    ) -> TranslatorResult<Self> {
        let failed = |e: std::io::Error| TranslatorError::connect_failed(endpoint.to_string(), e.to_string());

        listener.set_nonblocking(true).map_err(failed)?;
        let port = listener.local_addr().map_err(failed)?.port();

        let (sender, receiver) = mpsc::channel(config.queue_depth);
        let inbox = web::Data::new(ConsumerInbox {
            state: Mutex::new(InboxState {
                sender: Some(sender),
                pending: VecDeque::new(),
            }),
            reply_timeout: config.reply_timeout,
        });

        let app_inbox = inbox.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_inbox.clone())
                .default_service(web::to(relay_request))
        })
        .workers(1)
        .disable_signals()
        .shutdown_timeout(1)
        .listen(listener)
        .map_err(failed)?
        .run();

        let handle = server.handle();
        let task = tokio::spawn(server);

        debug!(port, consumer = %endpoint.name, "HTTP consumer spoke listening");

        Ok(Self {
            port,
            inbox,
            receiver: Mutex::new(Some(receiver)),
            server: handle,
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Spoke for HttpConsumerSpoke {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn send(&self, message: CanonicalMessage) -> TranslatorResult<()> {
        if self.is_closed() {
            return Err(TranslatorError::Transport("consumer spoke closed".to_string()));
        }

        let responder = self.inbox.state.lock().pending.pop_front();
        match responder {
            Some(responder) => {
                if responder.send(message).is_err() {
                    debug!(port = self.port, "Consumer stopped waiting, reply dropped");
                }
            }
            None => warn!(port = self.port, "Reply without a waiting consumer request, dropped"),
        }
        Ok(())
    }

    fn receive(&self) -> TranslatorResult<MessageStream> {
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| TranslatorError::Transport("receive stream already taken".to_string()))?;

        Ok(ReceiverStream::new(receiver).map(Ok).boxed())
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut state = self.inbox.state.lock();
            state.sender = None;
            state.pending.clear();
        }

        self.server.stop(false).await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        debug!(port = self.port, "HTTP consumer spoke closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for HttpConsumerSpoke {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropped without close, e.g. a cancelled hub open. The stop command
        // is sent eagerly; the server task finishes on its own.
        self.inbox.state.lock().sender = None;
        drop(self.server.stop(false));
        debug!(port = self.port, "HTTP consumer spoke dropped, server stopping");
    }
}

async fn relay_request(
    req: HttpRequest,
    body: web::Bytes,
    inbox: web::Data<ConsumerInbox>,
) -> HttpResponse {
    let message = request_to_message(&req, &body);
    let (reply_tx, reply_rx) = oneshot::channel();

    {
        let mut state = inbox.state.lock();
        let sent = match state.sender.as_ref() {
            Some(sender) => sender.try_send(message),
            None => return HttpResponse::BadGateway().body("translator hub closed"),
        };
        match sent {
            Ok(()) => state.pending.push_back(reply_tx),
            Err(TrySendError::Full(_)) => {
                return HttpResponse::ServiceUnavailable().body("translator hub busy")
            }
            Err(TrySendError::Closed(_)) => {
                return HttpResponse::BadGateway().body("translator hub closed")
            }
        }
    }

    match tokio::time::timeout(inbox.reply_timeout, reply_rx).await {
        Ok(Ok(reply)) => message_to_response(reply),
        Ok(Err(_)) => HttpResponse::BadGateway().body("translator hub closed"),
        Err(_) => HttpResponse::GatewayTimeout().body("producer did not answer in time"),
    }
}

fn request_to_message(req: &HttpRequest, body: &web::Bytes) -> CanonicalMessage {
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut message = CanonicalMessage::new(body.to_vec())
        .with_meta(meta::HTTP_METHOD, req.method().as_str())
        .with_meta(meta::HTTP_PATH, path);

    if let Some(content_type) = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        message = message.with_meta(meta::CONTENT_TYPE, content_type);
    }
    message
}

fn message_to_response(message: CanonicalMessage) -> HttpResponse {
    let status = message
        .meta(meta::HTTP_STATUS)
        .and_then(|s| s.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK);

    let mut response = HttpResponse::build(status);
    if let Some(content_type) = message.content_type() {
        response.content_type(content_type.to_string());
    }
    response.body(message.payload)
}

// ============================================================================
// Producer side
// ============================================================================

/// Originates HTTP requests towards the producer
pub struct HttpProducerSpoke {
    endpoint: Endpoint,
    client: reqwest::Client,
    replies: Mutex<Option<mpsc::Sender<CanonicalMessage>>>,
    receiver: Mutex<Option<mpsc::Receiver<CanonicalMessage>>>,
    closed: watch::Sender<bool>,
}

impl HttpProducerSpoke {
    fn new(endpoint: Endpoint, client: reqwest::Client, queue_depth: usize) -> Self {
        let (replies, receiver) = mpsc::channel(queue_depth);
        let (closed, _) = watch::channel(false);

        Self {
            endpoint,
            client,
            replies: Mutex::new(Some(replies)),
            receiver: Mutex::new(Some(receiver)),
            closed,
        }
    }

    fn target_url(&self, path: Option<&str>) -> String {
        format!("{}{}", self.endpoint.base_url(), path.unwrap_or(""))
    }

    async fn exchange(&self, message: CanonicalMessage) -> TranslatorResult<CanonicalMessage> {
        let url = self.target_url(message.meta(meta::HTTP_PATH));
        let method = match message.meta(meta::HTTP_METHOD) {
            Some(m) => reqwest::Method::from_bytes(m.as_bytes())
                .map_err(|_| TranslatorError::Transport(format!("invalid HTTP method {}", m)))?,
            None => reqwest::Method::POST,
        };

        let mut request = self.client.request(method, &url);
        if let Some(content_type) = message.content_type() {
            request = request.header(header::CONTENT_TYPE.as_str(), content_type);
        }

        let response = request
            .body(message.payload)
            .send()
            .await
            .map_err(|e| TranslatorError::Transport(format!("request to {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| TranslatorError::Transport(format!("reading reply from {} failed: {}", url, e)))?;

        let mut reply = CanonicalMessage::new(body.to_vec()).with_meta(meta::HTTP_STATUS, status.to_string());
        if let Some(content_type) = content_type {
            reply = reply.with_meta(meta::CONTENT_TYPE, content_type);
        }
        Ok(reply)
    }
}

#[async_trait]
impl Spoke for HttpProducerSpoke {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn send(&self, message: CanonicalMessage) -> TranslatorResult<()> {
        let closed_err = || TranslatorError::Transport("producer spoke closed".to_string());

        let replies = self.replies.lock().clone().ok_or_else(closed_err)?;

        tokio::select! {
            reply = self.exchange(message) => {
                replies.send(reply?).await.map_err(|_| closed_err())
            }
            _ = closed_signal(self.closed.subscribe()) => Err(closed_err()),
        }
    }

    fn receive(&self) -> TranslatorResult<MessageStream> {
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| TranslatorError::Transport("receive stream already taken".to_string()))?;

        Ok(ReceiverStream::new(receiver)
            .take_until(closed_signal(self.closed.subscribe()))
            .map(Ok)
            .boxed())
    }

    async fn close(&self) {
        self.closed.send_replace(true);
        self.replies.lock().take();
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}
