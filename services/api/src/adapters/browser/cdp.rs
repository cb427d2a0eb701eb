//! services/api/src/adapters/browser/cdp.rs
//!
//! A small Chrome DevTools Protocol client: endpoint discovery over HTTP, one
//! browser-level WebSocket, and page sessions multiplexed over it with
//! `Target.attachToTarget` in flatten mode.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("Chrome not available at {0}. Start Chrome with --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}

//=========================================================================================
// Wire messages
//=========================================================================================

#[derive(Debug, Serialize)]
struct CdpRequest<'a> {
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CdpResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<CdpErrorBody>,
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdpErrorBody {
    code: i64,
    message: String,
}

/// `/json/version`. Chrome answers this one in PascalCase.
#[derive(Debug, Deserialize)]
struct BrowserVersion {
    #[serde(rename = "Browser")]
    browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    id: String,
    url: String,
}

//=========================================================================================
// Transport
//=========================================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;

/// The shared socket plus the table of calls waiting for their response.
struct Transport {
    ws_tx: tokio::sync::Mutex<WsSink>,
    pending: Pending,
    next_id: AtomicU64,
}

impl Transport {
    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
    ) -> Result<Value, CdpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpRequest {
            id,
            method,
            params,
            session_id,
        })?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }
}

/// Routes responses to their waiting callers until the socket closes. Events are
/// not subscribed to, so they are only traced.
async fn receive_loop(mut ws_source: WsSource, pending: Pending) {
    while let Some(msg) = ws_source.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                trace!("CDP recv: {}", text);
                let resp = match serde_json::from_str::<CdpResponse>(&text) {
                    Ok(resp) => resp,
                    Err(e) => {
                        warn!("Failed to parse CDP message: {}", e);
                        continue;
                    }
                };
                if let Some(id) = resp.id {
                    if let Some(tx) = pending.lock().remove(&id) {
                        let result = match resp.error {
                            Some(error) => Err(CdpError::Protocol {
                                code: error.code,
                                message: error.message,
                            }),
                            None => Ok(resp.result.unwrap_or(Value::Null)),
                        };
                        let _ = tx.send(result);
                    }
                } else if let Some(method) = resp.method {
                    trace!("CDP event: {}", method);
                }
            }
            Ok(Message::Close(_)) => {
                debug!("CDP WebSocket closed");
                break;
            }
            Err(e) => {
                warn!("CDP WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }
    // Dropping the senders wakes every waiting caller with `SessionClosed`.
    pending.lock().clear();
}

//=========================================================================================
// Client
//=========================================================================================

/// A connection to one browser's DevTools endpoint.
pub struct CdpClient {
    http_endpoint: String,
    http: reqwest::Client,
    transport: Arc<Transport>,
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connects to a browser started with `--remote-debugging-port`, e.g. `http://localhost:9222`.
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();
        url::Url::parse(&http_endpoint)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let version_url = format!("{}/json/version", http_endpoint);
        debug!("Fetching browser version from {}", version_url);
        let version: BrowserVersion = http
            .get(&version_url)
            .send()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?;
        debug!("Connected to browser: {}", version.browser);

        Self::connect_ws(http_endpoint, http, &version.web_socket_debugger_url).await
    }

    async fn connect_ws(
        http_endpoint: String,
        http: reqwest::Client,
        ws_url: &str,
    ) -> Result<Self, CdpError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let recv_task = tokio::spawn(receive_loop(ws_source, pending.clone()));

        debug!("CDP client connected to {}", ws_url);
        Ok(Self {
            http_endpoint,
            http,
            transport: Arc::new(Transport {
                ws_tx: tokio::sync::Mutex::new(ws_sink),
                pending,
                next_id: AtomicU64::new(1),
            }),
            recv_task,
        })
    }

    /// Sends a browser-level command.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport.call(method, params, None).await
    }

    /// Opens a fresh tab and attaches a session to it.
    pub async fn new_page(&self) -> Result<CdpPage, CdpError> {
        // Chrome requires PUT for /json/new
        let page_info: PageInfo = self
            .http
            .put(format!("{}/json/new", self.http_endpoint))
            .send()
            .await?
            .json()
            .await?;
        debug!("Created new page: {} - {}", page_info.id, page_info.url);

        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({ "targetId": page_info.id, "flatten": true })),
            )
            .await?;
        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        let page = CdpPage {
            target_id: page_info.id,
            session_id,
            transport: self.transport.clone(),
        };
        page.enable_domains().await?;
        Ok(page)
    }

    pub async fn close_page(&self, page: &CdpPage) -> Result<(), CdpError> {
        self.call("Target.closeTarget", Some(json!({ "targetId": page.target_id })))
            .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

//=========================================================================================
// Page session
//=========================================================================================

/// A session attached to a single tab.
pub struct CdpPage {
    target_id: String,
    session_id: String,
    transport: Arc<Transport>,
}

impl CdpPage {
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.transport.call(method, params, Some(&self.session_id)).await
    }

    async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        self.call("DOM.enable", None).await?;
        self.call("Runtime.enable", None).await?;
        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    /// Evaluates `expression` and returns its JSON value. Thrown exceptions become
    /// `CdpError::JavaScript`.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        let result = self
            .call(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("Unknown error");
            return Err(CdpError::JavaScript(text.to_string()));
        }

        Ok(result["result"]["value"].clone())
    }

    pub async fn navigate(&self, url: &str) -> Result<(), CdpError> {
        let result = self.call("Page.navigate", Some(json!({ "url": url }))).await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(CdpError::NavigationFailed(format!("{}: {}", url, error)));
        }
        self.wait_for_load().await?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), CdpError> {
        let start = tokio::time::Instant::now();
        loop {
            let state = self.evaluate("document.readyState").await?;
            if matches!(state.as_str(), Some("complete") | Some("interactive")) {
                return Ok(());
            }
            if start.elapsed() > LOAD_TIMEOUT {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn insert_text(&self, text: &str) -> Result<(), CdpError> {
        self.call("Input.insertText", Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    /// Sends one `Input.dispatchKeyEvent` per entry in `events`.
    pub async fn key_events(&self, events: &[Value]) -> Result<(), CdpError> {
        for event in events {
            self.call("Input.dispatchKeyEvent", Some(event.clone())).await?;
        }
        Ok(())
    }
}
