use std::collections::{HashMap, VecDeque};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::transport::{Body, GatewayResponse, Method, RequestOptions, Transport};

/// One request as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub credential: Option<String>,
    pub body: Option<Body>,
}

struct Reply {
    response: GatewayResponse,
    gate: Option<oneshot::Receiver<()>>,
}

/// Holds a scripted reply back until released. Dropping the gate also releases it.
pub struct Gate {
    tx: Option<oneshot::Sender<()>>,
}

impl Gate {
    pub fn release(mut self) {
        if let Some(tx) = self.tx.take() { let _ = tx.send(()); }
    }
}

/// In-process transport answering from per-(method, path) reply queues.
/// Used by tests and offline demos; every call is recorded, including unanswered ones.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self { Self::default() }

    pub fn reply(&self, method: Method, path: &str, response: GatewayResponse) {
        self.push(method, path, Reply { response, gate: None });
    }

    /// Queue a reply that is only delivered once the returned gate is released.
    pub fn reply_gated(&self, method: Method, path: &str, response: GatewayResponse) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.push(method, path, Reply { response, gate: Some(rx) });
        Gate { tx: Some(tx) }
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        self.replies.lock().entry((method, path.to_string())).or_default().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> { self.calls.lock().clone() }
    pub fn call_count(&self) -> usize { self.calls.lock().len() }
    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.method == method && c.path == path).count()
    }
}

impl Transport for ScriptedTransport {
    fn request<'a>(&'a self, path: &'a str, opts: RequestOptions) -> BoxFuture<'a, GatewayResponse> {
        let method = opts.method;
        self.calls.lock().push(RecordedCall { method, path: path.to_string(), credential: opts.credential, body: opts.body });
        let reply = self.replies.lock().get_mut(&(method, path.to_string())).and_then(|q| q.pop_front());
        Box::pin(async move {
            match reply {
                Some(Reply { response, gate }) => {
                    if let Some(rx) = gate { let _ = rx.await; }
                    response
                }
                None => GatewayResponse::network(format!("no scripted reply for {} {}", method, path)),
            }
        })
    }
}
