//! Mock transport calling a [`RequestHandler`] directly, without HTTP

use std::sync::Arc;

use dispatch_core::{RawRequest, Request, RequestHandler, RequestKind, Status};
use eyre::Result;
use flume::Sender;
use tokio::sync::oneshot;
use tokio::task::{self, JoinHandle};
use uuid::Uuid;

/// Response captured by the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: Status,
    pub body: String,
    pub request_id: Uuid,
    /// Whether the body was sent as JSON (as opposed to a plain error)
    pub json: bool,
}

struct RequestMsg {
    kind: RequestKind,
    argument: Option<String>,
    request_id: Uuid,
    response_channel: oneshot::Sender<MockResponse>,
}

pub struct MockService<H> {
    handler: Arc<H>,
    join_handles: Vec<JoinHandle<()>>,
}

/// Client side of the mock transport
///
/// Requests are spread round-robin over the handler threads.
pub struct MockApi {
    channels: Vec<Sender<RequestMsg>>,
    next: std::sync::atomic::AtomicUsize,
}

struct MockRawRequest {
    kind: RequestKind,
    response_channel: oneshot::Sender<MockResponse>,
}

/// Serve `handler` from `threads` blocking tasks
pub async fn start<H>(threads: u16, handler: H) -> (MockService<H>, MockApi)
where
    H: RequestHandler + Send + Sync + 'static,
{
    let handler = Arc::new(handler);

    let it = (0..threads.max(1)).map(|_| {
        let (sender, receiver) = flume::bounded::<RequestMsg>(65536);
        let handler = handler.clone();
        let handle = task::spawn_blocking(move || {
            let handler = &*handler;
            for msg in receiver.into_iter() {
                let raw = Box::new(MockRawRequest {
                    kind: msg.kind,
                    response_channel: msg.response_channel,
                });
                handler.handle(Request::from_raw(
                    msg.kind,
                    msg.request_id,
                    msg.argument,
                    raw,
                ))
            }
        });
        (sender, handle)
    });
    let (channels, join_handles) = it.unzip();

    let service = MockService {
        handler,
        join_handles,
    };
    let api = MockApi {
        channels,
        next: Default::default(),
    };
    (service, api)
}

impl<H: RequestHandler + Send + Sync + 'static> MockService<H> {
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Wait for the handler threads and shut the handler down.
    ///
    /// The [`MockApi`] must have been dropped before.
    pub async fn shutdown(self) {
        for handle in self.join_handles {
            handle.await.unwrap()
        }
        task::spawn_blocking(move || Arc::into_inner(self.handler).unwrap().shutdown())
            .await
            .unwrap();
    }
}

impl MockApi {
    pub async fn request(&self, kind: RequestKind, argument: Option<&str>) -> Result<MockResponse> {
        let (sender, receiver) = oneshot::channel();
        let msg = RequestMsg {
            kind,
            argument: argument.map(str::to_owned),
            request_id: Uuid::new_v4(),
            response_channel: sender,
        };
        let index = self
            .next
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.channels.len();
        self.channels[index].send_async(msg).await?;
        Ok(receiver.await?)
    }

    pub async fn lookup(&self, region: &str) -> Result<MockResponse> {
        self.request(RequestKind::LookupTruck, Some(region)).await
    }
}

impl RawRequest for MockRawRequest {
    fn url(&self) -> &str {
        match self.kind {
            RequestKind::LookupTruck => "/lookup",
            RequestKind::GetCustomer => "/customer",
            RequestKind::Health => "/shipping",
        }
    }

    fn respond_with_json(self: Box<Self>, status: Status, body: String, request_id: Uuid) {
        let response = MockResponse {
            status,
            body,
            request_id,
            json: true,
        };
        self.response_channel.send(response).unwrap()
    }

    fn respond_with_err(self: Box<Self>, status: Status, err: String, request_id: Uuid) {
        let response = MockResponse {
            status,
            body: err,
            request_id,
            json: false,
        };
        self.response_channel.send(response).unwrap()
    }
}
