use serde::Serialize;
use uuid::Uuid;

/// Header correlating a request across services
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Kind of the request
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RequestKind {
    /// Try to book one truck in a region
    ///
    /// The argument is the (already percent-decoded) region name. Answered
    /// with [`Status::Ok`] if a truck was allocated and with
    /// [`Status::ServiceUnavailable`] otherwise.
    LookupTruck,

    /// Load a customer record and find a truck for the customer's region
    ///
    /// The argument is the customer id taken from the `customer` query
    /// parameter.
    GetCustomer,

    /// Liveness probe of the fleet service
    Health,
}

/// Status codes used by the services
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Status {
    /// 200
    Ok,
    /// 400
    BadRequest,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 500
    InternalError,
    /// 503
    ServiceUnavailable,
    /// 504
    GatewayTimeout,
}

impl Status {
    /// The numeric HTTP status code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::InternalError => 500,
            Status::ServiceUnavailable => 503,
            Status::GatewayTimeout => 504,
        }
    }
}

/// Request received by one of the services
pub struct Request {
    kind: RequestKind,
    request_id: Uuid,
    argument: Option<String>,
    raw: Box<dyn RawRequest + Send>,
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("request_id", &self.request_id)
            .field("argument", &self.argument)
            .field("raw", &format_args!(".."))
            .finish()
    }
}

/// Interface for handling requests
pub trait RequestHandler {
    /// Handle a request
    ///
    /// This method may be called concurrently from different threads.
    fn handle(&self, request: Request);

    /// Shut the service down
    ///
    /// This method waits for all threads spawned by the service (e.g., the
    /// replenisher) to have terminated.
    fn shutdown(self);
}

/// A raw request, implemented by the HTTP server and the test transport
pub trait RawRequest {
    /// Get the URL
    fn url(&self) -> &str;

    /// Respond with a JSON document
    fn respond_with_json(self: Box<Self>, status: Status, body: String, request_id: Uuid);
    /// Respond with a plain text error message
    fn respond_with_err(self: Box<Self>, status: Status, err: String, request_id: Uuid);
}

impl Request {
    /// Get the request's kind
    #[inline]
    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    /// Get the id correlating this request across services
    ///
    /// Taken from the `X-Request-Id` header, randomly generated if the caller
    /// did not send one.
    #[inline]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The region or customer id the request refers to
    #[inline]
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Get the request URL
    #[inline]
    pub fn url(&self) -> &str {
        self.raw.url()
    }

    /// Respond with `value` encoded as JSON.
    ///
    /// Falls back to a [`Status::InternalError`] if `value` cannot be encoded.
    /// This method blocks until the response has been sent.
    pub fn respond_with_json<T: Serialize + ?Sized>(self, status: Status, value: &T) {
        match serde_json::to_string(value) {
            Ok(body) => self.raw.respond_with_json(status, body, self.request_id),
            Err(err) => {
                tracing::warn!(request = %self.request_id, %err, "cannot encode response");
                self.raw.respond_with_err(
                    Status::InternalError,
                    format!("cannot encode response: {err}"),
                    self.request_id,
                )
            }
        }
    }

    /// Respond with an error message.
    ///
    /// This method blocks until the response has been sent.
    #[inline]
    pub fn respond_with_err(self, status: Status, err: impl Into<String>) {
        self.raw.respond_with_err(status, err.into(), self.request_id);
    }

    /// Respond with [`Status::ServiceUnavailable`] and a JSON encoded message
    #[inline]
    pub fn respond_unavailable(self, msg: &str) {
        self.respond_with_json(Status::ServiceUnavailable, msg);
    }

    /// Create a new request from a [`RawRequest`]
    #[inline]
    pub fn from_raw(
        kind: RequestKind,
        request_id: Uuid,
        argument: Option<String>,
        raw: Box<dyn RawRequest + Send>,
    ) -> Self {
        Self {
            kind,
            request_id,
            argument,
            raw,
        }
    }
}
