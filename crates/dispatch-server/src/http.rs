//! 🏗 HTTP request implementation

use std::borrow::Cow;
use std::io::Read;

use dispatch_core::lookup::LOOKUP_PATH;
use dispatch_core::{RawRequest, RequestKind, Status, REQUEST_ID_HEADER};
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Method, Response};
use tracing::debug;
use uuid::Uuid;

/// Older path prefix of the lookup route, still accepted
const LEGACY_LOOKUP_PATH: &str = "/shipping/findtruck";

const NOT_FOUND: &str = "🚚 could not find the service you are looking for!

Valid requests are:
  GET /lookup/{region}
  GET /shipping/findtruck/{region}
  GET /shipping
  GET /customer?customer={id}";

struct HTTPRequest(tiny_http::Request);

impl RawRequest for HTTPRequest {
    fn url(&self) -> &str {
        self.0.url()
    }

    fn respond_with_json(self: Box<Self>, status: Status, body: String, request_id: Uuid) {
        self.respond(
            Response::from_string(body).with_status_code(status.code()),
            "application/json",
            request_id,
        )
    }

    fn respond_with_err(self: Box<Self>, status: Status, err: String, request_id: Uuid) {
        self.respond(
            Response::from_string(err).with_status_code(status.code()),
            "text/plain; charset=utf-8",
            request_id,
        )
    }
}

impl HTTPRequest {
    /// Add the content type and request id headers to `res` and send it
    fn respond<R: Read>(self, mut res: Response<R>, content_type: &str, request_id: Uuid) {
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
            res.add_header(header);
        }
        let id = request_id.hyphenated().to_string();
        if let Ok(header) = Header::from_bytes(REQUEST_ID_HEADER.as_bytes(), id.as_bytes()) {
            res.add_header(header);
        }
        respond(self.0, res);
    }
}

fn respond<R: Read>(rq: tiny_http::Request, res: Response<R>) {
    if let Err(err) = rq.respond(res) {
        debug!(%err, "HTTP response failed");
    }
}

/// Decode a percent-encoded URL component. With `plus_as_space`, `+` decodes
/// to a space as in HTML form data.
fn decode(component: &str, plus_as_space: bool) -> Option<String> {
    let component: Cow<str> = if plus_as_space {
        Cow::Owned(component.replace('+', " "))
    } else {
        Cow::Borrowed(component)
    };
    percent_decode_str(&component)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

/// Value of the first `name` parameter in `query`
fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| decode(key, true).as_deref() == Some(name))
        .and_then(|(_, value)| decode(value, true))
}

/// The single path segment following `prefix` in `path`
fn segment_after<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

enum Route {
    Matched(RequestKind, Option<String>),
    Malformed(&'static str),
    NotFound,
}

fn route(url: &str) -> Route {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    let lookup = segment_after(path, LOOKUP_PATH).or_else(|| segment_after(path, LEGACY_LOOKUP_PATH));
    if let Some(region) = lookup {
        return match decode(region, false) {
            Some(region) => Route::Matched(RequestKind::LookupTruck, Some(region)),
            None => Route::Malformed("region is not valid UTF-8"),
        };
    }

    match path {
        "/shipping" => Route::Matched(RequestKind::Health, None),
        "/customer" => Route::Matched(RequestKind::GetCustomer, query_param(query, "customer")),
        _ => Route::NotFound,
    }
}

/// Parse the given HTTP request
///
/// If [`None`] is returned, the request was already answered with a
/// corresponding error message.
pub fn parse(rq: tiny_http::Request) -> Option<dispatch_core::Request> {
    if *rq.method() != Method::Get {
        respond(rq, Response::empty(Status::MethodNotAllowed.code()));
        return None;
    }

    let (kind, argument) = match route(rq.url()) {
        Route::Matched(kind, argument) => (kind, argument),
        Route::Malformed(msg) => {
            respond(
                rq,
                Response::from_string(msg).with_status_code(Status::BadRequest.code()),
            );
            return None;
        }
        Route::NotFound => {
            respond(
                rq,
                Response::from_string(NOT_FOUND).with_status_code(Status::NotFound.code()),
            );
            return None;
        }
    };

    let request_id = rq
        .headers()
        .iter()
        .find(|hdr| hdr.field.equiv(REQUEST_ID_HEADER))
        .and_then(|hdr| Uuid::parse_str(hdr.value.as_str()).ok())
        .unwrap_or_else(Uuid::new_v4);

    Some(dispatch_core::Request::from_raw(
        kind,
        request_id,
        argument,
        Box::new(HTTPRequest(rq)),
    ))
}
