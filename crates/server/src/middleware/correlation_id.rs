//! Request ids for relay tracing.
//!
//! Every request gets an `x-request-id`, either the one the client sent or a fresh UUID v4,
//! and the same value is echoed on the response. Relay handlers log it next to the chain id
//! so a client report can be matched to the node or altruist that served it.

use axum::http::{header::HeaderValue, HeaderMap, HeaderName, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone, Copy, Default)]
pub struct RelayRequestIdGenerator;

impl MakeRequestId for RelayRequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).ok()?))
    }
}

/// Returns the set and propagate layers. Apply propagate first so it wraps set:
///
/// ```ignore
/// let (set_layer, propagate_layer) = create_request_id_layers();
/// router.layer(propagate_layer).layer(set_layer)
/// ```
#[must_use]
pub fn create_request_id_layers(
) -> (SetRequestIdLayer<RelayRequestIdGenerator>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(X_REQUEST_ID.clone(), RelayRequestIdGenerator),
        PropagateRequestIdLayer::new(X_REQUEST_ID.clone()),
    )
}

/// The request id carried in `headers`, or `"-"` when absent or not valid UTF-8.
#[must_use]
pub fn request_id(headers: &HeaderMap) -> &str {
    headers.get(&X_REQUEST_ID).and_then(|v| v.to_str().ok()).unwrap_or("-")
}
