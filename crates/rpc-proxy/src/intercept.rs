//! Request/response interception pipeline
//!
//! One call of [`round_trip`] handles one inbound HTTP request:
//!
//! 1. buffer the request body and parse it into JSON-RPC calls
//! 2. forward the original bytes upstream
//! 3. if any call is `eth_getBlockByNumber`, buffer and parse the reply,
//!    rewrite null-sender transactions and re-serialize it
//! 4. otherwise stream the upstream reply back untouched

use crate::{
    error::ProxyError,
    forward::{strip_hop_by_hop, Forwarder},
    jsonrpc::{requires_block_rewrite, Envelope, JsonRpcCall, JsonRpcResponse},
    rewrite::{rewrite_block_responses, RewriteOutcome},
};
use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use tracing::{debug, info};

/// Proxies a single inbound request through the upstream node
pub async fn round_trip(forwarder: &Forwarder, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.map_err(ProxyError::ReadBody)?;

    let calls = parse_calls(&body)?;
    let url = forwarder.target_url(&parts.uri);
    for call in &calls {
        info!(
            id = ?call.id,
            method = %call.method,
            params = %call.params,
            destination = %url,
            "Proxying request"
        );
    }

    let upstream = forwarder.forward(url, &parts, body).await?;

    if requires_block_rewrite(&calls) {
        rewrite_upstream(upstream).await
    } else {
        Ok(passthrough(upstream))
    }
}

/// Parses an inbound body into the calls it carries
pub fn parse_calls(body: &[u8]) -> Result<Vec<JsonRpcCall>, ProxyError> {
    Envelope::parse(body).map(Envelope::into_vec).map_err(ProxyError::MalformedPayload)
}

/// Parses an upstream body into the responses it carries
pub fn parse_responses(body: &[u8]) -> Result<Vec<JsonRpcResponse>, ProxyError> {
    Envelope::parse(body).map(Envelope::into_vec).map_err(ProxyError::MalformedUpstreamResponse)
}

/// Applies the block rewrite to a raw upstream body
///
/// Returns the body to send back: the original bytes when any response
/// carries an error, otherwise the re-serialized responses, shaped by how
/// many there are.
pub fn rewrite_body(raw: Bytes) -> Result<Bytes, ProxyError> {
    let mut responses = parse_responses(&raw)?;

    match rewrite_block_responses(&mut responses) {
        RewriteOutcome::Aborted => {
            debug!("Upstream returned an error, leaving response untouched");
            Ok(raw)
        }
        RewriteOutcome::Rewritten(count) => {
            let body = Envelope::from_count(responses).to_vec().map_err(ProxyError::Serialize)?;
            debug!(rewritten = count, "Rewritten response: {}", String::from_utf8_lossy(&body));
            Ok(Bytes::from(body))
        }
    }
}

async fn rewrite_upstream(upstream: reqwest::Response) -> Result<Response, ProxyError> {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let raw = upstream.bytes().await.map_err(ProxyError::UpstreamUnavailable)?;
    let body = rewrite_body(raw)?;

    Ok(buffered_response(status, headers, body))
}

/// Streams the upstream reply back without reading it
fn passthrough(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Builds a response whose `Content-Length` matches `body`
///
/// Header and body are set together on a fresh response, so the length can
/// never describe a different body.
pub fn buffered_response(status: StatusCode, mut headers: HeaderMap, body: Bytes) -> Response {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const SCENARIO_RESPONSE: &str = r#"{"jsonrpc":"2.0","result":{"transactions":[{"from":"0x0","r":"0x1","s":"0x2","v":"0x3"}]},"error":null}"#;

    #[test]
    fn test_scenario_body_rewrite() {
        let body = rewrite_body(Bytes::from_static(SCENARIO_RESPONSE.as_bytes())).unwrap();

        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            r#"{"jsonrpc":"2.0","result":{"transactions":[{"from":"0x0","r":"0x0","s":"0x0","v":"0x0"}]},"error":null}"#
        );
    }

    #[test]
    fn test_single_element_batch_collapses_to_object() {
        let raw = format!("[{SCENARIO_RESPONSE}]");
        let body = rewrite_body(Bytes::from(raw)).unwrap();

        let value: Value = serde_json::from_slice(&body).unwrap();
        assert!(value.is_object());
        assert_eq!(value["result"]["transactions"][0]["v"], "0x0");
    }

    #[test]
    fn test_batch_stays_array_in_order() {
        let raw = json!([
            {"jsonrpc": "2.0", "id": 1, "result": "0x2a"},
            {"jsonrpc": "2.0", "id": 2, "result": {"transactions": [{"from": "0x1", "v": "0x2a"}]}}
        ])
        .to_string();

        let body = rewrite_body(Bytes::from(raw)).unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value[0]["id"], 1);
        assert_eq!(value[0]["result"], "0x2a");
        assert_eq!(value[1]["id"], 2);
        assert_eq!(value[1]["result"]["transactions"][0]["r"], "0x0");
    }

    #[test]
    fn test_error_returns_original_bytes() {
        let raw = Bytes::from_static(
            br#"[ {"jsonrpc":"2.0","id":1,"result":{"transactions":[{"from":"0x0","r":"0x1","s":"0x2","v":"0x3"}]}},
                  {"jsonrpc":"2.0","id":2,"error":{"code":-32000,"message":"missing trie node"}} ]"#,
        );

        let body = rewrite_body(raw.clone()).unwrap();
        assert_eq!(body, raw);
    }

    #[test]
    fn test_malformed_upstream_body_fails_closed() {
        let err = rewrite_body(Bytes::from_static(b"<html>bad gateway</html>")).unwrap_err();
        assert!(matches!(err, ProxyError::MalformedUpstreamResponse(_)));
    }

    #[test]
    fn test_malformed_request_body() {
        let err = parse_calls(b"{\"method\":").unwrap_err();
        assert!(matches!(err, ProxyError::MalformedPayload(_)));
    }

    #[test]
    fn test_empty_upstream_batch_stays_empty() {
        let body = rewrite_body(Bytes::from_static(b"[]")).unwrap();
        assert_eq!(body, Bytes::from_static(b"[]"));
    }

    #[test]
    fn test_positional_array_payloads_are_rejected() {
        let err = parse_calls(br#"[1,"2.0","eth_getBlockByNumber",[]]"#).unwrap_err();
        assert!(matches!(err, ProxyError::MalformedPayload(_)));

        let raw = br#"["2.0",null,{"transactions":[{"from":"0x0","v":"0x3"}]}]"#;
        let err = rewrite_body(Bytes::from_static(raw)).unwrap_err();
        assert!(matches!(err, ProxyError::MalformedUpstreamResponse(_)));
    }

    #[test]
    fn test_large_numbers_keep_their_precision() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{"gasLimit":123456789012345678901234567890,"transactions":[]}}"#;
        let body = rewrite_body(Bytes::from_static(raw.as_bytes())).unwrap();

        assert!(std::str::from_utf8(&body).unwrap().contains("123456789012345678901234567890"));
    }

    #[test]
    fn test_buffered_response_sets_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("999"));

        let response = buffered_response(StatusCode::OK, headers, Bytes::from_static(b"{}"));

        assert_eq!(response.headers()[CONTENT_LENGTH], "2");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
