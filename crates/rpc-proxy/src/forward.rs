//! Upstream transport
//!
//! Sends the captured request bytes to the configured node. Nothing here
//! looks at or changes the JSON-RPC payload.

use crate::error::ProxyError;
use axum::{
    body::Bytes,
    http::{
        header::{CONNECTION, CONTENT_LENGTH, HOST},
        request::Parts,
        HeaderMap, HeaderName, HeaderValue, Uri,
    },
};
use eyre::Result;
use reqwest::{redirect::Policy, Url};
use tracing::debug;

/// Headers that only apply to a single connection and are never forwarded
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards raw requests to a single upstream origin
///
/// Owns the HTTP client and its connection pool. No retries and no timeouts
/// beyond the client defaults: a failure is reported as-is.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    upstream: Url,
}

impl Forwarder {
    /// Creates a forwarder for the given upstream URL
    ///
    /// Redirects are not followed; a redirect from the upstream is handed back
    /// to the caller like any other response.
    pub fn new(upstream: Url) -> Result<Self> {
        let client = reqwest::Client::builder().redirect(Policy::none()).build()?;

        Ok(Self { client, upstream })
    }

    /// Returns the configured upstream URL
    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Maps an inbound request URI onto the upstream
    ///
    /// The inbound path is appended to the upstream path with a single slash
    /// between them, and both query strings are kept.
    pub fn target_url(&self, uri: &Uri) -> Url {
        let mut url = self.upstream.clone();
        url.set_path(&join_paths(self.upstream.path(), uri.path()));
        url.set_query(join_queries(self.upstream.query(), uri.query()).as_deref());
        url
    }

    /// Sends `body` unchanged to `url` with the inbound method and headers
    ///
    /// # Arguments
    /// * `url` - Target computed by [`Forwarder::target_url`]
    /// * `parts` - Head of the inbound request
    /// * `body` - The inbound body exactly as it was received
    ///
    /// # Returns
    /// The upstream response with its body not yet read
    pub async fn forward(
        &self,
        url: Url,
        parts: &Parts,
        body: Bytes,
    ) -> Result<reqwest::Response, ProxyError> {
        let headers = outbound_headers(&parts.headers, &parts.uri);

        debug!("Forwarding {} {} ({} bytes)", parts.method, url, body.len());

        self.client
            .request(parts.method.clone(), url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(ProxyError::UpstreamUnavailable)
    }
}

/// Builds the header set sent upstream
///
/// `Host` keeps the value the caller used. `Content-Length` is left to the
/// client since it is derived from the forwarded bytes.
fn outbound_headers(inbound: &HeaderMap, uri: &Uri) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(CONTENT_LENGTH);

    if !headers.contains_key(HOST) {
        if let Some(host) =
            uri.authority().and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
        {
            headers.insert(HOST, host);
        }
    }

    headers
}

/// Removes hop-by-hop headers, including any listed in `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

fn join_queries(base: Option<&str>, query: Option<&str>) -> Option<String> {
    match (base.filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
        (Some(base), Some(query)) => Some(format!("{base}&{query}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(upstream: &str) -> Forwarder {
        Forwarder::new(Url::parse(upstream).unwrap()).unwrap()
    }

    #[test]
    fn test_target_url_root_upstream() {
        let fwd = forwarder("https://rpc.telos.net");

        assert_eq!(fwd.target_url(&Uri::from_static("/")).as_str(), "https://rpc.telos.net/");
        assert_eq!(
            fwd.target_url(&Uri::from_static("/evm?x=1")).as_str(),
            "https://rpc.telos.net/evm?x=1"
        );
    }

    #[test]
    fn test_target_url_joins_paths_with_one_slash() {
        let fwd = forwarder("http://node:7000/evm/");
        assert_eq!(fwd.target_url(&Uri::from_static("/v1")).as_str(), "http://node:7000/evm/v1");

        let fwd = forwarder("http://node:7000/evm");
        assert_eq!(fwd.target_url(&Uri::from_static("/v1")).as_str(), "http://node:7000/evm/v1");
        assert_eq!(fwd.target_url(&Uri::from_static("/")).as_str(), "http://node:7000/evm/");
    }

    #[test]
    fn test_target_url_merges_queries() {
        let fwd = forwarder("http://node/rpc?key=abc");

        assert_eq!(
            fwd.target_url(&Uri::from_static("/?trace=1")).as_str(),
            "http://node/rpc/?key=abc&trace=1"
        );
        assert_eq!(fwd.target_url(&Uri::from_static("/")).as_str(), "http://node/rpc/?key=abc");
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("/a/", "/b"), "/a/b");
        assert_eq!(join_paths("/a", "b"), "/a/b");
        assert_eq!(join_paths("/a", "/b"), "/a/b");
    }

    #[test]
    fn test_strip_hop_by_hop_honors_connection_list() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers["content-type"], "application/json");
    }

    #[test]
    fn test_outbound_headers_keep_caller_host() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("proxy.example:8545"));
        inbound.insert(CONTENT_LENGTH, HeaderValue::from_static("10"));

        let headers = outbound_headers(&inbound, &Uri::from_static("/"));

        assert_eq!(headers[HOST], "proxy.example:8545");
        assert!(!headers.contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn test_outbound_headers_fall_back_to_uri_authority() {
        let headers =
            outbound_headers(&HeaderMap::new(), &Uri::from_static("http://caller.example/"));

        assert_eq!(headers[HOST], "caller.example");
    }
}
