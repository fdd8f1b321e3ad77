//! JSON-RPC payload types and envelope handling
//!
//! Payloads on the wire are either a single JSON object or an array of them.
//! [`Envelope`] models that choice explicitly; callers collapse it into a
//! plain sequence right after parsing.

use serde::{
    de::{self, DeserializeOwned},
    Deserialize, Serialize,
};
use serde_json::Value;

/// The only method whose responses are inspected and rewritten
pub const GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";

/// A single JSON-RPC invocation as seen by the proxy
///
/// Only read for routing decisions and logging, never re-serialized: the
/// original request bytes are what gets forwarded upstream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcCall {
    /// Request id; `None` when absent or null
    #[serde(default)]
    pub id: Option<i64>,
    /// Protocol version string
    #[serde(default)]
    pub jsonrpc: String,
    /// Method name
    #[serde(default)]
    pub method: String,
    /// Method parameters, of any shape
    #[serde(default)]
    pub params: Value,
}

/// A single JSON-RPC reply from the upstream node
///
/// `result` and `error` are always written back out, as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version string
    #[serde(default)]
    pub jsonrpc: String,
    /// Request id echoed by the upstream, carried through when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Successful result payload
    #[serde(default)]
    pub result: Option<Value>,
    /// Protocol-level error payload
    #[serde(default)]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    /// Whether the upstream reported a protocol-level error for this call
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Wire shape of a JSON-RPC payload
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// A bare JSON object
    Single(T),
    /// A JSON array of objects
    Batch(Vec<T>),
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Parses `body` as a single object, falling back to an array of objects
    ///
    /// Only JSON objects are accepted as items. Derived structs would otherwise
    /// also take a JSON array as positional fields, turning `[]` into one
    /// defaulted item instead of an empty batch.
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        match serde_json::from_slice::<Value>(body)? {
            Value::Array(items) => items
                .into_iter()
                .map(item_from_object)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Batch),
            value => item_from_object(value).map(Self::Single),
        }
    }
}

/// Deserializes one payload item, rejecting anything but a JSON object
fn item_from_object<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    let kind = match &value {
        Value::Object(_) => return serde_json::from_value(value),
        Value::Array(_) => "an array",
        Value::String(_) => "a string",
        Value::Number(_) => "a number",
        Value::Bool(_) => "a boolean",
        Value::Null => "null",
    };
    Err(de::Error::custom(format_args!("expected a JSON-RPC object, found {kind}")))
}

impl<T> Envelope<T> {
    /// Collapses the envelope into an ordered sequence
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(item) => vec![item],
            Self::Batch(items) => items,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    /// Picks the output shape from the number of items alone
    ///
    /// Exactly one item is written as a bare object; anything else, including
    /// an empty sequence, is written as an array.
    pub fn from_count(mut items: Vec<T>) -> Self {
        if items.len() == 1 {
            if let Some(item) = items.pop() {
                return Self::Single(item);
            }
        }
        Self::Batch(items)
    }

    /// Serializes the envelope in its current shape
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Single(item) => serde_json::to_vec(item),
            Self::Batch(items) => serde_json::to_vec(items),
        }
    }
}

/// Returns true when any call in the batch asks for a block by number
pub fn requires_block_rewrite(calls: &[JsonRpcCall]) -> bool {
    calls.iter().any(|call| call.method == GET_BLOCK_BY_NUMBER)
}
