//! Block transaction rewriting
//!
//! Some transactions served by the upstream node carry a null sender and
//! signature values that clients reject. For block responses the proxy zeroes
//! the `r`, `s` and `v` fields of such transactions before handing the block
//! back to the caller.

use crate::jsonrpc::JsonRpcResponse;
use serde_json::{Map, Value};
use tracing::info;

/// Sender value used for null-sender transactions
const NULL_SENDER_SHORT: &str = "0x0";
/// Fully padded null address
const NULL_SENDER_FULL: &str = "0x0000000000000000000000000000000000000000";
/// `v` of 42, seen on transactions with a stripped signature
const STRIPPED_SIGNATURE_V: &str = "0x2a";
/// Replacement for every signature component
const ZERO: &str = "0x0";

/// Outcome of a rewrite pass over a set of responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Every response was inspected; carries the number of rewritten transactions
    Rewritten(usize),
    /// A response carried a protocol-level error and rewriting was abandoned
    Aborted,
}

/// Rewrites every block response in place
///
/// Responses are visited in order. The first one carrying an `error` aborts
/// the pass and [`RewriteOutcome::Aborted`] is returned; the caller must then
/// discard `responses` and return the upstream body as received, since
/// responses visited before the error may already be modified.
pub fn rewrite_block_responses(responses: &mut [JsonRpcResponse]) -> RewriteOutcome {
    let mut rewritten = 0;

    for response in responses.iter_mut() {
        if response.is_error() {
            return RewriteOutcome::Aborted;
        }

        if let Some(transactions) = response.result.as_mut().and_then(block_transactions) {
            rewritten += rewrite_transactions(transactions);
        }
    }

    RewriteOutcome::Rewritten(rewritten)
}

/// Returns the `transactions` list of a block result, if it has one
fn block_transactions(result: &mut Value) -> Option<&mut Vec<Value>> {
    result.as_object_mut()?.get_mut("transactions")?.as_array_mut()
}

/// Zeroes the signature of every null-sender transaction, returning how many matched
///
/// Entries that are not objects (e.g. hashes when full transactions were not
/// requested) are left alone.
pub fn rewrite_transactions(transactions: &mut [Value]) -> usize {
    let mut rewritten = 0;

    for tx in transactions.iter_mut().filter_map(Value::as_object_mut) {
        if !is_null_sender(tx) {
            continue;
        }

        let hash = tx.get("hash").and_then(|hash| hash.as_str()).unwrap_or_default();
        info!(hash, "Found a transaction with a null sender, setting r, s, v to 0x0");
        for field in ["r", "s", "v"] {
            tx.insert(field.to_string(), Value::String(ZERO.to_string()));
        }
        rewritten += 1;
    }

    rewritten
}

/// Null-sender heuristic
///
/// Compares the hex strings literally: `"0x00"` or a numeric `0` do not match.
pub fn is_null_sender(tx: &Map<String, Value>) -> bool {
    let field = |name: &str| tx.get(name).and_then(Value::as_str);

    matches!(field("from"), Some(NULL_SENDER_SHORT | NULL_SENDER_FULL))
        || field("v") == Some(STRIPPED_SIGNATURE_V)
}
