// Telos RPC Proxy - signature-normalizing JSON-RPC reverse proxy
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Telos RPC Proxy Server Library
//!
//! A reverse proxy that sits in front of a single EVM JSON-RPC node. Requests
//! are forwarded byte for byte; replies to `eth_getBlockByNumber` batches have
//! the signature fields of null-sender transactions zeroed so that standard
//! Ethereum clients accept the blocks.

pub mod error;
pub mod forward;
pub mod intercept;
pub mod jsonrpc;
pub mod proxy;
pub mod rewrite;

pub use error::ProxyError;
pub use jsonrpc::{Envelope, JsonRpcCall, JsonRpcResponse};
pub use proxy::{ProxyServer, ProxyServerBuilder};
