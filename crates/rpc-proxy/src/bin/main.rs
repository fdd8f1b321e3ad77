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

//! Telos RPC Proxy Server
//!
//! Forwards JSON-RPC traffic to an upstream EVM node and normalizes the
//! signatures of null-sender transactions in `eth_getBlockByNumber` replies.

use clap::Parser;
use eyre::Result;
use std::{net::IpAddr, net::SocketAddr, str::FromStr};
use telos_proxy_utils::init_logging;
use telos_rpc_proxy::proxy::ProxyServerBuilder;
use tokio::net::TcpListener;
use tracing::info;

/// Telos RPC Proxy Server
#[derive(Parser, Debug)]
#[command(name = "telos-rpc-proxy")]
#[command(about = "JSON-RPC reverse proxy normalizing null-sender transaction signatures")]
#[command(version)]
struct Args {
    /// Upstream RPC URL
    /// Example: `https://rpc.telos.net/evm`
    rpc_url: String,

    /// Port to listen on
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Verbosity level (repeat for more: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set RUST_LOG based on verbosity
    if std::env::var("RUST_LOG").is_err() {
        let level = match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    init_logging("telos-rpc-proxy", true)?;

    let proxy = ProxyServerBuilder::new().upstream_url(args.rpc_url).build()?;

    let ip = IpAddr::from_str(&args.host)?;
    let addr = SocketAddr::from((ip, args.port));
    let listener = TcpListener::bind(addr).await?;

    proxy
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await
}
