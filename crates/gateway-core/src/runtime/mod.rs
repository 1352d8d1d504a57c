//! Gateway runtime initialization and lifecycle management.
//!
//! Wires metrics, registries, the session registry, the node selector and the relayer
//! together, and owns the background loops that keep node state fresh: the session
//! primer, the cache sweeper and the QoS check scheduler. All loops listen on one
//! broadcast channel and stop on [`GatewayRuntime::shutdown`].
//!
//! # Examples
//!
//! ```no_run
//! use gateway_core::{config::AppConfig, runtime::GatewayRuntime, types::{Payload, RelayRequest}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let runtime = GatewayRuntime::builder().with_config(config).build()?;
//!
//!     let request = RelayRequest::new("0021", Payload::post(r#"{"jsonrpc":"2.0","method":"eth_chainId","id":1}"#, ""));
//!     let response = runtime.relayer().send_relay(request).await?;
//!     println!("{}", response.response);
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod components;
pub mod lifecycle;

pub use builder::{GatewayRuntimeBuilder, RuntimeError};
pub use components::GatewayComponents;
pub use lifecycle::GatewayRuntime;
