//! # Gateway Core
//!
//! Core library for a POKT relay gateway: it forwards client RPC calls for a chain to one
//! of the untrusted servicer nodes of a dispatched session, keeps a live picture of which
//! of those nodes are usable, and falls back to a trusted altruist endpoint when none is.
//!
//! - **[`session`]**: Session dispatch and caching, with a primer that warms every
//!   application's sessions as soon as a new session height begins.
//!
//! - **[`qos`]**: Per-node health state, error classification and punishment, and the
//!   background height and data-integrity checks that drive node selection.
//!
//! - **[`relayer`]**: Routes a relay to a healthy node and falls back to the altruist.
//!
//! - **[`pocket`]**: Collaborator traits for the network and an HTTP client implementing
//!   them against a full node.
//!
//! - **[`registry`]**: Configured applications and per-chain settings.
//!
//! - **[`metrics`]**: Prometheus metrics collection.
//!
//! - **[`runtime`]**: Component wiring and background task lifecycle.
//!
//! ## Request Flow
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌──────────────┐
//! │   Relayer    │
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐      none healthy
//! │ NodeSelector │ ─────────────────────────┐
//! │  find_node   │                          │
//! └──────┬───────┘                          │
//!        │ newest session, random node      │
//!        ▼                                  │
//! ┌──────────────┐      error               │
//! │ PocketRelayer│ ──► punish node ──┐      │
//! └──────┬───────┘                   ▼      ▼
//!        │ ok                   ┌──────────────┐
//!        ▼                      │   Altruist   │
//!   Response to Client ◄─────── └──────────────┘
//! ```
//!
//! ## Background Loops
//!
//! ```text
//! session primer ──► CachedSessionRegistry ──► (chain, session height) node cache
//!                                                        │
//! qos scheduler ──► height / data integrity checks ──────┘ (mutate node health)
//! cache sweeper ──► evicts expired sessions and node lists
//! ```

pub mod config;
pub mod metrics;
pub mod pocket;
pub mod qos;
pub mod registry;
pub mod relayer;
pub mod runtime;
pub mod session;
pub mod types;
