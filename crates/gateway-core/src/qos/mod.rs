//! Quality of service for session nodes.
//!
//! # Node state
//!
//! Every dispatched servicer is wrapped in a [`QosNode`](node::QosNode) holding its
//! timeout, sync flag, check timestamps and a latency histogram. A node is healthy when it
//! is synced and not in timeout.
//!
//! # Punishment
//!
//! [`NodePunisher`](punish::NodePunisher) classifies relay errors through a versioned
//! [`ErrorClassifier`](punish::ErrorClassifier): kickable errors bench a node for the rest
//! of its session, transient ones for a few seconds, and unknown errors are only logged.
//!
//! # Checks
//!
//! The [`NodeSelector`](selector::NodeSelector) scheduler runs height and data-integrity
//! [`checks`] for each chain family against every cached node list, and serves
//! [`find_node`](selector::NodeSelectorService::find_node) from the resulting health.

pub mod checks;
pub mod family;
pub mod fanout;
pub mod latency;
pub mod node;
pub mod punish;
pub mod selector;

pub use checks::{default_jobs, CheckContext, CheckJob, CheckSettings};
pub use family::{ChainFamilies, ChainFamily, ChainNetwork};
pub use node::{PublicQosNode, QosNode, TimeoutReason};
pub use punish::{ErrorBucket, ErrorClassifier, NodePunisher, Penalties};
pub use selector::{select_node, NodeSelector, NodeSelectorService};
