//! Session acquisition and caching.
//!
//! [`CachedSessionRegistry`] turns `(application, chain, height)` into a [`Session`] whose
//! nodes are wrapped as [`QosNode`](crate::qos::node::QosNode)s, and maintains the
//! `(chain, session height)` node cache read by the node selector and the QoS checks.
//! Two background loops keep it fresh: the primer dispatches every application's
//! sessions as soon as a new session height begins, and the sweeper evicts expired
//! entries.

pub mod errors;
pub mod registry;

pub use errors::SessionError;
pub use registry::{
    latest_session_height, CachedSessionRegistry, NodeList, Session, SessionChainKey,
    SessionRegistryService,
};
