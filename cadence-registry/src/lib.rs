//! CADENCE Registry - Capability Discovery and Routing
//!
//! The capability registry is built once at process start from static agent
//! descriptors and is read-only afterwards, so it can be shared freely with
//! no locking. The router enforces the directional permission edges it
//! declares and resolves agents to task-scoped workers.

pub mod registry;
pub mod router;

pub use registry::CapabilityRegistry;
pub use router::{DispatchOutcome, Router, DEFAULT_DISPATCH_TIMEOUT};
