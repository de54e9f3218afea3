//! Intent handlers shipped with netweave.

pub mod ip_link;
pub mod l2_service;

pub use ip_link::IpLinkHandler;
pub use l2_service::L2ServiceHandler;

use crate::intent::HandlerRegistry;
use std::sync::Arc;

/// Register every built-in handler with its default pools.
pub fn register_builtin(registry: &mut HandlerRegistry) {
    registry.register(Arc::new(IpLinkHandler::new()));
    registry.register(Arc::new(L2ServiceHandler::new()));
}
