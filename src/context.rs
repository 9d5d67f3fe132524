//! Explicit request correlation context.
//!
//! The original request id travels with every call instead of living in a
//! thread-local, so log events emitted from worker tasks still carry the
//! order and service ids they belong to.

use uuid::Uuid;

/// Correlation ids for one order-scoped unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderContext {
    pub order_id: Uuid,
    pub service_id: Uuid,
}

impl OrderContext {
    pub fn new(order_id: Uuid, service_id: Uuid) -> Self {
        Self {
            order_id,
            service_id,
        }
    }

    /// A tracing span carrying the correlation ids as structured fields.
    pub fn span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "order",
            operation = operation,
            order_id = %self.order_id,
            service_id = %self.service_id
        )
    }
}
