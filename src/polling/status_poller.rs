//! # Status Long-Polling
//!
//! Cooperative polling: a waiting caller's future re-reads store state on
//! an interval until a change is observed or the deadline elapses. There
//! is no push subscription; every wait is bounded.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::config::ProvisorConfig;
use crate::error::{ProvisorError, Result};
use crate::models::{OrderStatus, ServiceDeployment, ServiceDeploymentState, ServiceOrder};
use crate::storage::{ServiceDeploymentStore, ServiceOrderStore};

pub struct ServiceStatusPoller {
    deployment_store: Arc<dyn ServiceDeploymentStore>,
    order_store: Arc<dyn ServiceOrderStore>,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl ServiceStatusPoller {
    pub fn new(
        deployment_store: Arc<dyn ServiceDeploymentStore>,
        order_store: Arc<dyn ServiceOrderStore>,
        config: &ProvisorConfig,
    ) -> Self {
        Self {
            deployment_store,
            order_store,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            default_timeout: Duration::from_secs(config.long_poll_timeout_secs),
        }
    }

    /// Wait until the service's deployment state differs from
    /// `last_known_state`, returning the record at that point. `None` on
    /// timeout; `None` for `last_known_state` returns the current record
    /// immediately.
    pub async fn wait_for_service_state_change(
        &self,
        service_id: Uuid,
        last_known_state: Option<ServiceDeploymentState>,
        timeout: Option<Duration>,
    ) -> Result<Option<ServiceDeployment>> {
        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        loop {
            let entity = self
                .deployment_store
                .find_by_id(service_id)
                .await?
                .ok_or(ProvisorError::ServiceDeploymentNotFound(service_id))?;
            match last_known_state {
                Some(known) if entity.service_deployment_state == known => {}
                _ => return Ok(Some(entity)),
            }
            if Instant::now() + self.poll_interval > deadline {
                debug!(service_id = %service_id, "Long poll timed out without a transition");
                return Ok(None);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Wait until the order's status differs from `last_known_status` or
    /// becomes terminal. `None` on timeout.
    pub async fn wait_for_order_status_change(
        &self,
        order_id: Uuid,
        last_known_status: Option<OrderStatus>,
        timeout: Option<Duration>,
    ) -> Result<Option<ServiceOrder>> {
        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        loop {
            let order = self
                .order_store
                .find_by_id(order_id)
                .await?
                .ok_or(ProvisorError::ServiceOrderNotFound(order_id))?;
            let changed = match last_known_status {
                Some(known) => order.order_status != known,
                None => true,
            };
            if changed || order.order_status.is_terminal() {
                return Ok(Some(order));
            }
            if Instant::now() + self.poll_interval > deadline {
                debug!(order_id = %order_id, "Long poll timed out without a transition");
                return Ok(None);
            }
            sleep(self.poll_interval).await;
        }
    }
}
