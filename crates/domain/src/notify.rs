//! Notifier port for order events, with a logging and an in-memory
//! implementation.
//!
//! Notifications go out after the order write has committed. A failed
//! notification is logged and never undoes the write.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::OwnerId;
use thiserror::Error;

use crate::money::Money;
use crate::order::OrderStatus;

/// An order event worth telling someone about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderNotification {
    Placed {
        order_id: String,
        owner_id: OwnerId,
        email: String,
        total: Money,
    },
    StatusChanged {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl OrderNotification {
    pub fn order_id(&self) -> &str {
        match self {
            OrderNotification::Placed { order_id, .. }
            | OrderNotification::StatusChanged { order_id, .. } => order_id,
        }
    }
}

#[derive(Debug, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers order notifications (email, webhooks, ...).
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify(&self, notification: OrderNotification) -> Result<(), NotifyError>;
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl OrderNotifier for LoggingNotifier {
    async fn notify(&self, notification: OrderNotification) -> Result<(), NotifyError> {
        match &notification {
            OrderNotification::Placed {
                order_id, total, ..
            } => tracing::info!(order_id, total = %total, "order placed notification"),
            OrderNotification::StatusChanged { order_id, from, to } => {
                tracing::info!(order_id, from = %from, to = %to, "order status notification")
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<OrderNotification>,
    fail: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following delivery fail.
    pub fn set_fail(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail = fail;
    }

    /// Notifications delivered so far, oldest first.
    pub fn sent(&self) -> Vec<OrderNotification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl OrderNotifier for InMemoryNotifier {
    async fn notify(&self, notification: OrderNotification) -> Result<(), NotifyError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(NotifyError(format!(
                "mailer unavailable for {}",
                notification.order_id()
            )));
        }
        state.sent.push(notification);
        Ok(())
    }
}
