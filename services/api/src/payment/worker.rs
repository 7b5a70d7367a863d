//! Payment reconciliation
//!
//! A producer wakes up every `interval`, loads the orders still
//! `in_process` and feeds them into a bounded queue drained by a fixed pool
//! of workers. Each worker asks the provider how the payment ended and
//! resolves the order. Cancelling the token stops the producer, which closes
//! the queue; workers finish what is queued and exit.

use common::proto::OrderStatus;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{PaymentError, provider::PaymentProvider};
use crate::{models::payment::Order, repositories::OrderRepository};

pub const WORKERS: usize = 5;
pub const QUEUE_CAPACITY: usize = 25;

/// What processing one order did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The provider has no verdict yet
    Pending,
    /// The order moved to this terminal status
    Resolved(OrderStatus),
    /// Another run already resolved the order
    AlreadyResolved,
}

type Queue = Arc<Mutex<mpsc::Receiver<Order>>>;

pub struct PaymentWorker {
    orders: Arc<dyn OrderRepository>,
    provider: Arc<dyn PaymentProvider>,
    interval: Duration,
    promotion: Duration,
}

impl PaymentWorker {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        provider: Arc<dyn PaymentProvider>,
        interval: Duration,
        promotion: Duration,
    ) -> Self {
        Self {
            orders,
            provider,
            interval,
            promotion,
        }
    }

    /// Run until `shutdown` is cancelled and the queue is drained
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let (tx, rx) = mpsc::channel::<Order>(QUEUE_CAPACITY);
        let queue: Queue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker in 0..WORKERS {
            let this = self.clone();
            let queue = queue.clone();
            workers.spawn(async move { this.consume(worker, queue).await });
        }
        info!(workers = WORKERS, interval = ?self.interval, "Payment worker started");

        self.produce(tx, shutdown).await;

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Payment worker task failed: {}", e);
            }
        }
        info!("Payment worker stopped");
    }

    /// Owns the sending half; returning drops it and closes the queue
    async fn produce(&self, tx: mpsc::Sender<Order>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let pending = match self.orders.in_process().await {
                Ok(pending) => pending,
                Err(e) => {
                    error!("Failed to load open orders: {}", e);
                    continue;
                }
            };
            debug!(count = pending.len(), "Enqueueing open orders");

            for order in pending {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    sent = tx.send(order) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn consume(&self, worker: usize, queue: Queue) {
        loop {
            let next = queue.lock().await.recv().await;
            let Some(order) = next else {
                debug!(worker, "Queue closed");
                return;
            };

            let span = info_span!("payment", order_id = %order.id, worker);
            match self.process(&order).instrument(span).await {
                Ok(outcome) => debug!(order_id = %order.id, ?outcome, "Order processed"),
                Err(e) => warn!(order_id = %order.id, "Order left for the next tick: {}", e),
            }
        }
    }

    /// Ask the provider about one order and resolve it. Safe to repeat: an
    /// order that is no longer `in_process` is never touched again.
    pub async fn process(&self, order: &Order) -> Result<Outcome, PaymentError> {
        let state = self.provider.payment_state(&order.payment_id).await?;

        let status = match state.status.as_str() {
            "succeeded" => OrderStatus::Completed,
            "canceled" => OrderStatus::Canceled,
            other => {
                debug!(status = other, "Payment not settled yet");
                return Ok(Outcome::Pending);
            }
        };

        // Promotion follows the order row; the reported item id is only cross-checked
        match state.item_id {
            Some(item_id) if item_id != order.advert_id => warn!(
                advert_id = %order.advert_id,
                reported = %item_id,
                "Provider reported a different advert, promoting the ordered one"
            ),
            None => debug!("Provider answer carries no metadata.item_id"),
            _ => {}
        }

        let promote = match status {
            OrderStatus::Completed => Some((order.advert_id, self.promotion)),
            _ => None,
        };

        if self.orders.finish(order.id, status, promote).await? {
            info!(status = %status, "Order resolved");
            Ok(Outcome::Resolved(status))
        } else {
            Ok(Outcome::AlreadyResolved)
        }
    }
}
