//! Caller-facing handle to a running job queue.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use queue_core::{
    DequeuePolicy, EnqueueError, JobItem, JobSeq, QueueConfig, QueueEvent, QueueId, QueueInfo,
    QueueStats, QueuedJob,
};
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::sync::broadcast;

use crate::messages::{QueueError, QueueMessage};
use crate::queue_actor::{QueueActor, QueueActorState};

/// Handle to a bounded job queue.
///
/// The queue keeps `root` alive until [`JobQueue::close`] has drained every
/// admitted job. Dropping the handle stops the queue actor.
pub struct JobQueue {
    id: QueueId,
    name: String,
    actor: ActorRef<QueueMessage>,
    event_tx: broadcast::Sender<QueueEvent>,
    closed: AtomicBool,
}

impl JobQueue {
    /// Start a queue using the dequeue order from `config`.
    pub async fn start<R>(config: QueueConfig, root: Arc<R>) -> Result<Self, QueueError>
    where
        R: Any + Send + Sync,
    {
        let policy = config.dequeue_order.policy();
        Self::start_with_policy(config, root, policy).await
    }

    /// Start a queue with a custom dequeue policy.
    pub async fn start_with_policy<R>(
        config: QueueConfig,
        root: Arc<R>,
        policy: Arc<dyn DequeuePolicy>,
    ) -> Result<Self, QueueError>
    where
        R: Any + Send + Sync,
    {
        config.validate()?;

        let id = QueueId::new();
        let name = config.name.clone();
        let (event_tx, _) = broadcast::channel(1024);
        let state = QueueActorState::new(id, config, policy, root, event_tx.clone());

        let (actor, _handle) = Actor::spawn(Some(format!("queue-{}", id)), QueueActor, state)
            .await
            .map_err(|e| QueueError::Spawn(e.to_string()))?;

        Ok(Self {
            id,
            name,
            actor,
            event_tx,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit a job.
    ///
    /// Fails with `ObjectClosed` once closing started, without notifying
    /// the job. Fails with `QueueFull` when admission would exceed
    /// `max_queue_size`, after calling the job's `on_enqueue_failed`.
    pub async fn enqueue<J: JobItem>(&self, item: J) -> Result<JobSeq, EnqueueError> {
        self.enqueue_boxed(Box::new(item)).await
    }

    /// Submit an already boxed job.
    pub async fn enqueue_boxed(&self, item: Box<dyn JobItem>) -> Result<JobSeq, EnqueueError> {
        let job = Box::new(QueuedJob::new(item));
        let (tx, rx) = ractor::concurrency::oneshot();
        if self
            .actor
            .send_message(QueueMessage::Enqueue {
                job,
                reply: tx.into(),
            })
            .is_err()
        {
            return Err(EnqueueError::ObjectClosed);
        }

        match rx.await {
            Ok(Ok(seq)) => Ok(seq),
            Ok(Err(rejection)) => {
                let reason = rejection.reason;
                rejection.job.reject(reason);
                Err(reason)
            }
            Err(_) => Err(EnqueueError::ObjectClosed),
        }
    }

    /// Stop admitting jobs and wait until every admitted job is done.
    ///
    /// Releases the root once drained. Calling it again returns at once.
    pub async fn close(&self) -> Result<(), QueueError> {
        tracing::info!("Closing queue {}", self.name);
        self.call(|reply| QueueMessage::Close { reply }).await?;
        self.closed.store(true, Ordering::Release);
        tracing::info!("Queue {} closed", self.name);
        Ok(())
    }

    /// Snapshot of limits and counters.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.call(|reply| QueueMessage::GetStats { reply }).await
    }

    /// Queue metadata.
    pub async fn info(&self) -> Result<QueueInfo, QueueError> {
        self.call(|reply| QueueMessage::GetInfo { reply }).await
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    async fn call<T, F>(&self, message: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(RpcReplyPort<T>) -> QueueMessage,
    {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(message(tx.into()))
            .map_err(|e| QueueError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|_| QueueError::Unavailable(format!("queue {} dropped the reply", self.name)))
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            tracing::warn!("Queue {} dropped without close", self.name);
        }
        self.actor.stop(None);
    }
}
