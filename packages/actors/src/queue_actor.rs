//! Queue actor owning the scheduling state of a single queue.
//!
//! The actor's mailbox is the queue-wide lock: every message is one state
//! transition on [`SchedulerState`]. Job routines never run here. Workers
//! run start/finish, timeout hooks go to the blocking pool, and the
//! enqueue-failure hook runs in the caller.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use queue_core::{
    DequeuePolicy, EnqueueError, QueueConfig, QueueEvent, QueueId, QueueInfo, QueueState,
    QueuedJob, SchedulerState, Work,
};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort, SupervisionEvent};
use tokio::sync::broadcast;

use crate::messages::QueueMessage;
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Owner object kept alive until the queue has drained.
pub type Root = Arc<dyn Any + Send + Sync>;

/// State for the queue actor.
pub struct QueueActorState {
    id: QueueId,
    config: QueueConfig,
    created_at: DateTime<Utc>,
    scheduler: SchedulerState,
    /// Released in the transition that observes the drain after close.
    root: Option<Root>,
    close_waiters: Vec<RpcReplyPort<()>>,
    event_tx: broadcast::Sender<QueueEvent>,
    /// Worker counter for unique IDs.
    worker_counter: u64,
}

impl QueueActorState {
    /// Create a new queue actor state.
    pub fn new(
        id: QueueId,
        config: QueueConfig,
        policy: Arc<dyn DequeuePolicy>,
        root: Root,
        event_tx: broadcast::Sender<QueueEvent>,
    ) -> Self {
        let scheduler = SchedulerState::new(&config, policy);
        Self {
            id,
            config,
            created_at: Utc::now(),
            scheduler,
            root: Some(root),
            close_waiters: Vec::new(),
            event_tx,
            worker_counter: 0,
        }
    }

    /// Broadcast an event.
    fn broadcast(&self, event: QueueEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("{}-worker-{}", self.config.name, self.worker_counter)
    }

    fn info(&self) -> QueueInfo {
        QueueInfo {
            id: self.id,
            name: self.config.name.clone(),
            state: self.scheduler.state(),
            config: self.config.clone(),
            dequeue_policy: self.scheduler.policy_name().to_string(),
            created_at: self.created_at,
        }
    }

    fn state_changed(&self, old_state: QueueState, new_state: QueueState) {
        if old_state == new_state {
            return;
        }
        tracing::info!(
            "Queue {} ({}): {} -> {}",
            self.config.name,
            self.id,
            old_state,
            new_state
        );
        self.broadcast(QueueEvent::QueueStateChanged {
            queue_id: self.id,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    /// Finish a pending close if the last outstanding job just left.
    fn check_drained(&mut self) {
        if !self.scheduler.try_finish_close() {
            return;
        }
        self.state_changed(QueueState::Closing, QueueState::Closed);
        self.on_closed();
    }

    fn on_closed(&mut self) {
        // Nothing references the root anymore.
        self.root = None;
        for reply in self.close_waiters.drain(..) {
            let _ = reply.send(());
        }
    }

    /// Run the timeout hooks of evicted jobs off the actor.
    fn evict(&self, myself: &ActorRef<QueueMessage>, expired: Vec<QueuedJob>) {
        for job in expired {
            let seq = job.seq();
            tracing::debug!(
                "Job {} ({}) timed out in queue {}",
                seq,
                job.desc(),
                self.config.name
            );
            self.broadcast(QueueEvent::JobTimedOut {
                queue_id: self.id,
                seq,
                timestamp: Utc::now(),
            });

            let queue = myself.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::task::spawn_blocking(move || job.time_out()).await {
                    tracing::error!("Timeout hook of job {} panicked: {}", seq, e);
                }
                if queue
                    .send_message(QueueMessage::TimeoutHandled { seq })
                    .is_err()
                {
                    tracing::warn!("Queue gone before timeout of job {} was handled", seq);
                }
            });
        }
    }

    /// Spawn a worker into a slot already claimed on the scheduler.
    async fn spawn_worker(&mut self, myself: &ActorRef<QueueMessage>) {
        let worker_id = self.next_worker_id();
        let args = WorkerArgs {
            worker_id: worker_id.clone(),
            queue: myself.clone(),
            trace: self.config.trace_processing_threads,
        };

        match Actor::spawn_linked(None, WorkerActor, args, myself.get_cell()).await {
            Ok(_) => {
                if self.config.trace_processing_threads {
                    tracing::debug!("Spawned worker {}", worker_id);
                }
                self.broadcast(QueueEvent::WorkerStarted {
                    queue_id: self.id,
                    worker_id,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                // The slot is reclaimed on the next tick.
                tracing::warn!("Failed to spawn worker {}: {}", worker_id, e);
                self.scheduler.release_worker();
            }
        }
    }
}

/// Queue actor that manages a single queue.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorState;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting queue {} ({}): max_threads={}, max_queue_size={}, max_parallel={}, policy={}",
            args.config.name,
            args.id,
            args.config.max_threads,
            args.config.max_queue_size,
            args.config.max_parallel_pending_work_count,
            args.scheduler.policy_name()
        );

        // Deadline sweep runs even while every worker is busy or gone
        let myself_clone = myself.clone();
        let sweep_interval = args.config.sweep_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                interval.tick().await;
                if myself_clone.send_message(QueueMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(args)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { job, reply } => {
                match state.scheduler.admit(*job, Instant::now()) {
                    Ok(admitted) => {
                        tracing::debug!("Job {} enqueued in {}", admitted.seq, state.config.name);
                        state.broadcast(QueueEvent::JobEnqueued {
                            queue_id: state.id,
                            seq: admitted.seq,
                            timestamp: Utc::now(),
                        });
                        let _ = reply.send(Ok(admitted.seq));

                        if admitted.wake_worker {
                            state.spawn_worker(&myself).await;
                        }
                    }
                    Err(rejection) => {
                        let seq = rejection.job.seq();
                        if rejection.reason == EnqueueError::QueueFull {
                            tracing::debug!(
                                "Queue {} full, rejected job {}",
                                state.config.name,
                                seq
                            );
                            state.broadcast(QueueEvent::JobRejected {
                                queue_id: state.id,
                                seq,
                                reason: rejection.reason,
                                timestamp: Utc::now(),
                            });
                        }
                        let _ = reply.send(Err(rejection));
                    }
                }
            }

            QueueMessage::NextWork { worker_id, reply } => {
                let step = state.scheduler.next_work(Instant::now());
                state.evict(&myself, step.expired);

                let handed_job = match &step.work {
                    Work::Start(job) => {
                        if state.config.trace_processing_threads {
                            tracing::debug!("Worker {} starting job {}", worker_id, job.seq());
                        }
                        state.broadcast(QueueEvent::JobStarted {
                            queue_id: state.id,
                            seq: job.seq(),
                            worker_id: worker_id.clone(),
                            timestamp: Utc::now(),
                        });
                        true
                    }
                    Work::Finish(job) => {
                        if state.config.trace_processing_threads {
                            tracing::debug!("Worker {} finishing job {}", worker_id, job.seq());
                        }
                        true
                    }
                    Work::Exit => {
                        if state.config.trace_processing_threads {
                            tracing::debug!("Worker {} has no work, exiting", worker_id);
                        }
                        state.broadcast(QueueEvent::WorkerExited {
                            queue_id: state.id,
                            worker_id: worker_id.clone(),
                            timestamp: Utc::now(),
                        });
                        false
                    }
                };

                if reply.send(step.work).is_err() && handed_job {
                    // The worker vanished while waiting; its job goes with it.
                    tracing::warn!("Worker {} gone, dropping its job", worker_id);
                    state.scheduler.abort();
                    state.scheduler.release_worker();
                }
                state.check_drained();
            }

            QueueMessage::JobParked { worker_id, seq } => {
                if state.config.trace_processing_threads {
                    tracing::debug!("Worker {} parked job {}", worker_id, seq);
                }
                state.broadcast(QueueEvent::JobParked {
                    queue_id: state.id,
                    seq,
                    timestamp: Utc::now(),
                });
            }

            QueueMessage::AsyncReady { job } => {
                let seq = job.seq();
                tracing::debug!("Job {} ready to complete in {}", seq, state.config.name);
                state.broadcast(QueueEvent::JobReady {
                    queue_id: state.id,
                    seq,
                    timestamp: Utc::now(),
                });
                if state.scheduler.async_ready(*job) {
                    state.spawn_worker(&myself).await;
                }
            }

            QueueMessage::JobFinished { worker_id, done } => {
                if state.config.trace_processing_threads {
                    tracing::debug!(
                        "Worker {} completed job {} ({})",
                        worker_id,
                        done.seq,
                        done.state
                    );
                }
                state.scheduler.complete(&done);
                state.broadcast(QueueEvent::JobCompleted {
                    queue_id: state.id,
                    seq: done.seq,
                    state: done.state,
                    timestamp: Utc::now(),
                });
                state.check_drained();
            }

            QueueMessage::JobAborted {
                worker_id,
                seq,
                error,
            } => {
                tracing::error!("Job {} panicked on worker {}: {}", seq, worker_id, error);
                state.scheduler.abort();
                state.broadcast(QueueEvent::JobAborted {
                    queue_id: state.id,
                    seq,
                    error,
                    timestamp: Utc::now(),
                });
                state.check_drained();
            }

            QueueMessage::TimeoutHandled { seq } => {
                tracing::debug!("Timeout of job {} handled", seq);
                state.scheduler.timeout_handled();
                state.check_drained();
            }

            QueueMessage::Close { reply } => {
                let old_state = state.scheduler.state();
                let new_state = state.scheduler.begin_close();
                state.state_changed(old_state, new_state);

                state.close_waiters.push(reply);
                if new_state == QueueState::Closed {
                    state.on_closed();
                } else {
                    tracing::info!(
                        "Queue {} draining: {:?}",
                        state.config.name,
                        state.scheduler.stats()
                    );
                }
            }

            QueueMessage::GetInfo { reply } => {
                let _ = reply.send(state.info());
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.scheduler.stats());
            }

            QueueMessage::Tick => {
                let expired = state.scheduler.sweep(Instant::now());
                state.evict(&myself, expired);

                // Covers workers that failed to spawn.
                if state.scheduler.try_claim_worker() {
                    state.spawn_worker(&myself).await;
                }
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if state.root.is_some() {
            tracing::warn!(
                "Queue {} stopped before draining: {:?}",
                state.config.name,
                state.scheduler.stats()
            );
        }
        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                if state.config.trace_processing_threads {
                    tracing::debug!("Worker actor {} terminated: {:?}", cell.get_id(), reason);
                }
            }
            SupervisionEvent::ActorFailed(cell, error) => {
                tracing::error!("Worker actor {} failed: {}", cell.get_id(), error);
            }
            _ => {}
        }
        Ok(())
    }
}
