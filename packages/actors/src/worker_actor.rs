//! Worker actor executing job routines.

use queue_core::{PendingJob, QueuedJob, ReadySignal, Started, Work};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::{QueueMessage, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Queue actor reference.
    pub queue: ActorRef<QueueMessage>,
    /// Log every step.
    pub trace: bool,
    /// Routines run by this worker.
    pub steps: u64,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub trace: bool,
}

impl WorkerActorState {
    /// Ask the queue for the next step. `None` if the queue is gone.
    async fn request_work(&self) -> Option<Work> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.queue
            .send_message(QueueMessage::NextWork {
                worker_id: self.worker_id.clone(),
                reply: tx.into(),
            })
            .ok()?;
        rx.await.ok()
    }

    fn report(&self, message: QueueMessage) {
        if let Err(e) = self.queue.send_message(message) {
            tracing::warn!("Worker {} failed to report to queue: {}", self.worker_id, e);
        }
    }

    /// Run a start routine on the blocking pool.
    async fn start(&mut self, job: QueuedJob) {
        let seq = job.seq();
        self.steps += 1;

        match tokio::task::spawn_blocking(move || job.start()).await {
            Ok(Started::Completed(done)) => self.report(QueueMessage::JobFinished {
                worker_id: self.worker_id.clone(),
                done,
            }),
            Ok(Started::Pending(pending, signal)) => {
                self.report(QueueMessage::JobParked {
                    worker_id: self.worker_id.clone(),
                    seq,
                });
                // The worker moves on; the job waits without holding it.
                tokio::spawn(await_ready(self.queue.clone(), pending, signal));
            }
            Err(e) => self.report(QueueMessage::JobAborted {
                worker_id: self.worker_id.clone(),
                seq,
                error: e.to_string(),
            }),
        }
    }

    /// Run a finish routine on the blocking pool.
    async fn finish(&mut self, job: PendingJob) {
        let seq = job.seq();
        self.steps += 1;

        match tokio::task::spawn_blocking(move || job.finish()).await {
            Ok(done) => self.report(QueueMessage::JobFinished {
                worker_id: self.worker_id.clone(),
                done,
            }),
            Err(e) => self.report(QueueMessage::JobAborted {
                worker_id: self.worker_id.clone(),
                seq,
                error: e.to_string(),
            }),
        }
    }
}

/// Wait for a parked job's readiness and hand it back to the queue.
async fn await_ready(queue: ActorRef<QueueMessage>, job: PendingJob, signal: ReadySignal) {
    let seq = job.seq();
    if !signal.wait().await {
        tracing::warn!("Job {} dropped its ready notifier, finishing it anyway", seq);
    }
    if queue
        .send_message(QueueMessage::AsyncReady { job: Box::new(job) })
        .is_err()
    {
        tracing::warn!("Queue gone before job {} could finish", seq);
    }
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        if args.trace {
            tracing::debug!("Starting worker: {}", args.worker_id);
        }

        myself.send_message(WorkerMessage::Pump)?;

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            trace: args.trace,
            steps: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Pump => {
                match state.request_work().await {
                    Some(Work::Start(job)) => state.start(job).await,
                    Some(Work::Finish(job)) => state.finish(job).await,
                    Some(Work::Exit) | None => {
                        if state.trace {
                            tracing::debug!(
                                "Worker {} exiting after {} steps",
                                state.worker_id,
                                state.steps
                            );
                        }
                        myself.stop(None);
                        return Ok(());
                    }
                }

                if myself.send_message(WorkerMessage::Pump).is_err() {
                    myself.stop(None);
                }
            }
        }

        Ok(())
    }
}
