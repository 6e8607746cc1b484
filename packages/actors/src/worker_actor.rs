//! Worker actor running the consume, execute, publish loop.

use std::sync::Arc;
use std::time::Instant;

use broker::{Broker, BrokerError};
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use xrender_core::{
    FailureKind, JobResult, Outcome, WorkerConfig, WorkerEvent, WorkerId, WorkerState,
    WorkerStats, channels, codec,
};

use crate::dispatcher::Dispatcher;
use crate::messages::WorkerMessage;

/// State for the worker actor.
pub struct WorkerActorState {
    /// List jobs are popped from.
    pub input_list: String,
    /// Broker client.
    pub broker: Arc<dyn Broker>,
    /// Operation dispatcher.
    pub dispatcher: Dispatcher,
    /// Loop configuration.
    pub config: WorkerConfig,
    /// Event broadcaster.
    pub event_tx: Option<broadcast::Sender<WorkerEvent>>,
    /// Latest stats, replaced on every state change.
    pub status_tx: Option<watch::Sender<WorkerStats>>,
    /// Lifetime counters and current state.
    pub stats: WorkerStats,
}

impl WorkerActorState {
    /// Create a new worker actor state.
    pub fn new(
        worker_id: WorkerId,
        input_list: impl Into<String>,
        broker: Arc<dyn Broker>,
        dispatcher: Dispatcher,
        config: WorkerConfig,
    ) -> Self {
        Self {
            input_list: input_list.into(),
            broker,
            dispatcher,
            config,
            event_tx: None,
            status_tx: None,
            stats: WorkerStats::new(worker_id),
        }
    }

    /// Set the event broadcaster.
    pub fn with_event_tx(mut self, tx: broadcast::Sender<WorkerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Set the stats publisher.
    pub fn with_status_tx(mut self, tx: watch::Sender<WorkerStats>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// True once the job limit has been served.
    pub fn is_drained(&self) -> bool {
        self.stats.processed >= self.config.max_jobs_per_process
    }

    fn emit(&self, event: WorkerEvent) {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn enter(&mut self, state: WorkerState) {
        tracing::trace!("Worker {} -> {}", self.stats.worker_id, state);
        self.stats.state = state;
        if let Some(ref tx) = self.status_tx {
            tx.send_replace(self.stats.clone());
        }
    }

    /// One pass through the loop, starting from `Idle`.
    async fn poll_once(&mut self) {
        self.enter(WorkerState::Idle);

        let popped = self.broker.pop(&self.input_list, self.config.pop_timeout()).await;
        match popped {
            Ok(Some(raw)) => self.process(raw).await,
            Ok(None) => self.recover(None).await,
            Err(err) => self.recover(Some(err)).await,
        }
    }

    async fn recover(&mut self, error: Option<BrokerError>) {
        self.stats.recoveries += 1;
        self.enter(WorkerState::Recovering);

        match error {
            None => {
                tracing::trace!("No job within {:?}", self.config.pop_timeout());
                self.emit(WorkerEvent::BrokerRecovered {
                    error: None,
                    timestamp: Utc::now(),
                });
            }
            Some(err) => {
                tracing::warn!("Broker pop failed: {}", err);
                self.emit(WorkerEvent::BrokerRecovered {
                    error: Some(err.to_string()),
                    timestamp: Utc::now(),
                });
                tokio::time::sleep(self.config.recovery_delay()).await;
            }
        }
    }

    async fn process(&mut self, raw: Vec<u8>) {
        self.enter(WorkerState::Processing);
        let started = Instant::now();

        let result = match codec::decode(&raw) {
            Ok(job) => {
                tracing::info!("Job received: {} ({})", job.id, job.operation);
                tracing::debug!("Job {} arguments: {:?}", job.id, job.arguments);
                self.emit(WorkerEvent::JobReceived {
                    job_id: job.id.clone(),
                    operation: job.operation.clone(),
                    timestamp: Utc::now(),
                });

                let job_id = job.id.clone();
                match self.dispatcher.dispatch(job).await {
                    Ok(output) => JobResult::success(job_id, output),
                    Err(err) => {
                        tracing::warn!("Job {} failed: {}", job_id, err);
                        JobResult::failure(job_id, FailureKind::Operation, err.to_string())
                    }
                }
            }
            Err(err) => match err.recovered_id() {
                Some(job_id) => {
                    tracing::warn!("Job {} could not be decoded: {}", job_id, err);
                    JobResult::failure(job_id.clone(), FailureKind::Decode, err.to_string())
                }
                None => {
                    tracing::error!(
                        "Dropping undecodable job without id ({} bytes): {}",
                        raw.len(),
                        err
                    );
                    self.stats.dropped += 1;
                    self.emit(WorkerEvent::JobDropped {
                        reason: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    return;
                }
            },
        };

        self.publish(result, started).await;
    }

    async fn publish(&mut self, result: JobResult, started: Instant) {
        self.enter(WorkerState::Publishing);

        let list = channels::output_list(&result.job_id);
        let payload = result.payload();
        let attempts = self.config.publish_attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let pushed = self.broker.push(&list, &payload).await;
            match pushed {
                Ok(()) => {
                    self.stats.processed += 1;
                    self.finished(result, started);
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        "Publishing job {} to {} failed (attempt {}/{}): {}",
                        result.job_id,
                        list,
                        attempt,
                        attempts,
                        err
                    );
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.recovery_delay()).await;
                    }
                }
            }
        }

        tracing::error!("Result of job {} lost: {}", result.job_id, last_error);
        self.stats.dropped += 1;
        self.emit(WorkerEvent::PublishFailed {
            job_id: result.job_id,
            error: last_error,
            timestamp: Utc::now(),
        });
    }

    fn finished(&mut self, result: JobResult, started: Instant) {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.stats.sample_memory();

        match result.outcome {
            Outcome::Success(output) => {
                tracing::info!("Job finished: {} in {}ms", result.job_id, duration_ms);
                tracing::debug!("Job {} output: {}", result.job_id, output);
                self.emit(WorkerEvent::JobCompleted {
                    job_id: result.job_id,
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            Outcome::Failure { kind, message } => {
                self.stats.failed += 1;
                tracing::info!("Job failed: {} ({})", result.job_id, kind);
                self.emit(WorkerEvent::JobFailed {
                    job_id: result.job_id,
                    kind,
                    error: message,
                    timestamp: Utc::now(),
                });
            }
        }

        tracing::info!("Memory usage: {}", self.stats.memory_usage());
        tracing::debug!(
            "Worker {}: {}/{} jobs processed",
            self.stats.worker_id,
            self.stats.processed,
            self.config.max_jobs_per_process
        );
    }

    fn drain(&mut self) {
        self.stats.sample_memory();
        self.enter(WorkerState::Drained);
        tracing::info!(
            "Worker {} drained after {} jobs ({} failed, {} recoveries, {} dropped)",
            self.stats.worker_id,
            self.stats.processed,
            self.stats.failed,
            self.stats.recoveries,
            self.stats.dropped
        );
        if let Some(rate) = self.stats.throughput_per_min() {
            tracing::info!("Throughput: {:.1} jobs/min", rate);
        }
        self.emit(WorkerEvent::Drained {
            worker_id: self.stats.worker_id,
            processed: self.stats.processed,
            timestamp: Utc::now(),
        });
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: WorkerId,
    pub input_list: String,
    pub broker: Arc<dyn Broker>,
    pub dispatcher: Dispatcher,
    pub config: WorkerConfig,
    pub event_tx: Option<broadcast::Sender<WorkerEvent>>,
    pub status_tx: Option<watch::Sender<WorkerStats>>,
}

/// Worker actor that serves jobs one at a time until drained.
///
/// Each `Poll` message runs exactly one cycle and queues the next, so the
/// mailbox keeps jobs strictly sequential.
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
        tracing::info!("Starting worker: {}", args.worker_id);
        tracing::info!("Using list: {}", args.input_list);

        let mut state = WorkerActorState::new(
            args.worker_id,
            args.input_list,
            args.broker,
            args.dispatcher,
            args.config,
        );
        if let Some(tx) = args.event_tx {
            state = state.with_event_tx(tx);
        }
        if let Some(tx) = args.status_tx {
            state = state.with_status_tx(tx);
        }

        tracing::info!(
            "Operations: {}",
            state.dispatcher.registry().names().join(", ")
        );
        tracing::info!("Memory usage: {}", state.stats.memory_usage());
        state.enter(WorkerState::Idle);
        tracing::info!("Ready for jobs");
        state.emit(WorkerEvent::Ready {
            worker_id: state.stats.worker_id,
            input_list: state.input_list.clone(),
            timestamp: Utc::now(),
        });

        myself.send_message(WorkerMessage::Poll)?;

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::Poll => {
                if state.stats.state.is_terminal() {
                    return Ok(());
                }
                if state.is_drained() {
                    state.drain();
                    myself.stop(Some("drained".to_string()));
                    return Ok(());
                }

                state.poll_once().await;
                state.enter(WorkerState::Idle);
                myself.send_message(WorkerMessage::Poll)?;
            }

            WorkerMessage::GetStats { reply } => {
                let _ = reply.send(state.stats.clone());
            }
        }

        Ok(())
    }
}

/// Start a worker actor.
///
/// The join handle resolves once the actor stops, whether it drained or
/// failed. Use [`await_drained`] to tell the two apart.
pub async fn start_worker(
    args: WorkerArgs,
) -> Result<(ActorRef<WorkerMessage>, JoinHandle<()>), ractor::SpawnErr> {
    let name = format!("worker-{}", args.worker_id);
    let (actor, handle) = Actor::spawn(Some(name), WorkerActor, args).await?;

    Ok((actor, handle))
}

/// Ways a worker can end other than draining.
#[derive(Debug, thiserror::Error)]
pub enum WorkerExitError {
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Worker {worker_id} stopped while {state} after {processed} jobs without draining")]
    NotDrained {
        worker_id: WorkerId,
        state: WorkerState,
        processed: u64,
    },
}

/// Wait for a worker to stop and return its final stats.
///
/// `status` must be the receiver of the `status_tx` the worker was started
/// with. Anything but a stop in `Drained` is an error.
pub async fn await_drained(
    handle: JoinHandle<()>,
    status: watch::Receiver<WorkerStats>,
) -> Result<WorkerStats, WorkerExitError> {
    handle.await?;

    let stats = status.borrow().clone();
    if stats.state == WorkerState::Drained {
        Ok(stats)
    } else {
        Err(WorkerExitError::NotDrained {
            worker_id: stats.worker_id,
            state: stats.state,
            processed: stats.processed,
        })
    }
}
