//! Out-of-line execution of review decisions.
//!
//! The interaction handler only turns a click into a [`DecisionJob`] and
//! `try_send`s it; a dispatcher drains the bounded queue and runs each job in
//! its own task, at most `concurrency` at a time.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use engage_types::{DecisionKind, MessageRef};

use crate::review::{ReviewMachine, ReviewOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionJob {
    Approve {
        social_id: String,
        message: Option<MessageRef>,
    },
    Edit {
        social_id: String,
        text: String,
        message: Option<MessageRef>,
    },
    Skip {
        social_id: String,
        message: Option<MessageRef>,
    },
    OpenEditor {
        trigger_id: String,
        social_id: String,
        prefill: Option<String>,
    },
}

impl DecisionJob {
    pub fn social_id(&self) -> &str {
        match self {
            DecisionJob::Approve { social_id, .. }
            | DecisionJob::Edit { social_id, .. }
            | DecisionJob::Skip { social_id, .. }
            | DecisionJob::OpenEditor { social_id, .. } => social_id,
        }
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            DecisionJob::Approve { .. } => DecisionKind::Approve,
            DecisionJob::Edit { .. } | DecisionJob::OpenEditor { .. } => DecisionKind::Edit,
            DecisionJob::Skip { .. } => DecisionKind::Skip,
        }
    }

    /// Run the job to completion against `machine`
    pub async fn execute(self, machine: &ReviewMachine) -> anyhow::Result<Option<ReviewOutcome>> {
        let outcome = match self {
            DecisionJob::Approve { social_id, message } => machine.approve(&social_id, message).await?,
            DecisionJob::Edit {
                social_id,
                text,
                message,
            } => machine.edit(&social_id, &text, message).await?,
            DecisionJob::Skip { social_id, message } => machine.skip(&social_id, message).await?,
            DecisionJob::OpenEditor {
                trigger_id,
                social_id,
                prefill,
            } => {
                machine.open_editor(&trigger_id, &social_id, prefill).await?;
                return Ok(None);
            }
        };
        Ok(Some(outcome))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("decision queue is full")]
    Full,
    #[error("decision queue is closed")]
    Closed,
}

/// Sending half of the decision queue; cheap to clone
#[derive(Clone)]
pub struct DecisionQueue {
    tx: mpsc::Sender<DecisionJob>,
}

impl DecisionQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DecisionJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting
    pub fn submit(&self, job: DecisionJob) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Create the queue and start its dispatcher
    pub fn start(
        machine: ReviewMachine,
        capacity: usize,
        concurrency: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::new(capacity);
        let handle = tokio::spawn(dispatch(rx, Arc::new(machine), concurrency));
        (queue, handle)
    }
}

/// Drain `rx` until every sender is gone, running jobs concurrently.
/// Waits for in-flight jobs before returning.
pub async fn dispatch(
    mut rx: mpsc::Receiver<DecisionJob>,
    machine: Arc<ReviewMachine>,
    concurrency: usize,
) {
    let limit = concurrency.max(1);
    let permits = Arc::new(Semaphore::new(limit));

    while let Some(job) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let machine = machine.clone();
        tokio::spawn(async move {
            let social_id = job.social_id().to_string();
            let kind = job.kind();
            match job.execute(&machine).await {
                Ok(Some(outcome)) => {
                    info!(social_id = %social_id, decision = kind.as_str(), outcome = outcome.label(), "Decision processed")
                }
                Ok(None) => {}
                Err(e) => {
                    error!(social_id = %social_id, decision = kind.as_str(), error = %e, "Decision failed")
                }
            }
            drop(permit);
        });
    }

    // All permits back means all spawned jobs have finished
    let drained = permits.acquire_many(limit as u32).await;
    if let Err(e) = drained {
        warn!(error = %e, "Decision dispatcher stopped without draining");
    }
}
