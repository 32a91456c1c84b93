//! In-process background jobs.
//!
//! Request handlers enqueue work that should not hold up the response:
//! push fan-out for new notifications and follow counter recounts.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::services::following::FollowingService;
use crate::services::push_notification::PushNotificationService;

/// Maximum number of concurrent job workers.
const MAX_WORKERS: usize = 4;

/// Channel buffer size for jobs.
const JOB_BUFFER_SIZE: usize = 1000;

/// Job types that can be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Deliver a notification to every push subscription of its recipient.
    PushFanout { notification_id: String },
    /// Recompute a user's follow counters from the edge tables.
    RecountFollows { user_id: String },
}

/// Job sender for enqueueing jobs.
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::Sender<Job>,
}

impl JobSender {
    /// Enqueue a job for processing.
    pub async fn enqueue(&self, job: Job) -> Result<(), &'static str> {
        self.sender.send(job).await.map_err(|_| "Job queue is closed")
    }

    /// Enqueue push fan-out for a notification.
    pub async fn push_fanout(&self, notification_id: String) -> Result<(), &'static str> {
        self.enqueue(Job::PushFanout { notification_id }).await
    }

    /// Enqueue a follow counter recount.
    pub async fn recount_follows(&self, user_id: String) -> Result<(), &'static str> {
        self.enqueue(Job::RecountFollows { user_id }).await
    }
}

/// Job worker context containing services needed for job processing.
#[derive(Clone, Default)]
pub struct JobWorkerContext {
    pub push_service: Option<PushNotificationService>,
    pub following_service: Option<FollowingService>,
}

/// Job processing service.
pub struct JobService {
    sender: mpsc::Sender<Job>,
    receiver: Option<mpsc::Receiver<Job>>,
}

impl JobService {
    /// Create a new job service.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(JOB_BUFFER_SIZE);
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    /// Get a job sender for enqueueing jobs.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            sender: self.sender.clone(),
        }
    }

    /// Start the job processor with the given context.
    ///
    /// Consumes the receiver and spawns the worker loop. The loop ends once
    /// every sender has been dropped.
    pub fn start(mut self, context: JobWorkerContext) -> Option<tokio::task::JoinHandle<()>> {
        let Some(receiver) = self.receiver.take() else {
            error!("Job service already started");
            return None;
        };
        let context = Arc::new(context);
        drop(self);

        Some(tokio::spawn(async move {
            info!(workers = MAX_WORKERS, "Job worker starting");
            run_job_processor(receiver, context).await;
            info!("Job worker stopped");
        }))
    }
}

impl Default for JobService {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the job processor.
async fn run_job_processor(mut receiver: mpsc::Receiver<Job>, context: Arc<JobWorkerContext>) {
    // Use a semaphore to limit concurrent workers
    let semaphore = Arc::new(tokio::sync::Semaphore::new(MAX_WORKERS));

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let ctx = context.clone();

        tokio::spawn(async move {
            let _permit = permit;
            process_job(job, &ctx).await;
        });
    }

    // Wait for in-flight jobs before reporting the worker as stopped.
    let _ = semaphore.acquire_many(MAX_WORKERS as u32).await;
}

/// Process a single job.
async fn process_job(job: Job, context: &JobWorkerContext) {
    match job {
        Job::PushFanout { notification_id } => {
            process_push_fanout(context, &notification_id).await;
        }
        Job::RecountFollows { user_id } => {
            process_recount(context, &user_id).await;
        }
    }
}

async fn process_push_fanout(context: &JobWorkerContext, notification_id: &str) {
    let Some(ref push_service) = context.push_service else {
        debug!("Push service not available, skipping fan-out");
        return;
    };

    match push_service.deliver_notification(notification_id).await {
        Ok(report) => {
            debug!(
                notification_id = %notification_id,
                sent = report.sent,
                skipped = report.skipped,
                failed = report.failed,
                "Push fan-out finished"
            );
        }
        Err(e) => {
            error!(notification_id = %notification_id, error = %e, "Push fan-out failed");
        }
    }
}

async fn process_recount(context: &JobWorkerContext, user_id: &str) {
    let Some(ref following_service) = context.following_service else {
        debug!("Following service not available, skipping recount");
        return;
    };

    if let Err(e) = following_service.recount(user_id).await {
        error!(user_id = %user_id, error = %e, "Follow counter recount failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_sender_enqueue() {
        let service = JobService::new();
        let sender = service.sender();

        let handle = service.start(JobWorkerContext::default());
        assert!(handle.is_some());

        assert!(sender.push_fanout("n1".to_string()).await.is_ok());
        assert!(sender.recount_follows("u1".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn test_worker_stops_when_senders_drop() {
        let service = JobService::new();
        let sender = service.sender();
        let handle = service.start(JobWorkerContext::default()).unwrap();

        sender.recount_follows("u1".to_string()).await.unwrap();
        drop(sender);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_after_receiver_gone_fails() {
        let service = JobService::new();
        let sender = service.sender();
        drop(service);

        assert!(sender.push_fanout("n1".to_string()).await.is_err());
    }
}
