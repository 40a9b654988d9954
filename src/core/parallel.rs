use crate::domain::ports::Task;
use crate::utils::error::{ExeggutorError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `tasks` with at most `jobs` in flight and returns their results in
/// input order. A task that panics yields `TaskFailed` in its slot.
pub async fn run_tasks<T: Task>(tasks: Vec<T>, jobs: usize) -> Vec<Result<T::Output>> {
    let jobs = jobs.max(1);
    let total = tasks.len();
    let labels: Vec<String> = tasks.iter().map(|task| task.label()).collect();
    tracing::info!("Running {} tasks with {} workers", total, jobs);

    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut set = JoinSet::new();
    for (index, task) in tasks.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            tracing::debug!("Starting task {}: {}", index, task.label());
            (index, task.execute().await)
        });
    }

    let mut slots: Vec<Option<Result<T::Output>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => {
                if let Err(e) = &result {
                    tracing::warn!("Task {} failed: {}", labels[index], e);
                }
                slots[index] = Some(result);
            }
            Err(e) => tracing::error!("Task aborted: {}", e),
        }
    }

    slots
        .into_iter()
        .zip(labels)
        .map(|(slot, label)| {
            slot.unwrap_or_else(|| {
                Err(ExeggutorError::TaskFailed {
                    label,
                    message: "task panicked or was cancelled".to_string(),
                })
            })
        })
        .collect()
}
