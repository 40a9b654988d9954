use crate::utils::error::Result;
use async_trait::async_trait;

/// A unit of work that can be scheduled by [`crate::core::parallel::run_tasks`].
#[async_trait]
pub trait Task: Send + Sync + 'static {
    type Output: Send + 'static;

    fn label(&self) -> String;

    async fn execute(&self) -> Result<Self::Output>;
}
