use async_trait::async_trait;

use crate::error::Result;
use crate::events::RunEvent;

/// Receives lifecycle events of an orchestration run.
///
/// Invoked in-line at each boundary with a shared reference, so observers
/// cannot alter arguments or outputs. Errors are logged by the caller and
/// never abort the run.
#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn on_event(&self, event: &RunEvent) -> Result<()>;
}

/// Observer that ignores every event.
pub struct NoOpObserver;

#[async_trait]
impl RunObserver for NoOpObserver {
    async fn on_event(&self, _event: &RunEvent) -> Result<()> {
        Ok(())
    }
}
