//! Run observers.
//!
//! Observers see every [`RunEvent`] as it happens. They are isolated from
//! the run: an observer that errors or panics is logged and skipped.

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use bouncer_core::{
    events::{RunEvent, RunEventKind},
    traits::RunObserver,
    Error, Result,
};

/// Deliver one event, containing observer failures.
pub async fn notify(observer: &dyn RunObserver, event: &RunEvent) {
    match AssertUnwindSafe(observer.on_event(event)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(run_id = %event.run_id, sequence = event.sequence, error = %e, "Observer failed");
        }
        Err(_) => {
            tracing::error!(run_id = %event.run_id, sequence = event.sequence, "Observer panicked");
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<RunEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Event payloads without ids and timestamps.
    pub fn kinds(&self) -> Vec<RunEventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl RunObserver for CollectingObserver {
    async fn on_event(&self, event: &RunEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Logs events through `tracing`.
pub struct TracingObserver;

#[async_trait]
impl RunObserver for TracingObserver {
    async fn on_event(&self, event: &RunEvent) -> Result<()> {
        match &event.kind {
            RunEventKind::DelegationStarted { tool_name, args } => tracing::info!(
                run_id = %event.run_id,
                sequence = event.sequence,
                tool = %tool_name,
                args = %args,
                "MANAGER: delegating task"
            ),
            RunEventKind::DelegationEnded {
                tool_name,
                output,
                success,
            } => tracing::info!(
                run_id = %event.run_id,
                sequence = event.sequence,
                tool = %tool_name,
                success,
                output_len = output.len(),
                "Delegation finished"
            ),
            RunEventKind::FinalAnswer { text } => tracing::info!(
                run_id = %event.run_id,
                sequence = event.sequence,
                answer_len = text.len(),
                "Final answer ready"
            ),
        }
        Ok(())
    }
}

/// Forwards events to a channel for a presentation layer.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl RunObserver for ChannelObserver {
    async fn on_event(&self, event: &RunEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| Error::internal("event receiver dropped"))
    }
}

/// Fans events out to several observers, each isolated from the others.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }

    pub fn with(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

#[async_trait]
impl RunObserver for CompositeObserver {
    async fn on_event(&self, event: &RunEvent) -> Result<()> {
        for observer in &self.observers {
            notify(observer.as_ref(), event).await;
        }
        Ok(())
    }
}
