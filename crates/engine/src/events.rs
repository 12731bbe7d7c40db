//! Progress event delivery for one pipeline run.

use anyhow::{Result, anyhow};
use labelplan_types::{WorkPlanPhase, WorkPlanProgress};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Stamps run-wide fields onto progress events and forwards them to the caller.
pub struct ProgressSink {
    tx: UnboundedSender<WorkPlanProgress>,
    conversation_id: Option<String>,
    current_step: u32,
    total_steps: u32,
}

impl ProgressSink {
    pub fn new(tx: UnboundedSender<WorkPlanProgress>, conversation_id: Option<String>) -> Self {
        Self {
            tx,
            conversation_id,
            current_step: 0,
            total_steps: 0,
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Adopt the conversation identifier reported by the backend, if any.
    pub fn set_conversation_id(&mut self, conversation_id: Option<String>) {
        if conversation_id.is_some() {
            self.conversation_id = conversation_id;
        }
    }

    pub fn set_steps(&mut self, current_step: u32, total_steps: u32) {
        self.current_step = current_step;
        self.total_steps = total_steps;
    }

    /// Event for `phase` pre-filled with the run's step counters and conversation.
    pub fn event(&self, phase: WorkPlanPhase, message: impl Into<String>) -> WorkPlanProgress {
        WorkPlanProgress::new(phase, message)
            .with_steps(self.current_step, self.total_steps)
            .with_conversation(self.conversation_id.clone())
    }

    /// Forward an event. Fails once the receiver has gone away.
    pub fn emit(&self, event: WorkPlanProgress) -> Result<()> {
        debug!(phase = event.phase.as_str(), message = %event.message, "work plan progress");
        self.tx.send(event).map_err(|_| anyhow!("progress receiver dropped"))
    }

    /// Shorthand for [`Self::event`] followed by [`Self::emit`].
    pub fn emit_phase(&self, phase: WorkPlanPhase, message: impl Into<String>) -> Result<()> {
        self.emit(self.event(phase, message))
    }

    /// Emit the terminal error event.
    pub fn fail(&self, message: impl Into<String>) -> Result<()> {
        let event = WorkPlanProgress::error(message)
            .with_steps(self.current_step, self.total_steps)
            .with_conversation(self.conversation_id.clone());
        self.emit(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn events_carry_run_context() {
        let (tx, mut rx) = unbounded_channel();
        let mut sink = ProgressSink::new(tx, Some("c-1".into()));
        sink.set_steps(2, 3);
        sink.set_conversation_id(None);
        sink.emit_phase(WorkPlanPhase::Executing, "step 2").expect("emit");

        let event = rx.try_recv().expect("event");
        assert_eq!(event.conversation_id.as_deref(), Some("c-1"));
        assert_eq!((event.current_step, event.total_steps), (2, 3));
    }

    #[test]
    fn emitting_after_receiver_drop_fails() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let sink = ProgressSink::new(tx, None);
        assert!(sink.emit_phase(WorkPlanPhase::Planning, "plan").is_err());
    }
}
