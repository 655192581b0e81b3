use crate::core::model::{RunId, RunOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    ItemStarted { run_id: RunId, index: usize },
    ItemFinished { run_id: RunId, index: usize },
    /// Failure inside an item. The item still finishes afterwards.
    ItemError { run_id: RunId, index: usize, message: String },
    AllFinished { run_id: RunId, outcome: RunOutcome },
}

impl QueueEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            QueueEvent::ItemStarted { run_id, .. }
            | QueueEvent::ItemFinished { run_id, .. }
            | QueueEvent::ItemError { run_id, .. }
            | QueueEvent::AllFinished { run_id, .. } => *run_id,
        }
    }
}
