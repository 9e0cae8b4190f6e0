use super::states::DeliveryStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on event {event}")]
    InvalidTransition { from: DeliveryStatus, event: String },

    #[error("Task already terminal in {status}")]
    AlreadyTerminal { status: DeliveryStatus },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
