// State machine module for delivery task lifecycles
//
// Every transition goes through `DeliveryStateMachine::transition`, which
// validates it against the transition table and records the ledger entry
// before the new status becomes visible in the task repository.

pub mod delivery_state_machine;
pub mod errors;
pub mod events;
pub mod states;

// Re-export main types for convenient access
pub use delivery_state_machine::{determine_target_state, DeliveryStateMachine};
pub use errors::{StateMachineError, StateMachineResult};
pub use events::DeliveryEvent;
pub use states::DeliveryStatus;
