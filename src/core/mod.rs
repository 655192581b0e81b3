pub mod coordinator;
pub mod error;
pub mod events;
pub mod model;
pub mod queue;
pub mod records;
