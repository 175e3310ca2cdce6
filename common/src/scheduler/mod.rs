// Periodic trigger for change checks

pub mod engine;

pub use engine::{CheckTrigger, HttpCheckTrigger, TriggerEngine, TriggerResponse};
