pub mod autoscalepolicy;
pub mod service;
