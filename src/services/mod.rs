pub mod orchestrator;
pub mod photos;
pub mod queue;
pub mod storage;
