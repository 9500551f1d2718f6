pub mod admission;
pub mod enrichment;
pub mod orchestrator;
pub mod queue;
pub mod worker;
