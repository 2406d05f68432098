mod completion;
mod orchestrator;
mod worker;

pub use completion::CompletionListener;
pub use orchestrator::UpdateOrchestrator;
pub use worker::Worker;
