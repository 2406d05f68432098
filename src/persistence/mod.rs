pub mod preferences;
pub mod task_store;

pub use preferences::Preferences;
pub use task_store::TaskStore;
