pub mod projector;
pub mod task_store;
