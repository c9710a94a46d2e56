pub mod model;
pub mod run_store;
pub mod runner;
pub mod scheduler;
