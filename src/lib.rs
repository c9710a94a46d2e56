#![forbid(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod formats;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod processed_store;
pub mod raw_store;
pub mod table;
pub mod transform;
