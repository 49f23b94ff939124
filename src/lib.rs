pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod model;
pub mod storage;
pub mod store;
