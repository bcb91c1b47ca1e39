pub mod adapters;
pub mod batch;
pub mod cancel;
pub mod chain;
pub mod config;
pub mod group;
pub mod join;
mod pool;
pub mod runtime;
pub mod stage;
