pub mod metrics;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod web;
