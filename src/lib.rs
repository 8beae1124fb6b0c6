pub mod cli;
pub mod config;
pub mod errors;
pub mod orders;
pub mod scheduler;
pub mod simulate;
pub mod utils;
