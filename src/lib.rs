pub mod aggregator;
pub mod config;
pub mod directory;
pub mod errors;
pub mod logging;
pub mod models;
pub mod scanner;
pub mod session;
pub mod tracking;
pub mod ui;
pub mod view;

pub use errors::TrackerError;
