pub mod config;
pub mod error;
pub mod filter;
pub mod form;
pub mod lifecycle;
pub mod link;
pub mod model;
pub mod notify;
pub mod reducer;
pub mod state;

// Backend seam and the scope its completions run in
pub mod backend;
pub mod tasks;

// Data source injection
pub mod source;

// Lifecycle manager
pub mod manager;
