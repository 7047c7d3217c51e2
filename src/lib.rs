pub mod api;
pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod format;
pub mod state;
pub mod storage;
pub mod types;
pub mod ui;

#[cfg(test)]
mod test_support;
