//! Multi-user job queue daemon: authenticated task submission, weighted
//! admission scheduling of OS child processes under per-task resource
//! caps, persistent bookkeeping and an HTTP/JSON control surface.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;
