//! A local expense tracker: budgeted categories, expenses, live totals and derived views such as
//! monthly budget progress and a daily breakdown.
//!
//! `Config` opens the data directory and hands out a `Repository`, which exposes live query results
//! (`Live`) and write operations. A `Dashboard` observes a `Repository` and computes the derived
//! state.

pub mod args;
pub mod commands;
mod config;
pub mod dashboard;
mod db;
mod error;
pub mod model;
mod observe;
mod query;
mod repository;
pub mod store;
mod utils;


pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{Error, ErrorType, Result};
pub use observe::Live;
pub use repository::Repository;
