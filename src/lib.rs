pub mod config;
pub mod error;
pub mod export;
pub mod ordered;
pub mod progress;
pub mod quiz;
pub mod record;
pub mod review;
pub mod roadmap;
pub mod schedule;
pub mod store;
pub mod streak;
pub mod tracker;
pub mod web;

pub use error::{Error, Result};
