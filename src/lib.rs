// src/lib.rs

//! dealrelay: offer aggregation and relay library

pub mod channel;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;
