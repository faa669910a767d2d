// src/lib.rs

//! Waitlist tracker library
//!
//! Archives timestamped snapshots of the national liver waitlist report,
//! reshapes raw exports into canonical long-format records, and answers
//! radius queries over transplant centers.

pub mod error;
pub mod geo;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod services;
pub mod storage;
pub mod utils;
