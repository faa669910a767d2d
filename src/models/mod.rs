// src/models/mod.rs

//! Domain models for the waitlist tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod category;
mod config;
mod facility;
mod record;

// Re-export all public types
pub use category::{AgeBand, PriorityStatus, WaitingTime};
pub use config::{
    Backend, ClockConfig, Config, Environment, LoggingConfig, PathsConfig, RetryConfig,
    SourceConfig, StoreConfig,
};
pub use facility::Facility;
pub use record::{TransplantRecord, WaitlistRecord};
