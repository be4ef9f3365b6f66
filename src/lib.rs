//! job-scout library
//!
//! Fetches job listings from configured sources, keeps the ones that look
//! like IT roles in the target locality, drops the ones already delivered,
//! and posts the rest to a webhook in size-bounded messages.

pub mod delivery;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod utils;
