#![doc = "decoder-core: core logic library for decoder."]

//! This crate holds the business logic of decoder: building a text corpus
//! from a source tree and turning it into a multi-section report through a
//! rate-limited generative-text API.
//!
//! No HTTP lives here. The API is reached through the
//! [`contract::Generator`] trait; the CLI crate provides the real client.
//!
//! # Modules
//! - [`filter`]: inclusion/exclusion predicate and ignore list
//! - [`aggregate`]: recursive corpus and tree-listing builder
//! - [`limiter`]: token budget per time window
//! - [`generate`]: one section, one prompt, retry on throttling
//! - [`report`]: section scheduling and ordered assembly
//! - [`config`]: run configuration with defaults

pub mod aggregate;
pub mod config;
pub mod contract;
pub mod filter;
pub mod generate;
pub mod limiter;
pub mod report;
