//! dub-core - link edge for a multi-tenant link platform
//!
//! Link cache, redirect resolution, click deduplication, conversion tracking
//! (click → lead → sale → commission) and partner payouts.
//!
//! # Features
//! - **server**: HTTP server mode (default)
//! - **cli**: Management commands
//!
//! # Architecture
//! - `cache`: KV backends (moka / Redis) and the link projection cache
//! - `storage`: SeaORM persistence
//! - `analytics`: Buffered click counters and the event store seam
//! - `services`: Resolver, click tracker, conversions, commissions, payouts
//! - `tasks`: Background job queue, webhooks and dead letters
//! - `api`: HTTP services and middleware
//! - `interfaces`: CLI commands
//! - `config`: Static configuration
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging

pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod tasks;
pub mod utils;
