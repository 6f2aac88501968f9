//! Prometheus exporter for Smart Maic power meters.
//!
//! This crate polls a Smart Maic meter's HTTP API and exposes its per-line
//! electrical measurements via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Smart Maic API │────>│     Fetcher     │────>│   HTTP Server   │
//! │  (JSON report)  │     │   (registry)    │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! There is no background polling loop: each scrape of `/metrics` triggers
//! one fetch of the device API, updates the gauge registry and renders it.
//! A short-lived response cache collapses rapid scrapes into a single
//! upstream request.
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! smart-maic-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod device;
pub mod fetcher;
pub mod http;
pub mod mapping;
pub mod registry;

pub use config::ExporterConfig;
pub use fetcher::DeviceClient;
pub use http::HttpServer;
pub use registry::{DeviceStatus, MetricRegistry, SharedRegistry};
