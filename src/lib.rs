//! Short-drama catalog client.
//!
//! - [`catalog`] - normalizes the backend's loosely shaped catalog payloads
//! - [`api`] - HTTP client for the catalog proxy and account endpoints
//! - [`pager`] - per-stream pagination and debounced search
//! - [`access`] - entitlement gating and referral rewards
//! - [`session`] - identity bootstrap
//! - [`app`] - headless application state driven by background events

pub mod access;
pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod pager;
pub mod session;
pub mod util;
