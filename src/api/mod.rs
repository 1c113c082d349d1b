//! Backend HTTP client.
//!
//! - [`client`] - [`ApiClient`] transport: timeouts, size cap, JSON decoding
//! - [`catalog`] - tab feeds, search, suggestions, detail and random pick
//! - [`account`] - registration, referral, entitlements and library
//! - [`error`] - [`ApiError`] and its retry taxonomy

pub mod account;
pub mod catalog;
pub mod client;
pub mod error;

pub use account::{LibraryEntry, SettingsUpdate, SubscriptionStatus, UserProfile, UserSettings};
pub use catalog::{DramaBundle, HomeTab};
pub use client::{ApiClient, MAX_RESPONSE_SIZE};
pub use error::ApiError;
