//! Utility functions shared by the library and the CLI.
//!
//! - **URL validation**: API base URLs and media URLs handed to the system player
//! - **Text processing**: width-aware truncation and terminal-safe sanitizing
//!   of backend-provided titles

mod text;
mod url_validator;

pub use text::{display_width, fit_to_width, sanitize_for_terminal};
pub use url_validator::{validate_api_base, validate_media_url, UrlValidationError};

/// Maximum allowed search query length, in characters.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
