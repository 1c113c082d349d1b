//! Identity bootstrap: who the user is and what they may watch.

pub mod bootstrap;
pub mod identity;

pub use bootstrap::Session;
pub use identity::{HostUser, LaunchContext, LaunchError, Role, UserIdentity, GUEST_ID};
