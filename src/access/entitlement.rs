//! Playback gating.
//!
//! [`can_play`] is the whole policy: episodes below the free limit are open
//! to everyone, the rest need admin, membership or referral access. The
//! snapshot it reads is replaced wholesale whenever entitlements are
//! refreshed, never patched field by field.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::SubscriptionStatus;

/// Episodes with an index below this are always playable.
pub const FREE_EPISODE_LIMIT: usize = 10;

/// Point-in-time view of a user's access rights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntitlementSnapshot {
    pub is_admin: bool,
    pub has_active_membership: bool,
    pub has_referral_access: bool,
    pub referral_access_expires_at: Option<DateTime<Utc>>,
}

impl EntitlementSnapshot {
    /// Build a snapshot from a subscription check.
    ///
    /// `is_admin` is the caller's own admin verdict (backend role or
    /// configured admin id); the backend flag can only add to it.
    pub fn from_status(status: &SubscriptionStatus, is_admin: bool) -> Self {
        Self {
            is_admin: is_admin || status.is_admin,
            has_active_membership: status.is_active,
            has_referral_access: status.has_referral_access,
            referral_access_expires_at: status.referral_expires_at,
        }
    }

    /// Referral access that has not yet expired at `now`.
    ///
    /// A grant without an expiry is treated as open-ended.
    pub fn referral_active_at(&self, now: DateTime<Utc>) -> bool {
        self.has_referral_access
            && self
                .referral_access_expires_at
                .map_or(true, |expires| now < expires)
    }

    /// The snapshot with referral access resolved against `now`.
    pub fn effective_at(&self, now: DateTime<Utc>) -> Self {
        Self {
            has_referral_access: self.referral_active_at(now),
            ..*self
        }
    }

    pub fn has_full_access(&self) -> bool {
        self.is_admin || self.has_active_membership || self.has_referral_access
    }
}

/// Whether the episode at `episode_index` may be played.
pub fn can_play(snapshot: &EntitlementSnapshot, episode_index: usize, free_limit: usize) -> bool {
    episode_index < free_limit || snapshot.has_full_access()
}

/// Ways out of a denied play offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsellOption {
    Upgrade,
    InviteFriends,
}

/// Outcome of gating a play request.
///
/// A denial is a policy outcome, not an error: the caller must present the
/// listed options instead of failing silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PlayDecision {
    Allowed,
    Denied { options: Vec<UpsellOption> },
}

impl PlayDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PlayDecision::Allowed)
    }
}

/// Gate a play request, honouring referral expiry at `now`.
pub fn evaluate_at(
    snapshot: &EntitlementSnapshot,
    episode_index: usize,
    free_limit: usize,
    now: DateTime<Utc>,
) -> PlayDecision {
    if can_play(&snapshot.effective_at(now), episode_index, free_limit) {
        PlayDecision::Allowed
    } else {
        tracing::debug!(episode_index, free_limit, "Playback denied, offering upsell");
        PlayDecision::Denied {
            options: vec![UpsellOption::Upgrade, UpsellOption::InviteFriends],
        }
    }
}
