//! Referral codes, reward tiers and submission outcomes.
//!
//! Two tiers run side by side: every 3 referrals earn a 24-hour pass and
//! reaching 10 referrals earns a 14-day pass. Neither tier is a prerequisite
//! of the other, so progress toward each is computed on its own.
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Prefix of every referral code and start parameter.
pub const REFERRAL_PREFIX: &str = "ref_";

// ============================================================================
// Reward Tiers
// ============================================================================

/// A referral milestone and the access window it grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardTier {
    pub label: &'static str,
    pub referrals: u32,
    pub window_hours: i64,
}

impl RewardTier {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.window_hours)
    }
}

/// Repeats: every 3 referrals earn another 24 hours.
pub const SHORT_TIER: RewardTier = RewardTier {
    label: "24-hour pass",
    referrals: 3,
    window_hours: 24,
};

/// One-off: 10 referrals earn 14 days.
pub const LONG_TIER: RewardTier = RewardTier {
    label: "14-day pass",
    referrals: 10,
    window_hours: 14 * 24,
};

/// Progress toward one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierProgress {
    pub tier: RewardTier,
    pub progress: u32,
    pub remaining: u32,
    /// Whether the tier has been reached at least once.
    pub unlocked: bool,
}

impl TierProgress {
    /// Cyclic progress: `count % target` of `target`.
    fn repeating(tier: RewardTier, count: u32) -> Self {
        let progress = count % tier.referrals;
        Self {
            tier,
            progress,
            remaining: tier.referrals - progress,
            unlocked: count >= tier.referrals,
        }
    }

    /// Saturating progress: `min(count, target)` of `target`.
    fn capped(tier: RewardTier, count: u32) -> Self {
        let progress = count.min(tier.referrals);
        Self {
            tier,
            progress,
            remaining: tier.referrals - progress,
            unlocked: count >= tier.referrals,
        }
    }
}

/// Both tiers' progress for a referral count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferralProgress {
    pub count: u32,
    pub short: TierProgress,
    pub long: TierProgress,
}

impl ReferralProgress {
    pub fn from_count(count: u32) -> Self {
        Self {
            count,
            short: TierProgress::repeating(SHORT_TIER, count),
            long: TierProgress::capped(LONG_TIER, count),
        }
    }
}

// ============================================================================
// Referral Codes
// ============================================================================

/// A parsed `ref_<id>` code naming the referring user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferralCode {
    referrer_id: i64,
}

impl ReferralCode {
    pub fn for_user(referrer_id: i64) -> Self {
        Self { referrer_id }
    }

    pub fn referrer_id(&self) -> i64 {
        self.referrer_id
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{REFERRAL_PREFIX}{}", self.referrer_id)
    }
}

impl FromStr for ReferralCode {
    type Err = String;

    /// Accepts `ref_` followed by a positive decimal id, nothing else.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix(REFERRAL_PREFIX)
            .ok_or_else(|| format!("referral code must start with '{REFERRAL_PREFIX}'"))?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid referral code '{s}'"));
        }
        match digits.parse::<i64>() {
            Ok(id) if id > 0 => Ok(Self { referrer_id: id }),
            _ => Err(format!("invalid referral code '{s}'")),
        }
    }
}

/// Share link that opens the bot with the user's referral code.
pub fn referral_link(bot_username: &str, user_id: i64) -> String {
    format!(
        "https://t.me/{}?start={}",
        bot_username.trim().trim_start_matches('@'),
        ReferralCode::for_user(user_id)
    )
}

// ============================================================================
// Submission Outcome
// ============================================================================

/// Result of submitting a referral code.
///
/// `AlreadyReferred` is informational, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ReferralOutcome {
    Applied,
    AlreadyReferred,
    Rejected(String),
}

impl ReferralOutcome {
    /// Interpret the backend's reply to a referral submission.
    pub fn from_reply(status: u16, body: &Value) -> Self {
        match body.get("status").and_then(Value::as_str) {
            Some("ok") if status < 400 => ReferralOutcome::Applied,
            Some("already_referred") => ReferralOutcome::AlreadyReferred,
            _ => ReferralOutcome::Rejected(
                body.get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("unexpected reply (HTTP {status})")),
            ),
        }
    }

    /// Message shown to the user.
    pub fn message(&self) -> String {
        match self {
            ReferralOutcome::Applied => "Referral applied".to_string(),
            ReferralOutcome::AlreadyReferred => "You have already been referred".to_string(),
            ReferralOutcome::Rejected(reason) => format!("Referral not applied: {reason}"),
        }
    }
}
