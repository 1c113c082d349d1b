//! Entitlement evaluation and the referral reward model.

pub mod entitlement;
pub mod referral;

pub use entitlement::{
    can_play, evaluate_at, EntitlementSnapshot, PlayDecision, UpsellOption, FREE_EPISODE_LIMIT,
};
pub use referral::{
    referral_link, ReferralCode, ReferralOutcome, ReferralProgress, RewardTier, TierProgress,
    LONG_TIER, SHORT_TIER,
};
