//! Once-per-launch session setup.
//!
//! Order matters: the identity is registered first, the launch referral code
//! (if any) is submitted only after registration succeeded, and the
//! entitlement snapshot is fetched last so it reflects both.
use chrono::Utc;
use serde::Serialize;

use super::identity::{LaunchContext, Role, UserIdentity};
use crate::access::{
    evaluate_at, referral_link, EntitlementSnapshot, PlayDecision, ReferralOutcome,
};
use crate::api::{ApiClient, ApiError, UserProfile};
use crate::config::Config;

/// Identity, role and entitlements of the current user.
///
/// The entitlement snapshot is only ever replaced as a whole, by
/// [`Session::bootstrap`] and [`Session::refresh_entitlements`].
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    identity: UserIdentity,
    profile: Option<UserProfile>,
    role: Role,
    entitlements: EntitlementSnapshot,
    referral: Option<ReferralOutcome>,
    #[serde(skip)]
    admin_ids: Vec<i64>,
}

impl Session {
    /// A guest session with no entitlements.
    pub fn guest() -> Self {
        Self {
            identity: UserIdentity::guest(),
            profile: None,
            role: Role::Guest,
            entitlements: EntitlementSnapshot::default(),
            referral: None,
            admin_ids: Vec::new(),
        }
    }

    /// Establish the session for this launch.
    ///
    /// Never fails: backend errors are logged and degrade to the facts that
    /// are known locally.
    pub async fn bootstrap(client: &ApiClient, launch: &LaunchContext, config: &Config) -> Self {
        let identity = launch.identity();
        let mut session = Self {
            identity,
            admin_ids: config.admin_ids.clone(),
            ..Self::guest()
        };

        if session.identity.is_guest() {
            tracing::info!("No host identity, continuing as guest");
            return session;
        }
        session.role = session.derive_role();

        let registered = match client.register_user(&session.identity).await {
            Ok(profile) => {
                if let Some(profile) = profile {
                    session.apply_profile(profile);
                }
                tracing::info!(user_id = session.identity.id, role = ?session.role, "Registered user");
                true
            }
            Err(e) => {
                tracing::warn!(user_id = session.identity.id, error = %e, "User registration failed");
                false
            }
        };

        if registered {
            session.referral = session.submit_launch_referral(client, launch).await;
        } else if launch.referral_code().is_some() {
            tracing::warn!("Skipping referral submission, user is not registered");
        }

        if let Err(e) = session.refresh_entitlements(client).await {
            tracing::warn!(error = %e, "Entitlement check failed, using profile facts");
            session.entitlements = session.fallback_entitlements();
        }
        session
    }

    async fn submit_launch_referral(
        &self,
        client: &ApiClient,
        launch: &LaunchContext,
    ) -> Option<ReferralOutcome> {
        let code = launch.referral_code()?;
        if code.referrer_id() == self.identity.id {
            tracing::debug!(%code, "Ignoring self-referral");
            return None;
        }

        match client.submit_referral(self.identity.id, &code).await {
            Ok(outcome) => {
                tracing::info!(%code, ?outcome, "Referral submitted");
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!(%code, error = %e, "Referral submission failed");
                None
            }
        }
    }

    /// Re-check entitlements and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] from the subscription check. The previous snapshot
    /// stays in place; it is never partially updated.
    pub async fn refresh_entitlements(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        if self.identity.is_guest() {
            self.entitlements = EntitlementSnapshot::default();
            return Ok(());
        }
        let status = client.subscription_status(self.identity.id).await?;
        let snapshot = EntitlementSnapshot::from_status(&status, self.role == Role::Admin);
        tracing::debug!(user_id = self.identity.id, ?snapshot, "Entitlements refreshed");
        self.entitlements = snapshot;
        Ok(())
    }

    /// Merge a backend profile and re-derive the role.
    pub fn apply_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
        self.role = self.derive_role();
    }

    fn derive_role(&self) -> Role {
        if self.identity.is_guest() {
            return Role::Guest;
        }
        let configured = self.admin_ids.contains(&self.identity.id);
        let backend = self.profile.as_ref().is_some_and(UserProfile::has_admin_role);
        if configured || backend {
            Role::Admin
        } else {
            Role::Member
        }
    }

    fn fallback_entitlements(&self) -> EntitlementSnapshot {
        EntitlementSnapshot {
            is_admin: self.role == Role::Admin,
            has_active_membership: self.profile.as_ref().is_some_and(UserProfile::is_vip),
            ..EntitlementSnapshot::default()
        }
    }

    /// Gate playback of `episode_index` against the current snapshot.
    pub fn play_decision(&self, episode_index: usize, free_limit: usize) -> PlayDecision {
        evaluate_at(&self.entitlements, episode_index, free_limit, Utc::now())
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn user_id(&self) -> i64 {
        self.identity.id
    }

    pub fn is_guest(&self) -> bool {
        self.identity.is_guest()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn entitlements(&self) -> EntitlementSnapshot {
        self.entitlements
    }

    /// The user's own invite link. Guests have no redeemable code.
    pub fn referral_link(&self, bot_username: &str) -> Option<String> {
        (!self.is_guest()).then(|| referral_link(bot_username, self.identity.id))
    }

    /// Outcome of the launch referral, when one was submitted.
    pub fn referral_outcome(&self) -> Option<&ReferralOutcome> {
        self.referral.as_ref()
    }
}
