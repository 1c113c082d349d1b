//! User identity and the host launch context.
//!
//! Inside the chat host the client is launched with an `initData` string
//! (`user=<json>&start_param=...&auth_date=...`). Outside it there is no
//! identity and the user is a guest.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::access::ReferralCode;

/// Identifier of the anonymous guest identity.
pub const GUEST_ID: i64 = 0;

const INIT_DATA_ENV: &str = "DRAMABOX_INIT_DATA";
const START_PARAM_ENV: &str = "DRAMABOX_START_PARAM";
const LAUNCH_URL_ENV: &str = "DRAMABOX_LAUNCH_URL";

/// URL query keys that may carry a referral code, in priority order.
const URL_START_KEYS: &[&str] = &["startapp", "start", "ref", "tgWebAppStartParam"];

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Host user payload is not valid JSON: {0}")]
    InvalidUser(#[from] serde_json::Error),

    #[error("Launch URL is invalid: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The identity registered with the backend. Serializes to the wire shape
/// of `POST /api/user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    #[serde(rename = "telegram_id")]
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: String,
}

impl UserIdentity {
    pub fn guest() -> Self {
        Self {
            id: GUEST_ID,
            username: "guest".to_string(),
            first_name: "Guest".to_string(),
            last_name: String::new(),
            avatar_url: String::new(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.id == GUEST_ID
    }

    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

impl From<HostUser> for UserIdentity {
    fn from(user: HostUser) -> Self {
        Self {
            id: user.id,
            username: user.username.unwrap_or_default(),
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            avatar_url: user.photo_url.unwrap_or_default(),
        }
    }
}

/// Access role derived at bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Member,
    Admin,
}

/// User object as the host provides it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Everything the host hands over at launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    pub host_user: Option<HostUser>,
    /// Host-native start parameter.
    pub start_param: Option<String>,
    pub launch_url: Option<Url>,
}

impl LaunchContext {
    /// Parse a host `initData` query string.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::InvalidUser`] if the `user` field is present but
    /// is not a JSON user object. Unknown fields are ignored.
    pub fn from_init_data(init_data: &str) -> Result<Self, LaunchError> {
        let mut context = Self::default();
        for (key, value) in url::form_urlencoded::parse(init_data.trim().as_bytes()) {
            match &*key {
                "user" => context.host_user = Some(serde_json::from_str(&value)?),
                "start_param" if !value.is_empty() => {
                    context.start_param = Some(value.into_owned())
                }
                _ => {}
            }
        }
        Ok(context)
    }

    /// Read the launch context from `DRAMABOX_INIT_DATA`,
    /// `DRAMABOX_START_PARAM` and `DRAMABOX_LAUNCH_URL`.
    pub fn from_env() -> Result<Self, LaunchError> {
        let mut context = match non_empty_env(INIT_DATA_ENV) {
            Some(init_data) => Self::from_init_data(&init_data)?,
            None => Self::default(),
        };
        if let Some(param) = non_empty_env(START_PARAM_ENV) {
            context.start_param = Some(param);
        }
        if let Some(url) = non_empty_env(LAUNCH_URL_ENV) {
            context = context.with_launch_url(&url)?;
        }
        Ok(context)
    }

    pub fn with_launch_url(mut self, launch_url: &str) -> Result<Self, LaunchError> {
        self.launch_url = Some(Url::parse(launch_url)?);
        Ok(self)
    }

    pub fn with_start_param(mut self, start_param: impl Into<String>) -> Self {
        self.start_param = Some(start_param.into());
        self
    }

    /// Host identity, or the guest identity when launched outside the host.
    pub fn identity(&self) -> UserIdentity {
        self.host_user
            .clone()
            .filter(|user| user.id != GUEST_ID)
            .map(UserIdentity::from)
            .unwrap_or_else(UserIdentity::guest)
    }

    /// The referral code carried by the launch, if any.
    ///
    /// The host start parameter outranks URL parameters; the first
    /// candidate that is a well-formed code wins.
    pub fn referral_code(&self) -> Option<ReferralCode> {
        let from_url = self.launch_url.iter().flat_map(|url| {
            URL_START_KEYS.iter().filter_map(move |key| {
                url.query_pairs()
                    .find(|(k, _)| **k == **key)
                    .map(|(_, v)| v.into_owned())
            })
        });

        self.start_param
            .clone()
            .into_iter()
            .chain(from_url)
            .find_map(|candidate| candidate.parse().ok())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
