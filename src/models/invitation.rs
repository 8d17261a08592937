use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single-use onboarding invitation tied to an email address.
///
/// Rows are never deleted. Redemption sets `consumed_at`; administrative
/// withdrawal and expiry clean-up set `revoked_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    /// Store-assigned identifier
    pub id: i64,
    /// Normalised (trimmed, lower-cased) email
    pub email: String,
    /// Opaque single-use token
    pub token: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Invitation {
    /// Saturates at the latest representable instant.
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Lifecycle state as of `now`.
    pub fn state(&self, ttl: Duration, now: DateTime<Utc>) -> InvitationState {
        if self.consumed_at.is_some() {
            InvitationState::Consumed
        } else if self.revoked_at.is_some() {
            InvitationState::Revoked
        } else if self.expires_at(ttl) <= now {
            InvitationState::Expired
        } else {
            InvitationState::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    Pending,
    Consumed,
    Revoked,
    Expired,
}

/// Request to invite an email address.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvitation {
    #[validate(email, length(min = 3, max = 254))]
    pub email: String,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

impl CreateInvitation {
    /// Build a request with the email trimmed and lower-cased and a blank
    /// comment dropped.
    pub fn new(email: &str, comment: Option<&str>) -> Self {
        Self {
            email: normalize_email(email),
            comment: comment
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }
}

/// Row to insert. Built by the invitation service once the token is minted.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub email: String,
    pub token: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
