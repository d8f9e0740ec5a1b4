//! Lifecycle of a temporary SSO token.
//!
//! ```text
//! issued ──redeem──▶ redeemed
//!   │ ──revoke──▶ revoked
//!   └ ──expire──▶ expired
//! ```
//!
//! Every state other than `issued` is terminal. A token is exchanged at
//! most once and only before `expires_at`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default lifetime of a temporary token, in seconds.
pub const DEFAULT_TEMP_TOKEN_TTL_SECS: i64 = 120;

/// Default upper bound on media items preloaded in one handshake.
pub const DEFAULT_MAX_MEDIA_PRELOAD: usize = 50;

/// JWT audience shared by temporary and access tokens.
pub const TOKEN_AUDIENCE: &str = "plume-sso";

/// `typ` claim of a temporary handoff token.
pub const TOKEN_TYPE_TEMP: &str = "sso_temp";

/// `typ` claim of a session access token.
pub const TOKEN_TYPE_ACCESS: &str = "access";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsoTokenStatus {
    Issued,
    Redeemed,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoTokenEvent {
    Redeem,
    Revoke,
    Expire,
}

impl SsoTokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoTokenStatus::Issued => "issued",
            SsoTokenStatus::Redeemed => "redeemed",
            SsoTokenStatus::Revoked => "revoked",
            SsoTokenStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SsoTokenStatus::Issued)
    }
}

impl fmt::Display for SsoTokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SsoTokenStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(SsoTokenStatus::Issued),
            "redeemed" => Ok(SsoTokenStatus::Redeemed),
            "revoked" => Ok(SsoTokenStatus::Revoked),
            "expired" => Ok(SsoTokenStatus::Expired),
            other => Err(CoreError::Internal(format!(
                "Unknown SSO token status '{other}'"
            ))),
        }
    }
}

/// Apply an event to a status.
pub fn transition(
    status: SsoTokenStatus,
    event: SsoTokenEvent,
) -> Result<SsoTokenStatus, CoreError> {
    match (status, event) {
        (SsoTokenStatus::Issued, SsoTokenEvent::Redeem) => Ok(SsoTokenStatus::Redeemed),
        (SsoTokenStatus::Issued, SsoTokenEvent::Revoke) => Ok(SsoTokenStatus::Revoked),
        (SsoTokenStatus::Issued, SsoTokenEvent::Expire) => Ok(SsoTokenStatus::Expired),
        (from, event) => Err(CoreError::Conflict(format!(
            "SSO token in state '{from}' cannot accept {event:?}"
        ))),
    }
}

/// Outcome of inspecting a token row before an exchange attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemCheck {
    /// Issued and within its lifetime.
    Redeemable,
    /// Already exchanged once; presenting it again is a replay.
    Replayed,
    /// Burned by a failed challenge or an explicit revocation.
    Revoked,
    /// Past its lifetime, whether or not cleanup has recorded that yet.
    Expired,
}

impl RedeemCheck {
    /// Map a non-redeemable outcome onto the error returned to the caller.
    pub fn into_result(self) -> Result<(), CoreError> {
        match self {
            RedeemCheck::Redeemable => Ok(()),
            RedeemCheck::Replayed => Err(CoreError::Unauthorized(
                "SSO token has already been used".into(),
            )),
            RedeemCheck::Revoked => {
                Err(CoreError::Unauthorized("SSO token has been revoked".into()))
            }
            RedeemCheck::Expired => Err(CoreError::Unauthorized("SSO token has expired".into())),
        }
    }
}

/// Decide whether a token in `status` may be exchanged at `now`.
pub fn check_redeemable(
    status: SsoTokenStatus,
    expires_at: Timestamp,
    now: Timestamp,
) -> RedeemCheck {
    match status {
        SsoTokenStatus::Redeemed => RedeemCheck::Replayed,
        SsoTokenStatus::Revoked => RedeemCheck::Revoked,
        SsoTokenStatus::Expired => RedeemCheck::Expired,
        SsoTokenStatus::Issued if expires_at <= now => RedeemCheck::Expired,
        SsoTokenStatus::Issued => RedeemCheck::Redeemable,
    }
}

/// Normalize an email address for lookup: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn issued_moves_to_each_terminal_state() {
        assert_eq!(
            transition(SsoTokenStatus::Issued, SsoTokenEvent::Redeem).unwrap(),
            SsoTokenStatus::Redeemed
        );
        assert_eq!(
            transition(SsoTokenStatus::Issued, SsoTokenEvent::Revoke).unwrap(),
            SsoTokenStatus::Revoked
        );
        assert_eq!(
            transition(SsoTokenStatus::Issued, SsoTokenEvent::Expire).unwrap(),
            SsoTokenStatus::Expired
        );
    }

    #[test]
    fn terminal_states_reject_every_event() {
        for status in [
            SsoTokenStatus::Redeemed,
            SsoTokenStatus::Revoked,
            SsoTokenStatus::Expired,
        ] {
            assert!(status.is_terminal());
            for event in [SsoTokenEvent::Redeem, SsoTokenEvent::Revoke, SsoTokenEvent::Expire] {
                assert_matches!(transition(status, event), Err(CoreError::Conflict(_)));
            }
        }
    }

    #[test]
    fn redeemable_only_while_issued_and_unexpired() {
        let now = Utc::now();
        let later = now + Duration::seconds(60);
        let earlier = now - Duration::seconds(1);

        assert_eq!(
            check_redeemable(SsoTokenStatus::Issued, later, now),
            RedeemCheck::Redeemable
        );
        assert_eq!(
            check_redeemable(SsoTokenStatus::Issued, earlier, now),
            RedeemCheck::Expired
        );
        assert_eq!(
            check_redeemable(SsoTokenStatus::Issued, now, now),
            RedeemCheck::Expired
        );
    }

    #[test]
    fn second_presentation_is_a_replay() {
        let now = Utc::now();
        let check = check_redeemable(SsoTokenStatus::Redeemed, now + Duration::seconds(60), now);
        assert_eq!(check, RedeemCheck::Replayed);
        assert_matches!(check.into_result(), Err(CoreError::Unauthorized(msg)) if msg.contains("already been used"));
    }

    #[test]
    fn revoked_and_expired_map_to_unauthorized() {
        assert_matches!(RedeemCheck::Revoked.into_result(), Err(CoreError::Unauthorized(_)));
        assert_matches!(RedeemCheck::Expired.into_result(), Err(CoreError::Unauthorized(_)));
        assert!(RedeemCheck::Redeemable.into_result().is_ok());
    }

    #[test]
    fn status_parses_from_column_value() {
        assert_eq!("redeemed".parse::<SsoTokenStatus>().unwrap(), SsoTokenStatus::Redeemed);
        assert!("used".parse::<SsoTokenStatus>().is_err());
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Jane.Doe@Example.COM "), "jane.doe@example.com");
    }
}
