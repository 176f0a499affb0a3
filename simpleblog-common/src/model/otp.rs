//! Email verification by one-time code.
//!
//! A user starts out [`VerificationStatus::Unverified`] holding either no code
//! or exactly one pending code with its expiry. Issuing replaces the pending
//! code; a successful verification moves the user to the terminal
//! [`VerificationStatus::Verified`] state and drops the code, so a consumed
//! code can never be replayed. Expiry is not stored as a state of its own, it
//! is evaluated against the clock whenever a code is checked.

use crate::util::serialize_timestamp;
use rand::Rng;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use std::{
    fmt::{Debug, Formatter},
    ops::RangeInclusive,
    str::FromStr,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const OTP_CODE_LEN: usize = 6;
pub const OTP_CODE_RANGE: RangeInclusive<u32> = 100_000..=999_999;
pub const OTP_VALIDITY: Duration = Duration::minutes(10);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("An OTP code must be exactly six ASCII digits")]
pub struct InvalidOtpCodeError;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("OTP code and expiry must be both present or both absent, and absent once verified")]
pub struct InvalidVerificationStateError;

/// Why a code could not be issued or verified.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum OtpError {
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("No verification code was issued")]
    NoCodeIssued,
    #[error("The verification code has expired")]
    Expired,
    #[error("The verification code does not match")]
    Mismatch,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct OtpCode(String);

impl OtpCode {
    /// Samples a code uniformly from [`OTP_CODE_RANGE`].
    #[must_use]
    pub fn generate() -> Self {
        let value = rand::rng().random_range(OTP_CODE_RANGE);
        Self(value.to_string())
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl FromStr for OtpCode {
    type Err = InvalidOtpCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == OTP_CODE_LEN && s.bytes().all(|byte| byte.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidOtpCodeError)
        }
    }
}

impl Debug for OtpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OtpCode").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PendingOtp {
    pub code: OtpCode,
    pub expires_at: UtcDateTime,
}

impl PendingOtp {
    #[must_use]
    pub fn issue(now: UtcDateTime) -> Self {
        Self {
            code: OtpCode::generate(),
            expires_at: now + OTP_VALIDITY,
        }
    }

    /// The expiry instant itself is still valid.
    #[must_use]
    pub fn is_expired_at(&self, now: UtcDateTime) -> bool {
        now > self.expires_at
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub enum OtpState {
    #[default]
    NoPendingCode,
    PendingCode(PendingOtp),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum VerificationStatus {
    Unverified(OtpState),
    Verified { verified_at: UtcDateTime },
}

impl Default for VerificationStatus {
    fn default() -> Self {
        Self::Unverified(OtpState::NoPendingCode)
    }
}

impl VerificationStatus {
    /// A fresh account holding a newly issued code.
    #[must_use]
    pub fn pending(now: UtcDateTime) -> Self {
        Self::Unverified(OtpState::PendingCode(PendingOtp::issue(now)))
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    #[must_use]
    pub fn pending_otp(&self) -> Option<&PendingOtp> {
        match self {
            Self::Unverified(OtpState::PendingCode(pending)) => Some(pending),
            Self::Unverified(OtpState::NoPendingCode) | Self::Verified { .. } => None,
        }
    }

    #[must_use]
    pub fn verified_at(&self) -> Option<UtcDateTime> {
        match self {
            Self::Verified { verified_at } => Some(*verified_at),
            Self::Unverified(_) => None,
        }
    }

    /// Replaces any pending code with a fresh one.
    pub fn issue(&mut self, now: UtcDateTime) -> Result<PendingOtp, OtpError> {
        if self.is_verified() {
            return Err(OtpError::AlreadyVerified);
        }

        let pending = PendingOtp::issue(now);
        *self = Self::Unverified(OtpState::PendingCode(pending.clone()));
        Ok(pending)
    }

    /// Checks `submitted` against the pending code and, on success, marks the
    /// user verified at `now`.
    ///
    /// The comparison is plain string equality.
    pub fn verify(&mut self, submitted: &OtpCode, now: UtcDateTime) -> Result<(), OtpError> {
        let pending = match self {
            Self::Verified { .. } => return Err(OtpError::AlreadyVerified),
            Self::Unverified(OtpState::NoPendingCode) => return Err(OtpError::NoCodeIssued),
            Self::Unverified(OtpState::PendingCode(pending)) => pending,
        };

        if pending.is_expired_at(now) {
            return Err(OtpError::Expired);
        }
        if pending.code != *submitted {
            return Err(OtpError::Mismatch);
        }

        *self = Self::Verified { verified_at: now };
        Ok(())
    }

    /// Rebuilds the status from its nullable column form.
    pub fn from_columns(
        otp_code: Option<String>,
        otp_expires_at: Option<UtcDateTime>,
        verified_at: Option<UtcDateTime>,
    ) -> Result<Self, InvalidVerificationStateError> {
        match (otp_code, otp_expires_at, verified_at) {
            (None, None, Some(verified_at)) => Ok(Self::Verified { verified_at }),
            (None, None, None) => Ok(Self::Unverified(OtpState::NoPendingCode)),
            (Some(code), Some(expires_at), None) => {
                let code = code.parse().map_err(|_| InvalidVerificationStateError)?;
                Ok(Self::Unverified(OtpState::PendingCode(PendingOtp {
                    code,
                    expires_at,
                })))
            }
            _ => Err(InvalidVerificationStateError),
        }
    }

    /// The `(otp_code, otp_expires_at, verified_at)` column form.
    #[must_use]
    pub fn to_columns(&self) -> (Option<&str>, Option<UtcDateTime>, Option<UtcDateTime>) {
        match self {
            Self::Verified { verified_at } => (None, None, Some(*verified_at)),
            Self::Unverified(OtpState::NoPendingCode) => (None, None, None),
            Self::Unverified(OtpState::PendingCode(pending)) => {
                (Some(pending.code.get()), Some(pending.expires_at), None)
            }
        }
    }
}

/// Only whether and when the user was verified is exposed; pending codes
/// never leave the server.
impl Serialize for VerificationStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        struct Timestamp(UtcDateTime);

        impl Serialize for Timestamp {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serialize_timestamp(&self.0, serializer)
            }
        }

        let mut state = serializer.serialize_struct("VerificationStatus", 2)?;
        state.serialize_field("isVerified", &self.is_verified())?;
        state.serialize_field("verifiedAt", &self.verified_at().map(Timestamp))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::otp::{
        OTP_CODE_LEN, OTP_CODE_RANGE, OTP_VALIDITY, OtpCode, OtpError, OtpState, PendingOtp,
        VerificationStatus,
    };
    use rstest::rstest;
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    const ISSUED_AT: UtcDateTime = utc_datetime!(2025-03-14 09:00);

    fn pending_with(code: &str) -> VerificationStatus {
        VerificationStatus::Unverified(OtpState::PendingCode(PendingOtp {
            code: code.parse().unwrap(),
            expires_at: ISSUED_AT + OTP_VALIDITY,
        }))
    }

    #[test]
    fn generated_codes_are_six_digits_in_range() {
        for _ in 0..10_000 {
            let code = OtpCode::generate();
            assert_eq!(code.get().len(), OTP_CODE_LEN);
            let value: u32 = code.get().parse().unwrap();
            assert!(OTP_CODE_RANGE.contains(&value), "{value} out of range");
        }
    }

    #[rstest]
    #[case("123456", true)]
    #[case("000000", true)]
    #[case("12345", false)]
    #[case("1234567", false)]
    #[case("12345a", false)]
    #[case(" 123456", false)]
    #[case("١٢٣٤٥٦", false)]
    fn code_parsing(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(input.parse::<OtpCode>().is_ok(), valid);
    }

    #[test]
    fn issue_sets_ten_minute_expiry() {
        let mut status = VerificationStatus::default();
        let pending = status.issue(ISSUED_AT).unwrap();

        assert_eq!(pending.expires_at, ISSUED_AT + Duration::minutes(10));
        assert_eq!(status.pending_otp(), Some(&pending));
        assert!(!status.is_verified());
    }

    #[test]
    fn reissue_replaces_pending_code() {
        let mut status = pending_with("111111");
        let later = ISSUED_AT + Duration::minutes(3);
        status.issue(later).unwrap();

        assert_eq!(
            status.pending_otp().unwrap().expires_at,
            later + OTP_VALIDITY
        );
    }

    #[test]
    fn issue_is_rejected_once_verified() {
        let mut status = VerificationStatus::Verified {
            verified_at: ISSUED_AT,
        };
        assert_eq!(status.issue(ISSUED_AT), Err(OtpError::AlreadyVerified));
    }

    #[test]
    fn verify_success_is_terminal_and_clears_the_code() {
        let mut status = pending_with("424242");
        let code: OtpCode = "424242".parse().unwrap();
        let now = ISSUED_AT + Duration::minutes(1);

        assert_eq!(status.verify(&code, now), Ok(()));
        assert_eq!(status, VerificationStatus::Verified { verified_at: now });
        assert_eq!(status.pending_otp(), None);

        assert_eq!(status.verify(&code, now), Err(OtpError::AlreadyVerified));
    }

    #[test]
    fn verify_without_pending_code() {
        let mut status = VerificationStatus::default();
        let code: OtpCode = "424242".parse().unwrap();

        assert_eq!(status.verify(&code, ISSUED_AT), Err(OtpError::NoCodeIssued));
    }

    #[rstest]
    #[case(Duration::minutes(9) + Duration::seconds(59), Ok(()))]
    #[case(Duration::minutes(10), Ok(()))]
    #[case(Duration::minutes(10) + Duration::seconds(1), Err(OtpError::Expired))]
    #[case(Duration::hours(2), Err(OtpError::Expired))]
    fn expiry_boundary(#[case] elapsed: Duration, #[case] expected: Result<(), OtpError>) {
        let mut status = pending_with("424242");
        let code: OtpCode = "424242".parse().unwrap();

        assert_eq!(status.verify(&code, ISSUED_AT + elapsed), expected);
    }

    #[test]
    fn expiry_is_checked_before_the_code() {
        let mut status = pending_with("424242");
        let wrong: OtpCode = "000000".parse().unwrap();

        assert_eq!(
            status.verify(&wrong, ISSUED_AT + Duration::hours(1)),
            Err(OtpError::Expired)
        );
    }

    #[test]
    fn mismatch_keeps_the_code_pending() {
        let mut status = pending_with("424242");
        let wrong: OtpCode = "424243".parse().unwrap();
        let right: OtpCode = "424242".parse().unwrap();

        assert_eq!(status.verify(&wrong, ISSUED_AT), Err(OtpError::Mismatch));
        assert!(status.pending_otp().is_some());
        assert_eq!(status.verify(&right, ISSUED_AT), Ok(()));
    }

    #[test]
    fn column_round_trip_and_pairing() {
        let expires_at = ISSUED_AT + OTP_VALIDITY;

        for status in [
            VerificationStatus::default(),
            pending_with("123456"),
            VerificationStatus::Verified {
                verified_at: ISSUED_AT,
            },
        ] {
            let (code, expires, verified) = status.to_columns();
            let rebuilt =
                VerificationStatus::from_columns(code.map(str::to_owned), expires, verified)
                    .unwrap();
            assert_eq!(rebuilt, status);
        }

        assert!(VerificationStatus::from_columns(Some("123456".to_owned()), None, None).is_err());
        assert!(VerificationStatus::from_columns(None, Some(expires_at), None).is_err());
        assert!(
            VerificationStatus::from_columns(
                Some("123456".to_owned()),
                Some(expires_at),
                Some(ISSUED_AT)
            )
            .is_err()
        );
        assert!(
            VerificationStatus::from_columns(Some("12345".to_owned()), Some(expires_at), None)
                .is_err()
        );
    }

    #[test]
    fn serialization_hides_the_code() {
        let json = serde_json::to_value(pending_with("123456")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "isVerified": false, "verifiedAt": null })
        );

        let verified = VerificationStatus::Verified {
            verified_at: utc_datetime!(2025-03-14 09:05),
        };
        assert_eq!(
            serde_json::to_value(verified).unwrap(),
            serde_json::json!({ "isVerified": true, "verifiedAt": "2025-03-14T09:05:00Z" })
        );
    }
}
