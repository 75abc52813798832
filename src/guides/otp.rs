use rand::Rng;
use time::{Duration, OffsetDateTime};

use crate::guides::repo_types::EmailOtp;

pub const OTP_TTL: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpError {
    #[error("Not found")]
    NotFound,
    #[error("Invalid OTP")]
    Mismatch,
    #[error("Expired OTP")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    AlreadyVerified,
    Verified,
}

/// Six-digit code, uniform over 100000..=999999.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn otp_message(code: &str) -> String {
    format!("Your OTP is {code}. It will expire in 5 minutes.")
}

/// Decide the outcome of a verification attempt.
///
/// A verified record short-circuits. The code is compared before the expiry.
pub fn check(
    record: Option<&EmailOtp>,
    submitted: &str,
    now: OffsetDateTime,
) -> Result<OtpCheck, OtpError> {
    let record = record.ok_or(OtpError::NotFound)?;
    if record.verified {
        return Ok(OtpCheck::AlreadyVerified);
    }
    if record.otp != submitted {
        return Err(OtpError::Mismatch);
    }
    if record.expires_at < now {
        return Err(OtpError::Expired);
    }
    Ok(OtpCheck::Verified)
}
