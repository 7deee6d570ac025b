//! One-time password reset codes.
//!
//! Codes are six random digits. Only their SHA-256 digest is stored; the
//! plaintext goes to the user through an [`OtpNotifier`].

use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of digits in a reset code.
pub const OTP_LENGTH: usize = 6;

/// Delivery failure reported by a notifier.
#[derive(Error, Debug)]
#[error("failed to deliver reset code: {0}")]
pub struct NotifyError(pub String);

/// Delivers reset codes to users (email in production).
pub trait OtpNotifier: Send + Sync {
    /// Send `code` to `email`.
    fn send_otp(&self, email: &str, code: &str) -> Result<(), NotifyError>;
}

/// Development notifier that writes the code to the log.
///
/// This is the one place a reset code appears in logs; configure a real
/// notifier for any shared deployment.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl OtpNotifier for LogNotifier {
    fn send_otp(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        tracing::info!(email = %email, code = %code, "Password reset code issued");
        Ok(())
    }
}

/// Generate a fresh numeric reset code.
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Digest of a code as stored in the user record.
pub fn hash_otp(code: &str) -> String {
    let digest = Sha256::digest(code.trim().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check a candidate code against a stored digest.
///
/// The comparison runs over the full digest regardless of where the first
/// difference is.
pub fn verify_otp(candidate: &str, stored_hash: &str) -> bool {
    let candidate = hash_otp(candidate);
    if candidate.len() != stored_hash.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(stored_hash.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Whether a code issued at `issued_at` is still valid at `now`.
pub fn is_otp_fresh(issued_at: i64, now: i64, ttl_secs: u64) -> bool {
    now.saturating_sub(issued_at) < ttl_secs as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_otp_format() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_generate_otp_varies() {
        let codes: std::collections::HashSet<String> = (0..20).map(|_| generate_otp()).collect();
        assert!(codes.len() > 1);
    }

    #[test]
    fn test_hash_otp_is_hex_sha256() {
        let hash = hash_otp("123456");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_otp(" 123456 "));
        assert_ne!(hash, hash_otp("123457"));
    }

    #[test]
    fn test_verify_otp() {
        let stored = hash_otp("042917");
        assert!(verify_otp("042917", &stored));
        assert!(!verify_otp("042918", &stored));
        assert!(!verify_otp("", &stored));
        assert!(!verify_otp("042917", "short"));
    }

    #[test]
    fn test_is_otp_fresh() {
        assert!(is_otp_fresh(1_000, 1_000, 600));
        assert!(is_otp_fresh(1_000, 1_599, 600));
        assert!(!is_otp_fresh(1_000, 1_600, 600));
        assert!(!is_otp_fresh(1_000, 5_000, 600));
    }

    #[test]
    fn test_log_notifier_succeeds() {
        assert!(LogNotifier.send_otp("ada@uni.example", "123456").is_ok());
    }
}
