// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

#[macro_export]
macro_rules! mailvault_version {
    () => {
        env!("CARGO_PKG_VERSION")
    };
}

#[macro_export]
macro_rules! utc_now {
    () => {{
        use chrono::Utc;
        Utc::now().timestamp_millis()
    }};
}

#[macro_export]
macro_rules! raise_error {
    ($msg:expr, $code:expr) => {
        $crate::modules::error::MailVaultError::Generic {
            message: $msg,
            location: snafu::Location::default(),
            code: $code,
        }
    };
}

/// Stable fingerprint over a message's flag bits, used to skip no-op flag
/// updates during delta application.
pub fn flags_fingerprint(bits: &[bool]) -> u64 {
    let buffer: Vec<u8> = bits.iter().map(|b| *b as u8).collect();
    let mut cursor = std::io::Cursor::new(buffer);
    let hash = murmur3::murmur3_x64_128(&mut cursor, 0).unwrap();
    hash as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_fingerprint_changes_with_bits() {
        let a = flags_fingerprint(&[true, false, false]);
        let b = flags_fingerprint(&[false, false, false]);
        assert_ne!(a, b);
        assert_eq!(a, flags_fingerprint(&[true, false, false]));
    }
}
