// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use code::ErrorCode;
use snafu::{Location, Snafu};

pub mod code;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MailVaultError {
    #[snafu(display("{message}"))]
    Generic {
        message: String,
        #[snafu(implicit)]
        location: Location,
        code: ErrorCode,
    },
}

pub type MailVaultResult<T, E = MailVaultError> = std::result::Result<T, E>;

impl MailVaultError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MailVaultError::Generic { code, .. } => *code,
        }
    }

    /// Cooperative cancellation surfaces as an error so that the enclosing
    /// write transaction is dropped uncommitted; callers treat it as a clean
    /// abort, not a failure.
    pub fn is_cancellation(&self) -> bool {
        self.code() == ErrorCode::SyncCancelled
    }
}
