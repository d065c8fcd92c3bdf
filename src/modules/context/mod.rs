// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::MailVaultResult;

/// One-time startup hook for subsystems that own global state.
pub trait Initialize {
    fn initialize() -> impl std::future::Future<Output = MailVaultResult<()>> + Send;
}
