// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

pub mod modules;

use crate::modules::{
    cache::manager::ThreadIndexManager, context::Initialize, database::manager::DatabaseManager,
    error::MailVaultResult, settings::dir::DataDirManager,
};
use tracing::info;

pub use crate::modules::cache::sync::{FolderSynchronizer, SyncAbort, SyncOutcome};
pub use crate::modules::error::{MailVaultError, MailVaultResult as Result};
pub use crate::modules::logger::initialize_logging;

/// Prepare the cache for use: data directories, content database, and the
/// in-memory message-id index. Must run once before any synchronization pass.
pub async fn initialize() -> MailVaultResult<()> {
    info!("Initializing mailvault {}", mailvault_version!());
    DataDirManager::initialize().await?;
    DatabaseManager::initialize().await?;
    ThreadIndexManager::initialize().await?;
    Ok(())
}
