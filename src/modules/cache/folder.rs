// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        cache::thread::Thread,
        database::{async_find_impl, list_all_impl, manager::DB_MANAGER, upsert_impl},
        error::{code::ErrorCode, MailVaultResult},
    },
    raise_error, utc_now,
};
use native_db::transaction::RwTransaction;
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct Folder {
    /// The server-assigned identifier of the folder.
    #[primary_key]
    pub id: String,
    /// The decoded, human-readable name of the folder (e.g., "INBOX", "Archive").
    pub name: String,
    /// The semantic role of the folder, when the server reports one.
    /// Reconciliation rules only branch on Inbox/Snoozed/Draft/Trash.
    pub role: Option<FolderRole>,
    /// Number of threads in this folder with at least one unseen message,
    /// recomputed locally after every synchronization pass.
    pub unread_count_local: u32,
    /// Opaque delta cursor handed back by the remote feed; advanced by the
    /// driver once a pass commits.
    pub cursor: Option<String>,
    /// Unix timestamp in milliseconds of the last committed pass that touched
    /// this folder.
    pub last_updated_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum FolderRole {
    Inbox,
    Snoozed,
    Draft,
    Sent,
    Trash,
    Spam,
    Archive,
    Scheduled,
    CommercialMail,
}

impl Folder {
    pub fn new(id: &str, name: &str, role: Option<FolderRole>) -> Self {
        Folder {
            id: id.into(),
            name: name.into(),
            role,
            ..Default::default()
        }
    }

    pub async fn get(id: &str) -> MailVaultResult<Option<Folder>> {
        async_find_impl(DB_MANAGER.content_db(), id.to_string()).await
    }

    pub async fn get_by_role(role: FolderRole) -> MailVaultResult<Option<Folder>> {
        let folders = Self::list_all().await?;
        Ok(folders.into_iter().find(|f| f.role == Some(role)))
    }

    pub async fn list_all() -> MailVaultResult<Vec<Folder>> {
        list_all_impl(DB_MANAGER.content_db()).await
    }

    pub async fn upsert(folder: Folder) -> MailVaultResult<()> {
        upsert_impl(DB_MANAGER.content_db(), folder).await
    }

    pub(crate) fn get_tx(rw: &RwTransaction, id: &str) -> MailVaultResult<Option<Folder>> {
        rw.get()
            .primary::<Folder>(id.to_string())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
    }

    /// The folder set of a mailbox is small, so role resolution is a plain
    /// scan rather than an index lookup.
    pub(crate) fn get_by_role_tx(
        rw: &RwTransaction,
        role: FolderRole,
    ) -> MailVaultResult<Option<Folder>> {
        let scan = rw
            .scan()
            .primary::<Folder>()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        for folder in scan
            .all()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
        {
            let folder =
                folder.map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            if folder.role == Some(role) {
                return Ok(Some(folder));
            }
        }
        Ok(None)
    }

    pub(crate) fn upsert_tx(rw: &RwTransaction, folder: Folder) -> MailVaultResult<()> {
        rw.upsert(folder)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(())
    }

    /// Recomputes the local unread counter of a folder from its thread set
    /// and stamps the folder as refreshed.
    pub(crate) fn refresh_unread_count_tx(rw: &RwTransaction, id: &str) -> MailVaultResult<()> {
        let Some(mut folder) = Self::get_tx(rw, id)? else {
            return Ok(());
        };
        folder.unread_count_local = Thread::unread_count_tx(rw, id)?;
        folder.last_updated_at = Some(utc_now!());
        Self::upsert_tx(rw, folder)
    }
}
