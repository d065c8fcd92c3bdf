// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        cache::{
            folder::{Folder, FolderRole},
            manager::ThreadIndexManager,
            message::{Message, SnoozeState},
        },
        common::Addr,
        database::{
            async_find_impl, delete_impl, filter_by_secondary_key_impl, manager::DB_MANAGER,
            upsert_impl,
        },
        error::{code::ErrorCode, MailVaultResult},
    },
    raise_error,
};
use native_db::transaction::RwTransaction;
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

pub mod reactions;
pub mod recompute;
#[cfg(test)]
mod tests;

/// A consolidated conversation view scoped to one folder. Membership is held
/// as ordered message-uid references; every aggregate field below the
/// membership block is derived and recomputed after each structural change.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 3, version = 1)]
#[native_db]
pub struct Thread {
    /// Seeded from the founding message's uid.
    #[primary_key]
    pub uid: String,
    #[secondary_key]
    pub folder_id: String,
    /// Ordered member references (ascending `internal_date` after recompute).
    pub message_uids: Vec<String>,
    /// Messages recognized as copies of an already-present member; they only
    /// participate in unseen-count and snooze folding.
    pub duplicate_uids: Vec<String>,
    /// Sorted union of every normalized id contributed by members. Grows
    /// monotonically except at duplicate-thread removal.
    pub messages_ids: Vec<String>,
    pub unseen_messages_count: u32,
    pub from: Vec<Addr>,
    pub to: Vec<Addr>,
    pub subject: Option<String>,
    pub has_drafts: bool,
    pub is_favorite: bool,
    pub is_answered: bool,
    pub is_forwarded: bool,
    pub has_attachable: bool,
    pub number_of_scheduled_drafts: u32,
    pub snooze_state: Option<SnoozeState>,
    pub snooze_end_date: Option<i64>,
    pub snooze_uuid: Option<String>,
    /// True only when the chronologically last same-folder member is snoozed.
    pub is_last_inbox_message_snoozed: bool,
    /// Members minus reaction messages whose target lives in this thread.
    pub content_message_uids: Vec<String>,
    pub display_date: i64,
    pub internal_date: i64,
    /// Threads materialized from a cross-folder search query keep living even
    /// when no member matches their own folder.
    pub is_from_search: bool,
}

impl Thread {
    pub fn from_message(message: &Message) -> Thread {
        Thread {
            uid: message.uid.clone(),
            folder_id: message.folder_id.clone(),
            message_uids: vec![message.uid.clone()],
            messages_ids: message.message_ids.clone(),
            ..Default::default()
        }
    }

    pub fn merge_message_ids(&mut self, ids: &[String]) {
        self.messages_ids.extend(ids.iter().cloned());
        self.messages_ids.sort();
        self.messages_ids.dedup();
    }

    pub fn contains_message(&self, uid: &str) -> bool {
        self.message_uids.iter().any(|u| u == uid)
            || self.duplicate_uids.iter().any(|u| u == uid)
    }

    /// Detaches a message from both membership lists. Returns whether the
    /// thread actually referenced it.
    pub fn remove_member(&mut self, uid: &str) -> bool {
        let before = self.message_uids.len() + self.duplicate_uids.len();
        self.message_uids.retain(|u| u != uid);
        self.duplicate_uids.retain(|u| u != uid);
        before != self.message_uids.len() + self.duplicate_uids.len()
    }

    pub fn is_snoozed(&self) -> bool {
        self.snooze_state == Some(SnoozeState::Snoozed) && self.snooze_end_date.is_some()
    }

    /// Attaches one candidate message to this thread under the folder
    /// visibility rules. The candidate's normalized ids are merged
    /// unconditionally, even when the message itself is filtered out.
    pub(crate) fn add_message_with_conditions_tx(
        &mut self,
        rw: &RwTransaction,
        message: &Message,
    ) -> MailVaultResult<bool> {
        self.merge_message_ids(&message.message_ids);

        let folder_role = Folder::get_tx(rw, &self.folder_id)?.and_then(|f| f.role);

        // A deleted message must never resurrect in a view outside of Trash.
        if message.is_trashed && folder_role != Some(FolderRole::Trash) {
            return Ok(false);
        }

        let should_add_message = match folder_role {
            Some(FolderRole::Draft) => message.is_draft, // In Draft folder: only add draft Messages.
            Some(FolderRole::Trash) => message.is_trashed, // In Trash folder: only add deleted Messages.
            _ => true,
        };
        if !should_add_message {
            return Ok(false);
        }

        match self.find_twin_tx(rw, message)? {
            None => self.message_uids.push(message.uid.clone()),
            Some(twin) => self.add_duplicated_message(&twin, message),
        }
        Ok(true)
    }

    /// A twin is an already-admitted member carrying the same provider
    /// message id. Messages without a provider id never pair up.
    fn find_twin_tx(
        &self,
        rw: &RwTransaction,
        message: &Message,
    ) -> MailVaultResult<Option<Message>> {
        let Some(message_id) = message.message_id.as_deref() else {
            return Ok(None);
        };
        for uid in &self.message_uids {
            let Some(member) = Message::get_tx(rw, uid)? else {
                continue;
            };
            if member.message_id.as_deref() == Some(message_id) {
                return Ok(Some(member));
            }
        }
        Ok(None)
    }

    /// The message actually belonging to this thread's folder always wins the
    /// primary slot; the other copy is demoted to `duplicate_uids`.
    fn add_duplicated_message(&mut self, twin: &Message, new_message: &Message) {
        let is_twin_the_real_message = twin.folder_id == self.folder_id;
        if is_twin_the_real_message {
            self.duplicate_uids.push(new_message.uid.clone());
        } else {
            self.message_uids.retain(|uid| uid != &twin.uid);
            self.duplicate_uids.push(twin.uid.clone());
            self.message_uids.push(new_message.uid.clone());
        }
    }

    pub async fn get(uid: &str) -> MailVaultResult<Option<Thread>> {
        async_find_impl(DB_MANAGER.content_db(), uid.to_string()).await
    }

    /// Folder thread listing for display purposes, most recent first.
    pub async fn get_by_folder(folder_id: &str) -> MailVaultResult<Vec<Thread>> {
        let folder_id = folder_id.to_string();
        let mut threads: Vec<Thread> = filter_by_secondary_key_impl(
            DB_MANAGER.content_db(),
            ThreadKey::folder_id,
            folder_id.clone(),
        )
        .await?;
        threads.retain(|t| t.folder_id == folder_id && !t.is_from_search);
        threads.sort_by_key(|t| std::cmp::Reverse(t.internal_date));
        Ok(threads)
    }

    pub async fn get_by_message_ids(ids: &[String]) -> MailVaultResult<Vec<Thread>> {
        let mut threads = Vec::new();
        for uid in ThreadIndexManager::threads_matching(ids) {
            if let Some(thread) = Self::get(&uid).await? {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    pub async fn upsert(thread: Thread) -> MailVaultResult<()> {
        ThreadIndexManager::index_thread(&thread.uid, &thread.messages_ids);
        upsert_impl(DB_MANAGER.content_db(), thread).await
    }

    pub async fn delete(uid: &str) -> MailVaultResult<()> {
        let uid = uid.to_string();
        delete_impl(DB_MANAGER.content_db(), move |rw| {
            let thread = Thread::get_tx(rw, &uid)?.ok_or_else(|| {
                raise_error!(
                    format!("Thread '{}' is not cached", uid),
                    ErrorCode::ResourceNotFound
                )
            })?;
            ThreadIndexManager::forget_thread(&thread.uid, &thread.messages_ids);
            Ok(thread)
        })
        .await
    }

    pub(crate) fn get_tx(rw: &RwTransaction, uid: &str) -> MailVaultResult<Option<Thread>> {
        rw.get()
            .primary::<Thread>(uid.to_string())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
    }

    pub(crate) fn upsert_tx(rw: &RwTransaction, thread: &Thread) -> MailVaultResult<()> {
        rw.upsert(thread.clone())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        ThreadIndexManager::index_thread(&thread.uid, &thread.messages_ids);
        Ok(())
    }

    pub(crate) fn delete_tx(rw: &RwTransaction, thread: Thread) -> MailVaultResult<()> {
        ThreadIndexManager::forget_thread(&thread.uid, &thread.messages_ids);
        rw.remove(thread)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(())
    }

    pub(crate) fn list_by_folder_tx(
        rw: &RwTransaction,
        folder_id: &str,
    ) -> MailVaultResult<Vec<Thread>> {
        let mut threads = Vec::new();
        let scan = rw
            .scan()
            .secondary::<Thread>(ThreadKey::folder_id)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        for thread in scan
            .start_with(folder_id.to_string())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
        {
            let thread =
                thread.map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            // `start_with` is prefix-based, so an exact-id filter is still needed.
            if thread.folder_id == folder_id {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    /// Candidate threads overlapping `ids`, verified against the store so
    /// that index entries surviving an aborted transaction are harmless.
    pub(crate) fn get_by_message_ids_tx(
        rw: &RwTransaction,
        ids: &[String],
    ) -> MailVaultResult<Vec<Thread>> {
        let mut threads = Vec::new();
        for uid in ThreadIndexManager::threads_matching(ids) {
            if let Some(thread) = Self::get_tx(rw, &uid)? {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    /// Every thread holding `message` as a member or duplicate. Messages
    /// without any normalized id can only live in the thread they founded.
    pub(crate) fn threads_referencing_tx(
        rw: &RwTransaction,
        message: &Message,
    ) -> MailVaultResult<Vec<Thread>> {
        let mut threads = Self::get_by_message_ids_tx(rw, &message.message_ids)?;
        if threads.is_empty() {
            if let Some(thread) = Self::get_tx(rw, &message.uid)? {
                threads.push(thread);
            }
        }
        threads.retain(|t| t.contains_message(&message.uid));
        Ok(threads)
    }

    /// The Inbox and Snoozed views share the Inbox folder's thread rows and
    /// partition them by snooze relevance.
    pub(crate) fn inbox_threads_with_snooze_filter_tx(
        rw: &RwTransaction,
        with_snooze: bool,
    ) -> MailVaultResult<Vec<Thread>> {
        let Some(inbox) = Folder::get_by_role_tx(rw, FolderRole::Inbox)? else {
            return Ok(Vec::new());
        };
        let mut threads = Self::list_by_folder_tx(rw, &inbox.id)?;
        threads.retain(|t| t.is_snoozed() == with_snooze);
        Ok(threads)
    }

    pub(crate) fn unread_count_tx(rw: &RwTransaction, folder_id: &str) -> MailVaultResult<u32> {
        let threads = Self::list_by_folder_tx(rw, folder_id)?;
        Ok(threads
            .iter()
            .filter(|t| !t.is_from_search && t.unseen_messages_count > 0)
            .count() as u32)
    }
}
