// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use ahash::AHashSet;
use dashmap::DashMap;
use std::sync::{Arc, LazyLock};

use crate::modules::cache::message::Message;
use crate::modules::cache::thread::Thread;
use crate::modules::context::Initialize;
use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::list_all_impl;
use crate::modules::error::MailVaultResult;
use native_db::Database;

/// Global reverse index: normalized message-id -> uids of the threads whose
/// `messages_ids` contain it.
pub static THREAD_ID_INDEX: LazyLock<DashMap<String, AHashSet<String>>> =
    LazyLock::new(DashMap::new);

/// Global reverse index: normalized message-id -> uids of the message rows
/// that carry it.
pub static MESSAGE_ID_INDEX: LazyLock<DashMap<String, AHashSet<String>>> =
    LazyLock::new(DashMap::new);

/// The persistent store cannot index a set-valued field, so the message-id ->
/// owner relation lives here, rebuilt from the store at startup and updated
/// inline by every upsert/delete. Entries may briefly outlive an aborted
/// write transaction; lookups therefore verify every candidate uid against
/// the store and drop the ones that do not resolve.
pub struct ThreadIndexManager;

impl Initialize for ThreadIndexManager {
    async fn initialize() -> MailVaultResult<()> {
        Self::load_state(DB_MANAGER.content_db()).await
    }
}

impl ThreadIndexManager {
    /// Full rebuild at startup: drop whatever is in memory and re-index the
    /// committed store.
    pub async fn load_state(database: &Arc<Database<'static>>) -> MailVaultResult<()> {
        Self::clear();
        Self::reindex_from_store(database).await
    }

    /// Additive re-index, used after an aborted write transaction: a rolled
    /// back deletion may have dropped entries for records that still exist.
    /// Entries for records that were never committed are left in place; they
    /// are filtered out at lookup time by store verification.
    pub async fn reindex_from_store(database: &Arc<Database<'static>>) -> MailVaultResult<()> {
        let (threads, messages) = futures::future::try_join(
            list_all_impl::<Thread>(database),
            list_all_impl::<Message>(database),
        )
        .await?;

        for thread in &threads {
            Self::index_thread(&thread.uid, &thread.messages_ids);
        }
        for message in &messages {
            Self::index_message(&message.uid, &message.message_ids);
        }
        tracing::debug!(
            "Re-indexed message ids: {} threads, {} messages",
            threads.len(),
            messages.len()
        );
        Ok(())
    }

    pub fn clear() {
        THREAD_ID_INDEX.clear();
        MESSAGE_ID_INDEX.clear();
    }

    pub fn index_thread(thread_uid: &str, message_ids: &[String]) {
        for id in message_ids {
            THREAD_ID_INDEX
                .entry(id.clone())
                .or_default()
                .insert(thread_uid.to_string());
        }
    }

    pub fn forget_thread(thread_uid: &str, message_ids: &[String]) {
        for id in message_ids {
            if let Some(mut uids) = THREAD_ID_INDEX.get_mut(id) {
                uids.remove(thread_uid);
            }
        }
    }

    pub fn index_message(message_uid: &str, message_ids: &[String]) {
        for id in message_ids {
            MESSAGE_ID_INDEX
                .entry(id.clone())
                .or_default()
                .insert(message_uid.to_string());
        }
    }

    pub fn forget_message(message_uid: &str, message_ids: &[String]) {
        for id in message_ids {
            if let Some(mut uids) = MESSAGE_ID_INDEX.get_mut(id) {
                uids.remove(message_uid);
            }
        }
    }

    /// Candidate thread uids overlapping `ids`, sorted so that the
    /// first-encountered thread of a duplicate group is stable across runs.
    pub fn threads_matching(ids: &[String]) -> Vec<String> {
        Self::matching(&THREAD_ID_INDEX, ids)
    }

    pub fn messages_matching(ids: &[String]) -> Vec<String> {
        Self::matching(&MESSAGE_ID_INDEX, ids)
    }

    fn matching(index: &DashMap<String, AHashSet<String>>, ids: &[String]) -> Vec<String> {
        let mut uids = AHashSet::new();
        for id in ids {
            if let Some(entry) = index.get(id) {
                uids.extend(entry.iter().cloned());
            }
        }
        let mut uids: Vec<String> = uids.into_iter().collect();
        uids.sort();
        uids
    }
}
