// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::cache::folder::{Folder, FolderRole};
use crate::modules::cache::manager::ThreadIndexManager;
use crate::modules::cache::message::{Message, MessageFlags};
use crate::modules::cache::sync::strategy::SyncStrategy;
use crate::modules::cache::thread::{recompute::recompute_thread_tx, Thread};
use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{list_all_tx, with_transaction};
use crate::modules::error::{code::ErrorCode, MailVaultResult};
use crate::modules::settings::cli::SETTINGS;
use crate::raise_error;
use ahash::AHashSet;
use native_db::transaction::RwTransaction;
use native_db::Database;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) mod admission;
pub mod strategy;

/// Cooperative cancellation handle for one synchronization pass. Cancelling
/// aborts the in-flight write transaction uncommitted: the store keeps the
/// state of the last fully-committed pass, never a partial one.
#[derive(Clone, Debug, Default)]
pub struct SyncAbort(Arc<AtomicBool>);

impl SyncAbort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn ensure_active(&self) -> MailVaultResult<()> {
        if self.is_cancelled() {
            return Err(raise_error!(
                "Synchronization pass cancelled".into(),
                ErrorCode::SyncCancelled
            ));
        }
        Ok(())
    }
}

/// Accumulator of threads requiring recomputation, merged explicitly across
/// the admission sub-steps.
#[derive(Debug, Default)]
pub struct ImpactedThreads {
    uids: AHashSet<String>,
}

impl ImpactedThreads {
    pub fn insert(&mut self, uid: String) {
        self.uids.insert(uid);
    }

    pub fn remove(&mut self, uid: &str) {
        self.uids.remove(uid);
    }

    pub fn merge(&mut self, other: ImpactedThreads) {
        self.uids.extend(other.uids);
    }

    /// Deterministic iteration order for the recompute stage.
    pub fn sorted_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = self.uids.iter().cloned().collect();
        uids.sort();
        uids
    }
}

/// Folders whose local unread counter must be refreshed, gathered as plain
/// ids plus roles resolved against the store at flush time (a role may need
/// refreshing even when no touched thread lives in it).
#[derive(Debug, Default)]
pub struct ImpactedFolders {
    ids: AHashSet<String>,
    roles: AHashSet<FolderRole>,
}

impl ImpactedFolders {
    pub fn add_id(&mut self, folder_id: &str) {
        self.ids.insert(folder_id.to_string());
    }

    pub fn add_role(&mut self, role: FolderRole) {
        self.roles.insert(role);
    }

    pub(crate) fn resolve_tx(&self, rw: &RwTransaction) -> MailVaultResult<Vec<String>> {
        let mut ids = self.ids.clone();
        for role in &self.roles {
            if let Some(folder) = Folder::get_by_role_tx(rw, *role)? {
                ids.insert(folder.id);
            }
        }
        let mut ids: Vec<String> = ids.into_iter().collect();
        ids.sort();
        Ok(ids)
    }
}

/// What one committed pass touched, for the driver to act on (UI refresh,
/// notification decisions).
#[derive(Clone, Debug, Default)]
pub struct SyncOutcome {
    /// Uids of the threads that survived recomputation.
    pub impacted_threads: Vec<String>,
    /// Ids of the folders whose unread counter was refreshed.
    pub impacted_folders: Vec<String>,
}

/// Applies one folder's remote delta (added / deleted / flag-updated message
/// uids) to the local cache. Serialized by the caller: one pass per mailbox
/// folder in flight at a time, each `apply_*` call being one transactional
/// write scope.
pub struct FolderSynchronizer {
    db: Arc<Database<'static>>,
    /// The local user's own addresses, needed to mark reactions as "mine".
    user_addresses: Vec<String>,
    is_conversation_mode: bool,
}

impl FolderSynchronizer {
    pub fn new(db: Arc<Database<'static>>, user_addresses: Vec<String>) -> Self {
        FolderSynchronizer {
            db,
            user_addresses,
            is_conversation_mode: SETTINGS.mailvault_conversation_mode,
        }
    }

    /// Synchronizer over the globally managed content database.
    pub fn from_manager(user_addresses: Vec<String>) -> Self {
        Self::new(DB_MANAGER.content_db().clone(), user_addresses)
    }

    pub fn with_conversation_mode(mut self, enabled: bool) -> Self {
        self.is_conversation_mode = enabled;
        self
    }

    /// Admits a batch of freshly fetched messages in server-reported order,
    /// recomputes every impacted thread, and refreshes unread counters.
    pub async fn apply_added_messages(
        &self,
        folder: &Folder,
        remote_messages: Vec<Message>,
        abort: &SyncAbort,
    ) -> MailVaultResult<SyncOutcome> {
        if remote_messages.is_empty() {
            return Ok(SyncOutcome::default());
        }
        info!(
            "Folder '{}': {} added message(s) to reconcile",
            folder.name,
            remote_messages.len()
        );

        let folder = folder.clone();
        let abort = abort.clone();
        let user_addresses = self.user_addresses.clone();
        let is_conversation_mode = self.is_conversation_mode;

        let result = with_transaction(&self.db, move |rw| {
            let strategy = SyncStrategy::for_role(folder.role);
            let physical_folder = strategy.resolve_physical_folder(rw, &folder)?;
            let mut impacted = ImpactedThreads::default();

            for mut remote_message in remote_messages {
                abort.ensure_active()?;

                remote_message.init_local_values(&physical_folder);
                impacted.merge(strategy.handle_added_message(
                    rw,
                    &remote_message,
                    is_conversation_mode,
                    &abort,
                )?);
            }

            let mut impacted_folders = ImpactedFolders::default();
            strategy.add_folder_to_impacted_folders(&folder.id, &mut impacted_folders);

            let mut recomputed = Vec::new();
            for uid in impacted.sorted_uids() {
                abort.ensure_active()?;

                if let Some(thread) = Thread::get_tx(rw, &uid)? {
                    strategy.add_folder_to_impacted_folders(&thread.folder_id, &mut impacted_folders);
                    if let Some(thread) = recompute_thread_tx(rw, thread, &user_addresses)? {
                        recomputed.push(thread.uid);
                    }
                }
            }

            finish_pass(rw, recomputed, &impacted_folders)
        })
        .await;

        self.recover_index_on_failure(&result).await;
        result
    }

    /// Applies a batch of deletion notifications. What "deleted" means is
    /// folder-specific: a Snoozed deletion is a wake-up, not a removal.
    pub async fn apply_deleted_uids(
        &self,
        folder: &Folder,
        deleted_short_uids: Vec<String>,
        abort: &SyncAbort,
    ) -> MailVaultResult<SyncOutcome> {
        if deleted_short_uids.is_empty() {
            return Ok(SyncOutcome::default());
        }
        info!(
            "Folder '{}': {} deleted uid(s) to reconcile",
            folder.name,
            deleted_short_uids.len()
        );

        let folder = folder.clone();
        let abort = abort.clone();
        let user_addresses = self.user_addresses.clone();

        let result = with_transaction(&self.db, move |rw| {
            let strategy = SyncStrategy::for_role(folder.role);
            let mut impacted_folders = ImpactedFolders::default();
            let mut impacted = ImpactedThreads::default();

            for short_uid in deleted_short_uids {
                abort.ensure_active()?;

                let Some(message) =
                    strategy.get_message_from_short_uid(rw, &short_uid, &folder.id)?
                else {
                    debug!(
                        "Folder '{}': deleted uid '{}' is not cached, nothing to reconcile",
                        folder.name, short_uid
                    );
                    continue;
                };
                impacted.merge(strategy.process_deleted_message(
                    rw,
                    message,
                    &mut impacted_folders,
                )?);
            }

            let mut recomputed = Vec::new();
            let mut seen = AHashSet::new();
            for uid in impacted.sorted_uids() {
                abort.ensure_active()?;

                if let Some(thread) = Thread::get_tx(rw, &uid)? {
                    if let Some(thread) =
                        strategy.process_deleted_thread(rw, thread, &user_addresses)?
                    {
                        seen.insert(thread.uid.clone());
                        recomputed.push(thread.uid);
                    }
                }
            }

            // The Snoozed view is derived state: any deletion can change which
            // threads still belong to it, so the whole set is refreshed.
            if strategy.should_query_folder_threads_on_deleted_uid() {
                for thread in strategy.query_folder_threads(rw, &folder.id)? {
                    abort.ensure_active()?;

                    if seen.contains(&thread.uid) {
                        continue;
                    }
                    if let Some(thread) = recompute_thread_tx(rw, thread, &user_addresses)? {
                        seen.insert(thread.uid.clone());
                        recomputed.push(thread.uid);
                    }
                }
            }

            strategy.add_folder_to_impacted_folders(&folder.id, &mut impacted_folders);
            finish_pass(rw, recomputed, &impacted_folders)
        })
        .await;

        self.recover_index_on_failure(&result).await;
        result
    }

    /// Applies flag deltas to already-cached messages and recomputes the
    /// threads that aggregate them. No-op deltas are skipped by fingerprint.
    pub async fn apply_updated_messages(
        &self,
        folder: &Folder,
        flag_updates: Vec<(String, MessageFlags)>,
        abort: &SyncAbort,
    ) -> MailVaultResult<SyncOutcome> {
        if flag_updates.is_empty() {
            return Ok(SyncOutcome::default());
        }
        debug!(
            "Folder '{}': {} flag update(s) to reconcile",
            folder.name,
            flag_updates.len()
        );

        let folder = folder.clone();
        let abort = abort.clone();
        let user_addresses = self.user_addresses.clone();

        let result = with_transaction(&self.db, move |rw| {
            let strategy = SyncStrategy::for_role(folder.role);
            let mut impacted = ImpactedThreads::default();

            for (short_uid, flags) in flag_updates {
                abort.ensure_active()?;

                let uid = Message::long_uid(&short_uid, &folder.id);
                let Some(mut message) = Message::get_tx(rw, &uid)? else {
                    continue;
                };
                if message.flags_hash == flags.fingerprint() {
                    continue;
                }
                message.apply_flags(&flags);
                Message::upsert_tx(rw, &message)?;
                for thread in Thread::threads_referencing_tx(rw, &message)? {
                    impacted.insert(thread.uid);
                }
            }

            let mut impacted_folders = ImpactedFolders::default();
            strategy.add_folder_to_impacted_folders(&folder.id, &mut impacted_folders);

            let mut recomputed = Vec::new();
            for uid in impacted.sorted_uids() {
                abort.ensure_active()?;

                if let Some(thread) = Thread::get_tx(rw, &uid)? {
                    strategy.add_folder_to_impacted_folders(&thread.folder_id, &mut impacted_folders);
                    if let Some(thread) = recompute_thread_tx(rw, thread, &user_addresses)? {
                        recomputed.push(thread.uid);
                    }
                }
            }

            finish_pass(rw, recomputed, &impacted_folders)
        })
        .await;

        self.recover_index_on_failure(&result).await;
        result
    }

    /// The thread set a folder view should display, per its reconciliation
    /// policy. Drivers re-query this for the folder itself and for every
    /// `twin_folder_roles()` of its strategy.
    pub async fn query_folder_threads(&self, folder: &Folder) -> MailVaultResult<Vec<Thread>> {
        let folder = folder.clone();
        with_transaction(&self.db, move |rw| {
            let strategy = SyncStrategy::for_role(folder.role);
            strategy.query_folder_threads(rw, &folder.id)
        })
        .await
    }

    /// Standalone duplicate-thread resolution, run after a full folder
    /// resync: collapses same-folder threads overlapping on `message_ids`
    /// down to the first of each folder group. Returns how many were removed.
    pub async fn resolve_duplicate_threads(
        &self,
        message_ids: Vec<String>,
    ) -> MailVaultResult<usize> {
        let result = with_transaction(&self.db, move |rw| {
            let extras = admission::identify_extra_duplicated_threads(rw, &message_ids)?;
            let count = extras.len();
            for thread in extras {
                Thread::delete_tx(rw, thread)?;
            }
            Ok(count)
        })
        .await;
        self.recover_index_on_failure(&result).await;
        result
    }

    /// Maintenance sweep: drops threads whose folder no longer exists and
    /// messages no thread references anymore. Returns how many records were
    /// removed.
    pub async fn remove_orphans(&self) -> MailVaultResult<usize> {
        let result = with_transaction(&self.db, move |rw| {
            let mut removed = 0;

            for thread in list_all_tx::<Thread>(rw)? {
                if Folder::get_tx(rw, &thread.folder_id)?.is_none() {
                    warn!(
                        "Thread '{}' points at unknown folder '{}', removing it",
                        thread.uid, thread.folder_id
                    );
                    Thread::delete_tx(rw, thread)?;
                    removed += 1;
                }
            }

            for message in list_all_tx::<Message>(rw)? {
                if Thread::threads_referencing_tx(rw, &message)?.is_empty() {
                    warn!("Message '{}' belongs to no thread, removing it", message.uid);
                    Message::delete_tx(rw, message)?;
                    removed += 1;
                }
            }

            Ok(removed)
        })
        .await;
        self.recover_index_on_failure(&result).await;
        result
    }

    /// The in-memory index is updated inline during a pass; after an aborted
    /// or cancelled transaction it may reference records that were never
    /// committed (harmless, lookups are store-verified) or miss records whose
    /// deletion rolled back. Rebuilding restores exactness.
    async fn recover_index_on_failure<T>(&self, result: &MailVaultResult<T>) {
        let Err(error) = result else {
            return;
        };
        if !error.is_cancellation() {
            warn!("Synchronization pass failed: {error}");
        }
        if let Err(reload_error) = ThreadIndexManager::reindex_from_store(&self.db).await {
            warn!("Failed to re-index message ids after an aborted pass: {reload_error}");
        }
    }
}

fn finish_pass(
    rw: &RwTransaction,
    recomputed: Vec<String>,
    impacted_folders: &ImpactedFolders,
) -> MailVaultResult<SyncOutcome> {
    let folder_ids = impacted_folders.resolve_tx(rw)?;
    for folder_id in &folder_ids {
        Folder::refresh_unread_count_tx(rw, folder_id)?;
    }
    Ok(SyncOutcome {
        impacted_threads: recomputed,
        impacted_folders: folder_ids,
    })
}
