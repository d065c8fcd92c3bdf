// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::cache::sync::admission;
use crate::modules::cache::sync::{ImpactedFolders, ImpactedThreads, SyncAbort};
use crate::modules::cache::{
    folder::{Folder, FolderRole},
    message::Message,
    thread::{recompute::recompute_thread_tx, Thread},
};
use crate::modules::error::{code::ErrorCode, MailVaultResult};
use crate::raise_error;
use native_db::transaction::RwTransaction;
use tracing::debug;

/// Per-folder reconciliation policy. Folder roles fall into three behavior
/// classes; everything not Inbox or Snoozed reconciles the default way
/// (Draft/Trash specifics live in the admission visibility rules).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SyncStrategy {
    Default,
    Inbox,
    Snoozed,
}

impl SyncStrategy {
    pub fn for_role(role: Option<FolderRole>) -> SyncStrategy {
        match role {
            Some(FolderRole::Inbox) => SyncStrategy::Inbox,
            Some(FolderRole::Snoozed) => SyncStrategy::Snoozed,
            _ => SyncStrategy::Default,
        }
    }

    /// Folder roles whose thread sets must be re-queried whenever this folder
    /// changes. A uid transitioning into or out of Snooze must appear or
    /// disappear on both sides, so Inbox and Snoozed are mutual twins.
    pub fn twin_folder_roles(&self) -> &'static [FolderRole] {
        match self {
            SyncStrategy::Inbox => &[FolderRole::Snoozed],
            SyncStrategy::Snoozed => &[FolderRole::Inbox],
            SyncStrategy::Default => &[],
        }
    }

    /// The Snoozed folder disappears from the folder list when it has no
    /// relevant thread left.
    pub fn should_hide_empty_folder(&self) -> bool {
        matches!(self, SyncStrategy::Snoozed)
    }

    /// Snoozed membership is derived from message state rather than a stable
    /// folder id, so every deletion invalidates the whole view.
    pub fn should_query_folder_threads_on_deleted_uid(&self) -> bool {
        matches!(self, SyncStrategy::Snoozed)
    }

    /// A message reported by the Snoozed folder physically lives in the
    /// Inbox; every other folder owns its messages directly.
    pub(crate) fn resolve_physical_folder(
        &self,
        rw: &RwTransaction,
        folder: &Folder,
    ) -> MailVaultResult<Folder> {
        match self {
            SyncStrategy::Snoozed => Folder::get_by_role_tx(rw, FolderRole::Inbox)?.ok_or_else(|| {
                raise_error!(
                    "Snoozed reconciliation requires an Inbox folder".into(),
                    ErrorCode::MissingConfiguration
                )
            }),
            _ => Ok(folder.clone()),
        }
    }

    pub(crate) fn query_folder_threads(
        &self,
        rw: &RwTransaction,
        folder_id: &str,
    ) -> MailVaultResult<Vec<Thread>> {
        match self {
            SyncStrategy::Default => Thread::list_by_folder_tx(rw, folder_id),
            SyncStrategy::Inbox => Thread::inbox_threads_with_snooze_filter_tx(rw, false),
            SyncStrategy::Snoozed => Thread::inbox_threads_with_snooze_filter_tx(rw, true),
        }
    }

    /// Snoozed messages are physically Inbox messages in a suspended state,
    /// so a Snoozed deletion notification resolves against the Inbox folder.
    pub(crate) fn get_message_from_short_uid(
        &self,
        rw: &RwTransaction,
        short_uid: &str,
        folder_id: &str,
    ) -> MailVaultResult<Option<Message>> {
        match self {
            SyncStrategy::Snoozed => {
                let Some(inbox) = Folder::get_by_role_tx(rw, FolderRole::Inbox)? else {
                    return Ok(None);
                };
                Message::get_tx(rw, &Message::long_uid(short_uid, &inbox.id))
            }
            _ => Message::get_tx(rw, &Message::long_uid(short_uid, folder_id)),
        }
    }

    /// Applies one deletion notification to the store. The default behavior
    /// detaches the message from every thread referencing it and drops the
    /// row; the Snoozed folder instead wakes the message up (membership is
    /// untouched, the message simply leaves the Snoozed view). Returns the
    /// threads requiring a follow-up structural decision.
    pub(crate) fn process_deleted_message(
        &self,
        rw: &RwTransaction,
        message: Message,
        impacted_folders: &mut ImpactedFolders,
    ) -> MailVaultResult<ImpactedThreads> {
        let mut impacted = ImpactedThreads::default();
        match self {
            SyncStrategy::Snoozed => {
                for thread in Thread::threads_referencing_tx(rw, &message)? {
                    self.add_folder_to_impacted_folders(&thread.folder_id, impacted_folders);
                    impacted.insert(thread.uid);
                }
                let mut message = message;
                message.clear_snooze_state();
                Message::upsert_tx(rw, &message)?;
            }
            _ => {
                for mut thread in Thread::threads_referencing_tx(rw, &message)? {
                    if thread.remove_member(&message.uid) {
                        self.add_folder_to_impacted_folders(&thread.folder_id, impacted_folders);
                        Thread::upsert_tx(rw, &thread)?;
                        impacted.insert(thread.uid);
                    }
                }
                Message::delete_tx(rw, message)?;
            }
        }
        Ok(impacted)
    }

    /// Inbox and Snoozed each keep the other's unread counter fresh.
    pub fn add_folder_to_impacted_folders(
        &self,
        folder_id: &str,
        impacted_folders: &mut ImpactedFolders,
    ) {
        impacted_folders.add_id(folder_id);
        match self {
            SyncStrategy::Inbox => impacted_folders.add_role(FolderRole::Snoozed),
            SyncStrategy::Snoozed => impacted_folders.add_role(FolderRole::Inbox),
            SyncStrategy::Default => {}
        }
    }

    /// Structural follow-up after a deletion touched a thread. A thread that
    /// lost its snooze relevance is still a valid Inbox thread, so the
    /// Snoozed policy never hard-deletes.
    pub(crate) fn process_deleted_thread(
        &self,
        rw: &RwTransaction,
        thread: Thread,
        user_addresses: &[String],
    ) -> MailVaultResult<Option<Thread>> {
        match self {
            SyncStrategy::Snoozed => recompute_thread_tx(rw, thread, user_addresses),
            _ => {
                if number_of_messages_in_folder(rw, &thread)? == 0 {
                    Thread::delete_tx(rw, thread)?;
                    Ok(None)
                } else {
                    recompute_thread_tx(rw, thread, user_addresses)
                }
            }
        }
    }

    /// Admits one freshly fetched remote message. In the Snoozed folder the
    /// message usually already exists locally (it came from the Inbox); the
    /// remote copy is authoritative for the snooze state but must not erase
    /// data only the local cache knows about.
    pub(crate) fn handle_added_message(
        &self,
        rw: &RwTransaction,
        remote_message: &Message,
        is_conversation_mode: bool,
        abort: &SyncAbort,
    ) -> MailVaultResult<ImpactedThreads> {
        match self {
            SyncStrategy::Snoozed => {
                if let Some(local_message) = Message::get_tx(rw, &remote_message.uid)? {
                    let mut updated = remote_message.clone();
                    updated.keep_local_values(&local_message);
                    Message::upsert_tx(rw, &updated)?;

                    let mut impacted = ImpactedThreads::default();
                    for thread in Thread::threads_referencing_tx(rw, &updated)? {
                        impacted.insert(thread.uid);
                    }
                    Ok(impacted)
                } else {
                    admission::admit_new_message(rw, remote_message, is_conversation_mode, abort)
                }
            }
            _ => {
                if let Some(existing) = Message::get_tx(rw, &remote_message.uid)? {
                    if !Thread::threads_referencing_tx(rw, &existing)?.is_empty() {
                        debug!(
                            "Message '{}' is already cached and attached, skipping re-admission",
                            existing.uid
                        );
                        return Ok(ImpactedThreads::default());
                    }
                }
                admission::admit_new_message(rw, remote_message, is_conversation_mode, abort)
            }
        }
    }
}

fn number_of_messages_in_folder(rw: &RwTransaction, thread: &Thread) -> MailVaultResult<usize> {
    let mut count = 0;
    for uid in &thread.message_uids {
        if let Some(message) = Message::get_tx(rw, uid)? {
            if message.folder_id == thread.folder_id {
                count += 1;
            }
        }
    }
    Ok(count)
}
