// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        cache::{
            message::Message,
            sync::{ImpactedThreads, SyncAbort},
            thread::Thread,
        },
        error::{code::ErrorCode, MailVaultResult},
    },
    raise_error,
};
use ahash::AHashSet;
use native_db::transaction::RwTransaction;

/// Stores one remote message and wires it into the thread set. Returns the
/// threads whose derived fields must be recomputed by the caller; threads
/// deleted as duplicates are guaranteed absent from the returned set, since
/// touching an already-deleted record would fail against the store.
pub(crate) fn admit_new_message(
    rw: &RwTransaction,
    remote_message: &Message,
    is_conversation_mode: bool,
    abort: &SyncAbort,
) -> MailVaultResult<ImpactedThreads> {
    Message::upsert_tx(rw, remote_message)?;

    let mut impacted = ImpactedThreads::default();

    if !is_conversation_mode {
        // Every message is its own single-message thread.
        let thread = Thread::from_message(remote_message);
        Thread::upsert_tx(rw, &thread)?;
        impacted.insert(thread.uid);
        return Ok(impacted);
    }

    // Other pre-existing threads that will also require this message and will
    // provide the prior messages for a new thread.
    let existing_threads = Thread::get_by_message_ids_tx(rw, &remote_message.message_ids)?;
    let existing_messages = collect_existing_messages(rw, &existing_threads)?;

    let new_thread = create_new_thread_if_required(
        rw,
        remote_message,
        &existing_threads,
        &existing_messages,
        abort,
    )?;

    // Update already existing threads (i.e. in other folders, or specific
    // cases like Snoozed).
    for mut thread in existing_threads {
        abort.ensure_active()?;

        for message in existing_messages.iter().chain([remote_message]) {
            abort.ensure_active()?;

            if !thread.contains_message(&message.uid) {
                thread.add_message_with_conditions_tx(rw, message)?;
            }
        }

        Thread::upsert_tx(rw, &thread)?;
        impacted.insert(thread.uid);
    }

    // Some messages don't have references to all previous messages of the
    // conversation, which ends up creating several threads for the same
    // folder. Find these duplicates and remove them before the new thread is
    // persisted, keeping the first thread of each folder group.
    for thread in identify_extra_duplicated_threads(rw, &remote_message.message_ids)? {
        abort.ensure_active()?;

        impacted.remove(&thread.uid);
        Thread::delete_tx(rw, thread)?;
    }

    if let Some(thread) = new_thread {
        Thread::upsert_tx(rw, &thread)?;
        impacted.insert(thread.uid);
    }

    Ok(impacted)
}

/// A new thread is only needed when no existing thread lives in the new
/// message's folder. It is seeded with the message and inherits the whole
/// prior conversation under the admission visibility rules.
fn create_new_thread_if_required(
    rw: &RwTransaction,
    new_message: &Message,
    existing_threads: &[Thread],
    existing_messages: &[Message],
    abort: &SyncAbort,
) -> MailVaultResult<Option<Thread>> {
    if existing_threads
        .iter()
        .any(|t| t.folder_id == new_message.folder_id)
    {
        return Ok(None);
    }

    let mut new_thread = Thread::from_message(new_message);
    for message in existing_messages {
        abort.ensure_active()?;
        new_thread.add_message_with_conditions_tx(rw, message)?;
    }
    Ok(Some(new_thread))
}

/// Union of every message already belonging to the candidate threads, in
/// stable thread-then-member order, deduplicated by uid.
fn collect_existing_messages(
    rw: &RwTransaction,
    existing_threads: &[Thread],
) -> MailVaultResult<Vec<Message>> {
    let mut seen = AHashSet::new();
    let mut messages = Vec::new();
    for thread in existing_threads {
        for uid in &thread.message_uids {
            if seen.insert(uid.clone()) {
                let message = Message::get_tx(rw, uid)?.ok_or_else(|| {
                    raise_error!(
                        format!(
                            "Thread '{}' references message '{}' which is gone from the store",
                            thread.uid, uid
                        ),
                        ErrorCode::DataCorrupted
                    )
                })?;
                messages.push(message);
            }
        }
    }
    Ok(messages)
}

/// Groups the threads overlapping `message_ids` by folder and keeps exactly
/// one per folder: the first in candidate order. Candidate order is the
/// uid-sorted order of the index lookup, which makes the surviving uid stable
/// across runs.
pub(crate) fn identify_extra_duplicated_threads(
    rw: &RwTransaction,
    message_ids: &[String],
) -> MailVaultResult<Vec<Thread>> {
    let mut kept_folders = AHashSet::new();
    let mut extras = Vec::new();
    for thread in Thread::get_by_message_ids_tx(rw, message_ids)? {
        if !kept_folders.insert(thread.folder_id.clone()) {
            extras.push(thread);
        }
    }
    Ok(extras)
}
