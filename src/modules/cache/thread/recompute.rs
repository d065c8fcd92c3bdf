// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        cache::{
            message::Message,
            thread::{
                reactions::{
                    compute_reactions_per_message_id, is_target_message_in_thread, ReactionData,
                },
                Thread,
            },
        },
        common::dedup_addrs,
        error::{code::ErrorCode, MailVaultResult},
    },
    raise_error,
};
use native_db::transaction::RwTransaction;

/// Rebuilds every derived aggregate of a thread from its current member set.
/// Deterministic and idempotent: running it twice over the same members
/// yields identical fields. Returns `None` when the thread lost its last
/// same-folder member and was deleted instead of persisted empty.
pub(crate) fn recompute_thread_tx(
    rw: &RwTransaction,
    mut thread: Thread,
    user_addresses: &[String],
) -> MailVaultResult<Option<Thread>> {
    let mut members = load_messages(rw, &thread, &thread.message_uids)?;
    members.sort_by_key(|m| m.internal_date);
    thread.message_uids = members.iter().map(|m| m.uid.clone()).collect();

    let last_current_folder_message = members
        .iter()
        .rev()
        .find(|m| m.folder_id == thread.folder_id);
    let last_message = if thread.is_from_search {
        // Search threads may only hold members from other folders (snoozed
        // conversations surface this). They fall back to the newest member
        // instead of being dropped.
        last_current_folder_message.or(members.last())
    } else {
        last_current_folder_message
    };

    let Some(last_message) = last_message else {
        Thread::delete_tx(rw, thread)?;
        return Ok(None);
    };
    let display_date = last_message.display_date;
    let internal_date = last_message.internal_date;

    let subject = members
        .first()
        .ok_or_else(|| {
            raise_error!(
                format!(
                    "Thread '{}' selected a last message without having members",
                    thread.uid
                ),
                ErrorCode::DataCorrupted
            )
        })?
        .subject
        .clone();

    thread.reset_aggregates();

    for message in &members {
        thread.merge_message_ids(&message.message_ids);
        if !message.is_seen {
            thread.unseen_messages_count += 1;
        }
        thread.from.extend(message.from.iter().cloned());
        thread.to.extend(message.to.iter().cloned());
        if message.is_draft {
            thread.has_drafts = true;
        }
        if message.is_favorite {
            thread.is_favorite = true;
        }
        if message.is_answered {
            thread.is_answered = true;
            thread.is_forwarded = false;
        }
        if message.is_forwarded {
            thread.is_forwarded = true;
            thread.is_answered = false;
        }
        if message.has_attachable {
            thread.has_attachable = true;
        }
        if message.is_scheduled_draft {
            thread.number_of_scheduled_drafts += 1;
        }
        thread.update_snooze_states_based_on(message);
    }

    let duplicates = load_messages(rw, &thread, &thread.duplicate_uids)?;
    for message in &duplicates {
        if !message.is_seen {
            thread.unseen_messages_count += 1;
        }
        thread.update_snooze_states_based_on(message);
    }

    thread.display_date = display_date;
    thread.internal_date = internal_date;
    thread.subject = subject;
    thread.is_last_inbox_message_snoozed = members
        .iter()
        .rev()
        .find(|m| m.folder_id == thread.folder_id)
        .is_some_and(Message::is_snoozed);

    recompute_messages_with_content(rw, &mut thread, &members, user_addresses)?;

    thread.from = dedup_addrs(std::mem::take(&mut thread.from));
    thread.to = dedup_addrs(std::mem::take(&mut thread.to));

    Thread::upsert_tx(rw, &thread)?;
    Ok(Some(thread))
}

/// Projects reaction messages onto their targets and hides them from the
/// content list when the target is part of the same thread.
fn recompute_messages_with_content(
    rw: &RwTransaction,
    thread: &mut Thread,
    members: &[Message],
    user_addresses: &[String],
) -> MailVaultResult<()> {
    let ReactionData {
        reactions_per_message_id,
        member_message_ids,
    } = compute_reactions_per_message_id(members, user_addresses);

    thread.content_message_uids.clear();
    for message in members {
        if let Some(reactions) = message
            .message_id
            .as_deref()
            .and_then(|id| reactions_per_message_id.get(id))
        {
            let mut updated = message.clone();
            updated.emoji_reactions = {
                let mut states: Vec<_> = reactions.values().cloned().collect();
                states.sort_by(|a, b| a.emoji.cmp(&b.emoji));
                states
            };
            Message::upsert_tx(rw, &updated)?;
        }

        let target_message_ids = message.in_reply_to.as_deref().unwrap_or("");
        let is_hidden_emoji_reaction = message.is_reaction
            && is_target_message_in_thread(target_message_ids, &member_message_ids);
        if !is_hidden_emoji_reaction {
            thread.content_message_uids.push(message.uid.clone());
        }
    }
    Ok(())
}

fn load_messages(
    rw: &RwTransaction,
    thread: &Thread,
    uids: &[String],
) -> MailVaultResult<Vec<Message>> {
    let mut messages = Vec::with_capacity(uids.len());
    for uid in uids {
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
    Ok(messages)
}

impl Thread {
    fn reset_aggregates(&mut self) {
        self.unseen_messages_count = 0;
        self.from = Vec::new();
        self.to = Vec::new();
        self.has_drafts = false;
        self.is_favorite = false;
        self.is_answered = false;
        self.is_forwarded = false;
        self.has_attachable = false;
        self.number_of_scheduled_drafts = 0;
        self.snooze_state = None;
        self.snooze_end_date = None;
        self.snooze_uuid = None;
        self.is_last_inbox_message_snoozed = false;
    }

    /// Last-write-wins in member iteration order: a later message's snooze
    /// state overrides an earlier one.
    fn update_snooze_states_based_on(&mut self, message: &Message) {
        if let Some(state) = message.snooze_state {
            self.snooze_state = Some(state);
            self.snooze_end_date = message.snooze_end_date;
            self.snooze_uuid = message.snooze_uuid.clone();
        }
    }
}
