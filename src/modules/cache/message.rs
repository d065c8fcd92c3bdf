// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        cache::{
            folder::{Folder, FolderRole},
            manager::ThreadIndexManager,
        },
        common::Addr,
        database::{
            async_find_impl, delete_impl, filter_by_secondary_key_impl, manager::DB_MANAGER,
            upsert_impl,
        },
        error::{code::ErrorCode, MailVaultResult},
        utils::flags_fingerprint,
    },
    raise_error,
};
use native_db::transaction::RwTransaction;
use native_db::*;
use native_model::{native_model, Model};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// Encountered formats so far:
// `x@x.x`
// `<x@x.x>`
// `<x@x.x><x@x.x><x@x.x>`
// `<x@x.x> <x@x.x> <x@x.x>`
// `<x@x.x> <x@x.x> x@x.x`
static MESSAGE_IDS_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*<|>?\s+<?").unwrap());

/// Splits one raw threading header value into bare message ids.
pub fn parse_message_ids(raw: &str) -> Vec<String> {
    let value = raw.trim();
    let value = value.strip_prefix('<').unwrap_or(value);
    let value = value.strip_suffix('>').unwrap_or(value);
    MESSAGE_IDS_SEPARATOR
        .split(value)
        .filter(|id| !id.is_empty())
        .map(Into::into)
        .collect()
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct Message {
    /// The composite identifier of the message: `"{short_uid}@{folder_id}"`.
    /// The same logical message cached in two folders yields two rows.
    #[primary_key]
    pub uid: String,
    /// The server-reported short identifier, unique within one folder.
    pub short_uid: String,
    #[secondary_key]
    pub folder_id: String,
    /// The provider message id. May be absent, and may be duplicated across
    /// folders (normal copy) or even within one folder (broken threading).
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    /// Normalized union of `message_id`, `references` and `in_reply_to`,
    /// sorted for determinism. This is the matching key for threading.
    pub message_ids: Vec<String>,
    pub subject: Option<String>,
    pub from: Vec<Addr>,
    pub to: Vec<Addr>,
    pub preview: String,
    pub is_seen: bool,
    pub is_favorite: bool,
    pub is_answered: bool,
    pub is_forwarded: bool,
    pub is_draft: bool,
    pub is_scheduled_draft: bool,
    pub has_attachable: bool,
    /// Local-only: set when the message was fetched through a Trash folder.
    pub is_trashed: bool,
    pub snooze_state: Option<SnoozeState>,
    pub snooze_end_date: Option<i64>,
    pub snooze_uuid: Option<String>,
    /// True when this message is itself an emoji reaction targeting another
    /// message through `in_reply_to`.
    pub is_reaction: bool,
    /// The emoji this message contributes when it is a reaction.
    pub emoji_reaction: Option<String>,
    /// Aggregate reaction state applied onto this message when it is a
    /// reaction *target*; fully overwritten at every thread recompute.
    pub emoji_reactions: Vec<EmojiReactionState>,
    /// Fingerprint of the mutable flag bits, used to skip no-op flag deltas.
    pub flags_hash: u64,
    /// Server receive time, Unix timestamp in milliseconds. Thread ordering key.
    pub internal_date: i64,
    pub display_date: i64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum SnoozeState {
    Snoozed,
    Unsnoozed,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct EmojiReactionState {
    pub emoji: String,
    pub count: u32,
    /// True when one of the local user's addresses authored a reaction.
    pub has_reacted: bool,
    pub authors: Vec<Addr>,
}

impl EmojiReactionState {
    pub fn new(emoji: &str) -> Self {
        EmojiReactionState {
            emoji: emoji.into(),
            ..Default::default()
        }
    }
}

/// Flag delta reported by the remote feed for an already-cached message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageFlags {
    pub is_seen: bool,
    pub is_favorite: bool,
    pub is_answered: bool,
    pub is_forwarded: bool,
    pub is_scheduled_draft: bool,
}

impl MessageFlags {
    pub fn fingerprint(&self) -> u64 {
        flags_fingerprint(&[
            self.is_seen,
            self.is_favorite,
            self.is_answered,
            self.is_forwarded,
            self.is_scheduled_draft,
        ])
    }
}

impl Message {
    pub fn long_uid(short_uid: &str, folder_id: &str) -> String {
        format!("{}@{}", short_uid, folder_id)
    }

    /// Normalized threading ids: the message's own id plus everything it
    /// cross-references, deduplicated and sorted.
    pub fn compute_message_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for header in [
            self.message_id.as_deref(),
            self.references.as_deref(),
            self.in_reply_to.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if !header.trim().is_empty() {
                ids.extend(parse_message_ids(header));
            }
        }
        ids.sort();
        ids.dedup();
        ids
    }

    /// Fills the local-only fields of a freshly fetched remote message before
    /// it is admitted into the cache.
    pub fn init_local_values(&mut self, folder: &Folder) {
        self.folder_id = folder.id.clone();
        self.uid = Self::long_uid(&self.short_uid, &folder.id);
        self.is_trashed = folder.role == Some(FolderRole::Trash);
        if self.message_ids.is_empty() {
            self.message_ids = self.compute_message_ids();
        }
        self.flags_hash = self.current_flags_fingerprint();
    }

    /// A re-fetched message (the Snoozed folder re-reports Inbox messages)
    /// must not lose data only the local cache knows about.
    pub fn keep_local_values(&mut self, local: &Message) {
        self.is_trashed = local.is_trashed;
        self.message_ids = local.message_ids.clone();
        if self.preview.is_empty() {
            self.preview = local.preview.clone();
        }
        self.emoji_reactions = local.emoji_reactions.clone();
    }

    /// A message counts as snoozed only while the suspension is still armed.
    pub fn is_snoozed(&self) -> bool {
        self.snooze_state == Some(SnoozeState::Snoozed) && self.snooze_end_date.is_some()
    }

    pub fn clear_snooze_state(&mut self) {
        self.snooze_state = None;
        self.snooze_end_date = None;
        self.snooze_uuid = None;
    }

    pub fn apply_flags(&mut self, flags: &MessageFlags) {
        self.is_seen = flags.is_seen;
        self.is_favorite = flags.is_favorite;
        self.is_answered = flags.is_answered;
        self.is_forwarded = flags.is_forwarded;
        self.is_scheduled_draft = flags.is_scheduled_draft;
        self.flags_hash = self.current_flags_fingerprint();
    }

    pub fn current_flags_fingerprint(&self) -> u64 {
        flags_fingerprint(&[
            self.is_seen,
            self.is_favorite,
            self.is_answered,
            self.is_forwarded,
            self.is_scheduled_draft,
        ])
    }

    pub async fn get(uid: &str) -> MailVaultResult<Option<Message>> {
        async_find_impl(DB_MANAGER.content_db(), uid.to_string()).await
    }

    pub async fn get_by_folder(folder_id: &str) -> MailVaultResult<Vec<Message>> {
        let folder_id = folder_id.to_string();
        let messages: Vec<Message> = filter_by_secondary_key_impl(
            DB_MANAGER.content_db(),
            MessageKey::folder_id,
            folder_id.clone(),
        )
        .await?;
        // `start_with` is prefix-based, so an exact-id filter is still needed.
        Ok(messages
            .into_iter()
            .filter(|m| m.folder_id == folder_id)
            .collect())
    }

    /// Resolves every cached message sharing at least one normalized id with
    /// `ids`, through the in-memory index.
    pub async fn get_by_message_ids(ids: &[String]) -> MailVaultResult<Vec<Message>> {
        let mut messages = Vec::new();
        for uid in ThreadIndexManager::messages_matching(ids) {
            if let Some(message) = Self::get(&uid).await? {
                messages.push(message);
            }
        }
        Ok(messages)
    }

    pub async fn upsert(message: Message) -> MailVaultResult<()> {
        ThreadIndexManager::index_message(&message.uid, &message.message_ids);
        upsert_impl(DB_MANAGER.content_db(), message).await
    }

    pub async fn delete(uid: &str) -> MailVaultResult<()> {
        let uid = uid.to_string();
        delete_impl(DB_MANAGER.content_db(), move |rw| {
            let message = Message::get_tx(rw, &uid)?.ok_or_else(|| {
                raise_error!(
                    format!("Message '{}' is not cached", uid),
                    ErrorCode::ResourceNotFound
                )
            })?;
            ThreadIndexManager::forget_message(&message.uid, &message.message_ids);
            Ok(message)
        })
        .await
    }

    pub(crate) fn get_tx(rw: &RwTransaction, uid: &str) -> MailVaultResult<Option<Message>> {
        rw.get()
            .primary::<Message>(uid.to_string())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
    }

    pub(crate) fn upsert_tx(rw: &RwTransaction, message: &Message) -> MailVaultResult<()> {
        rw.upsert(message.clone())
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        ThreadIndexManager::index_message(&message.uid, &message.message_ids);
        Ok(())
    }

    pub(crate) fn delete_tx(rw: &RwTransaction, message: Message) -> MailVaultResult<()> {
        ThreadIndexManager::forget_message(&message.uid, &message.message_ids);
        rw.remove(message)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_headers(
        message_id: Option<&str>,
        in_reply_to: Option<&str>,
        references: Option<&str>,
    ) -> Message {
        Message {
            message_id: message_id.map(Into::into),
            in_reply_to: in_reply_to.map(Into::into),
            references: references.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn parses_bare_id() {
        assert_eq!(parse_message_ids("a@x.x"), vec!["a@x.x"]);
    }

    #[test]
    fn parses_bracketed_id() {
        assert_eq!(parse_message_ids("<a@x.x>"), vec!["a@x.x"]);
    }

    #[test]
    fn parses_adjacent_brackets() {
        assert_eq!(
            parse_message_ids("<a@x.x><b@x.x><c@x.x>"),
            vec!["a@x.x", "b@x.x", "c@x.x"]
        );
    }

    #[test]
    fn parses_spaced_brackets() {
        assert_eq!(
            parse_message_ids("<a@x.x> <b@x.x> <c@x.x>"),
            vec!["a@x.x", "b@x.x", "c@x.x"]
        );
    }

    #[test]
    fn parses_mixed_encodings() {
        assert_eq!(
            parse_message_ids("<a@x.x> <b@x.x> c@x.x"),
            vec!["a@x.x", "b@x.x", "c@x.x"]
        );
    }

    #[test]
    fn compute_message_ids_merges_headers() {
        let message = message_with_headers(
            Some("<self@x.x>"),
            Some("<parent@x.x>"),
            Some("<root@x.x> <parent@x.x>"),
        );
        assert_eq!(
            message.compute_message_ids(),
            vec!["parent@x.x", "root@x.x", "self@x.x"]
        );
    }

    #[test]
    fn compute_message_ids_skips_blank_headers() {
        let message = message_with_headers(Some("<self@x.x>"), Some("   "), None);
        assert_eq!(message.compute_message_ids(), vec!["self@x.x"]);
    }

    #[test]
    fn apply_flags_refreshes_fingerprint() {
        let mut message = Message::default();
        let before = message.current_flags_fingerprint();
        message.apply_flags(&MessageFlags {
            is_seen: true,
            ..Default::default()
        });
        assert_ne!(message.flags_hash, 0);
        assert_ne!(message.flags_hash, before);
        assert!(message.is_seen);
    }

    #[test]
    fn snoozed_requires_end_date() {
        let mut message = Message {
            snooze_state: Some(SnoozeState::Snoozed),
            ..Default::default()
        };
        assert!(!message.is_snoozed());
        message.snooze_end_date = Some(1_700_000_000_000);
        assert!(message.is_snoozed());
        message.clear_snooze_state();
        assert!(!message.is_snoozed());
    }

    #[test]
    fn keep_local_values_preserves_cache_only_state() {
        let local = Message {
            is_trashed: true,
            message_ids: vec!["a@x.x".into()],
            preview: "cached body preview".into(),
            ..Default::default()
        };
        let mut remote = Message {
            snooze_state: Some(SnoozeState::Snoozed),
            snooze_end_date: Some(1_700_000_000_000),
            ..Default::default()
        };
        remote.keep_local_values(&local);
        assert!(remote.is_trashed);
        assert_eq!(remote.message_ids, vec!["a@x.x".to_string()]);
        assert_eq!(remote.preview, "cached body preview");
        // The remote copy stays authoritative for the snooze fields.
        assert!(remote.is_snoozed());
    }
}
