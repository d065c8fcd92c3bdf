// Copyright © 2025 mailvault.dev
// Licensed under MailVault License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::cache::message::{parse_message_ids, EmojiReactionState, Message};
use ahash::{AHashMap, AHashSet};

pub struct ReactionData {
    /// target message-id -> (emoji -> aggregate state)
    pub reactions_per_message_id: AHashMap<String, AHashMap<String, EmojiReactionState>>,
    /// provider ids of the thread's own members, used to decide whether a
    /// reaction targets something inside the thread
    pub member_message_ids: AHashSet<String>,
}

pub fn compute_reactions_per_message_id(
    all_messages: &[Message],
    user_addresses: &[String],
) -> ReactionData {
    let mut reactions_per_message_id = AHashMap::new();
    let mut member_message_ids = AHashSet::new();

    for message in all_messages {
        if let Some(id) = &message.message_id {
            member_message_ids.insert(id.clone());
        }
        add_reactions_of(&mut reactions_per_message_id, message, user_addresses);
    }

    ReactionData {
        reactions_per_message_id,
        member_message_ids,
    }
}

fn add_reactions_of(
    map: &mut AHashMap<String, AHashMap<String, EmojiReactionState>>,
    message: &Message,
    user_addresses: &[String],
) {
    let Some(emoji) = message.emoji_reaction.as_deref() else {
        return;
    };

    let reply_to_ids = message
        .in_reply_to
        .as_deref()
        .map(parse_message_ids)
        .unwrap_or_default();
    for reply_to_id in reply_to_ids {
        let emojis = map.entry(reply_to_id).or_default();
        let state = emojis
            .entry(emoji.to_string())
            .or_insert_with(|| EmojiReactionState::new(emoji));

        state.count += 1;
        if let Some(author) = message.from.first() {
            state.has_reacted |= user_addresses.iter().any(|a| author.matches_address(a));
            state.authors.push(author.clone());
        }
    }
}

/// A reaction is folded into its target's reaction display (and hidden as a
/// standalone message) only when the target belongs to this thread.
pub(crate) fn is_target_message_in_thread(
    target_message_ids: &str,
    thread_message_ids: &AHashSet<String>,
) -> bool {
    parse_message_ids(target_message_ids)
        .iter()
        .any(|id| thread_message_ids.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::common::Addr;

    fn reaction(uid: &str, emoji: &str, target: &str, from: &str) -> Message {
        Message {
            uid: uid.into(),
            is_reaction: true,
            emoji_reaction: Some(emoji.into()),
            in_reply_to: Some(target.into()),
            from: vec![Addr::new(None, Some(from))],
            ..Default::default()
        }
    }

    #[test]
    fn folds_reactions_onto_target_id() {
        let target = Message {
            uid: "1@inbox".into(),
            message_id: Some("m1@x".into()),
            ..Default::default()
        };
        let messages = vec![
            target,
            reaction("2@inbox", "👍", "<m1@x>", "alice@example.com"),
            reaction("3@inbox", "👍", "<m1@x>", "bob@example.com"),
            reaction("4@inbox", "🎉", "<m1@x>", "alice@example.com"),
        ];

        let data = compute_reactions_per_message_id(&messages, &["bob@example.com".into()]);
        let states = data.reactions_per_message_id.get("m1@x").unwrap();
        assert_eq!(states.get("👍").unwrap().count, 2);
        assert!(states.get("👍").unwrap().has_reacted);
        assert_eq!(states.get("🎉").unwrap().count, 1);
        assert!(!states.get("🎉").unwrap().has_reacted);
    }

    #[test]
    fn target_outside_thread_is_not_hidden() {
        let mut member_ids = AHashSet::new();
        member_ids.insert("m1@x".to_string());
        assert!(is_target_message_in_thread("<m1@x>", &member_ids));
        assert!(!is_target_message_in_thread("<other@x>", &member_ids));
        assert!(!is_target_message_in_thread("", &member_ids));
    }
}
