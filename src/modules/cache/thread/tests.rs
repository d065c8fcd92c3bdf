use native_db::Builder;

use crate::modules::cache::folder::{Folder, FolderRole};
use crate::modules::cache::message::Message;
use crate::modules::cache::thread::Thread;
use crate::modules::database::CONTENT_MODELS;

fn message(short_uid: &str, folder_id: &str, message_id: Option<&str>) -> Message {
    let mut message = Message {
        uid: Message::long_uid(short_uid, folder_id),
        short_uid: short_uid.into(),
        folder_id: folder_id.into(),
        message_id: message_id.map(Into::into),
        ..Default::default()
    };
    message.message_ids = message.compute_message_ids();
    message
}

#[test]
fn trashed_message_never_resurrects_outside_trash() {
    let database = Builder::new().create_in_memory(&CONTENT_MODELS).unwrap();
    let rw = database.rw_transaction().unwrap();
    Folder::upsert_tx(&rw, Folder::new("adm-inbox", "INBOX", Some(FolderRole::Inbox))).unwrap();

    let mut trashed = message("1", "adm-trash", Some("t1@x"));
    trashed.is_trashed = true;
    Message::upsert_tx(&rw, &trashed).unwrap();

    let founder = message("2", "adm-inbox", Some("t2@x"));
    Message::upsert_tx(&rw, &founder).unwrap();
    let mut thread = Thread::from_message(&founder);

    let admitted = thread.add_message_with_conditions_tx(&rw, &trashed).unwrap();
    assert!(!admitted);
    assert!(!thread.contains_message(&trashed.uid));
    // The ids still merge even when the message is filtered out.
    assert!(thread.messages_ids.contains(&"t1@x".to_string()));
}

#[test]
fn draft_folder_only_admits_drafts() {
    let database = Builder::new().create_in_memory(&CONTENT_MODELS).unwrap();
    let rw = database.rw_transaction().unwrap();
    Folder::upsert_tx(&rw, Folder::new("adm-draft", "Drafts", Some(FolderRole::Draft))).unwrap();

    let mut draft = message("1", "adm-draft", Some("d1@x"));
    draft.is_draft = true;
    Message::upsert_tx(&rw, &draft).unwrap();
    let mut thread = Thread::from_message(&draft);

    let not_a_draft = message("2", "adm-inbox2", Some("d2@x"));
    Message::upsert_tx(&rw, &not_a_draft).unwrap();
    assert!(!thread
        .add_message_with_conditions_tx(&rw, &not_a_draft)
        .unwrap());

    let mut another_draft = message("3", "adm-draft", Some("d3@x"));
    another_draft.is_draft = true;
    Message::upsert_tx(&rw, &another_draft).unwrap();
    assert!(thread
        .add_message_with_conditions_tx(&rw, &another_draft)
        .unwrap());
}

#[test]
fn trash_folder_only_admits_trashed_messages() {
    let database = Builder::new().create_in_memory(&CONTENT_MODELS).unwrap();
    let rw = database.rw_transaction().unwrap();
    Folder::upsert_tx(&rw, Folder::new("adm-trash2", "Trash", Some(FolderRole::Trash))).unwrap();

    let mut trashed = message("1", "adm-trash2", Some("x1@x"));
    trashed.is_trashed = true;
    Message::upsert_tx(&rw, &trashed).unwrap();
    let mut thread = Thread::from_message(&trashed);

    let live = message("2", "adm-inbox3", Some("x2@x"));
    Message::upsert_tx(&rw, &live).unwrap();
    assert!(!thread.add_message_with_conditions_tx(&rw, &live).unwrap());
}

#[test]
fn twin_in_own_folder_keeps_primary_slot() {
    let database = Builder::new().create_in_memory(&CONTENT_MODELS).unwrap();
    let rw = database.rw_transaction().unwrap();
    Folder::upsert_tx(&rw, Folder::new("adm-inbox4", "INBOX", Some(FolderRole::Inbox))).unwrap();

    let own = message("1", "adm-inbox4", Some("twin@x"));
    Message::upsert_tx(&rw, &own).unwrap();
    let mut thread = Thread::from_message(&own);

    let copy = message("1", "adm-sent4", Some("twin@x"));
    Message::upsert_tx(&rw, &copy).unwrap();
    assert!(thread.add_message_with_conditions_tx(&rw, &copy).unwrap());

    assert_eq!(thread.message_uids, vec![own.uid.clone()]);
    assert_eq!(thread.duplicate_uids, vec![copy.uid.clone()]);
}

#[test]
fn twin_from_other_folder_is_demoted_regardless_of_order() {
    let database = Builder::new().create_in_memory(&CONTENT_MODELS).unwrap();
    let rw = database.rw_transaction().unwrap();
    Folder::upsert_tx(&rw, Folder::new("adm-inbox5", "INBOX", Some(FolderRole::Inbox))).unwrap();

    // The foreign copy lands first, the same-folder message second.
    let founder = message("9", "adm-inbox5", Some("other@x"));
    Message::upsert_tx(&rw, &founder).unwrap();
    let mut thread = Thread::from_message(&founder);

    let foreign = message("1", "adm-sent5", Some("twin5@x"));
    Message::upsert_tx(&rw, &foreign).unwrap();
    assert!(thread.add_message_with_conditions_tx(&rw, &foreign).unwrap());

    let own = message("1", "adm-inbox5", Some("twin5@x"));
    Message::upsert_tx(&rw, &own).unwrap();
    assert!(thread.add_message_with_conditions_tx(&rw, &own).unwrap());

    // The same-folder message always ends up primary, the foreign copy in
    // duplicates, no matter the admission order.
    assert!(thread.message_uids.contains(&own.uid));
    assert!(!thread.message_uids.contains(&foreign.uid));
    assert_eq!(thread.duplicate_uids, vec![foreign.uid.clone()]);
}

#[test]
fn messages_without_provider_id_never_pair_up() {
    let database = Builder::new().create_in_memory(&CONTENT_MODELS).unwrap();
    let rw = database.rw_transaction().unwrap();
    Folder::upsert_tx(&rw, Folder::new("adm-inbox6", "INBOX", Some(FolderRole::Inbox))).unwrap();

    let first = message("1", "adm-inbox6", None);
    Message::upsert_tx(&rw, &first).unwrap();
    let mut thread = Thread::from_message(&first);

    let second = message("2", "adm-inbox6", None);
    Message::upsert_tx(&rw, &second).unwrap();
    assert!(thread.add_message_with_conditions_tx(&rw, &second).unwrap());

    assert_eq!(thread.message_uids.len(), 2);
    assert!(thread.duplicate_uids.is_empty());
}

#[test]
fn remove_member_detaches_duplicates_too() {
    let mut thread = Thread {
        uid: "t".into(),
        message_uids: vec!["a@f".into(), "b@f".into()],
        duplicate_uids: vec!["c@g".into()],
        ..Default::default()
    };
    assert!(thread.remove_member("c@g"));
    assert!(thread.duplicate_uids.is_empty());
    assert!(thread.remove_member("a@f"));
    assert_eq!(thread.message_uids, vec!["b@f".to_string()]);
    assert!(!thread.remove_member("missing@x"));
}
