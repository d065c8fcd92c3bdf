use native_db::Builder;

use crate::modules::cache::folder::{Folder, FolderRole};
use crate::modules::database::{with_transaction, CONTENT_MODELS};
use std::sync::Arc;

#[tokio::test]
async fn with_transaction_commits_on_success() {
    let database = Arc::new(Builder::new().create_in_memory(&CONTENT_MODELS).unwrap());

    with_transaction(&database, |rw| {
        Folder::upsert_tx(rw, Folder::new("db-test-inbox", "INBOX", Some(FolderRole::Inbox)))
    })
    .await
    .unwrap();

    let found = with_transaction(&database, |rw| Folder::get_tx(rw, "db-test-inbox"))
        .await
        .unwrap();
    assert_eq!(found.unwrap().name, "INBOX");
}

#[tokio::test]
async fn with_transaction_rolls_back_on_error() {
    let database = Arc::new(Builder::new().create_in_memory(&CONTENT_MODELS).unwrap());

    let result = with_transaction(&database, |rw| {
        Folder::upsert_tx(rw, Folder::new("db-test-trash", "Trash", Some(FolderRole::Trash)))?;
        Err::<(), _>(crate::raise_error!(
            "forced failure".into(),
            crate::modules::error::code::ErrorCode::InternalError
        ))
    })
    .await;
    assert!(result.is_err());

    let found = with_transaction(&database, |rw| Folder::get_tx(rw, "db-test-trash"))
        .await
        .unwrap();
    assert!(found.is_none());
}
