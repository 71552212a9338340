// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exercises `SqliteStore` through the `RelayStore` trait object.

use std::sync::Arc;

use tempfile::tempdir;
use tutorlink_core::types::{
    DeliveryStatus, Message, MessageKind, Pairing, PairingStatus, PartyType, Provider,
};
use tutorlink_core::{HealthStatus, PluginAdapter, RelayStore};
use tutorlink_storage::SqliteStore;

fn active_pairing(id: &str) -> Pairing {
    Pairing {
        id: id.into(),
        student_id: "s1".into(),
        tutor_id: "t1".into(),
        status: PairingStatus::Active,
        line_chat_id: None,
        slack_channel_id: None,
        started_at: Some("2026-02-01T09:00:00.000Z".into()),
        created_at: "2026-02-01T09:00:00.000Z".into(),
        updated_at: "2026-02-01T09:00:00.000Z".into(),
    }
}

#[tokio::test]
async fn relay_contract_over_sqlite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("relay.db");
    let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();

    store.upsert_student("s1", "Sora").await.unwrap();
    store.upsert_tutor("t1", "Taro").await.unwrap();
    store.create_pairing(&active_pairing("p1")).await.unwrap();
    let tutor_account = store
        .link_account(Provider::Slack, "W1", "t1", PartyType::Tutor)
        .await
        .unwrap();

    let relay: Arc<dyn RelayStore> = Arc::new(store);
    assert_eq!(relay.health_check().await.unwrap(), HealthStatus::Healthy);

    let found = relay
        .find_account_for_party("t1", PartyType::Tutor, Provider::Slack)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, tutor_account.id);
    assert!(found.conversation_handle.is_none());

    relay
        .set_account_conversation_handle(&found.id, "D1")
        .await
        .unwrap();
    relay
        .set_pairing_conversation_handle("p1", Provider::Slack, "D1")
        .await
        .unwrap();

    let by_handle = relay
        .pairings_by_conversation_handle(Provider::Slack, "D1")
        .await
        .unwrap();
    assert_eq!(by_handle.len(), 1);

    assert_eq!(
        relay
            .party_display_name("s1", PartyType::Student)
            .await
            .unwrap()
            .as_deref(),
        Some("Sora")
    );

    let msg = Message {
        id: "m1".into(),
        pairing_id: "p1".into(),
        sender_id: "s1".into(),
        sender_type: PartyType::Student,
        content: "Hello".into(),
        kind: MessageKind::Text,
        status: DeliveryStatus::Sent,
        source_message_id: Some("line-100".into()),
        thread_id: Some("1690000000.000100".into()),
        created_at: "2026-02-01T09:01:00.000Z".into(),
        deleted_at: None,
    };
    relay.insert_message(&msg).await.unwrap();
    let hit = relay
        .find_message_by_thread_id("1690000000.000100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.pairing_id, "p1");

    relay.close().await.unwrap();
    relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn uninitialized_store_reports_unhealthy() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::new(tutorlink_config::model::StorageConfig {
        database_path: dir.path().join("x.db").display().to_string(),
        wal_mode: true,
    });
    assert!(matches!(
        store.health_check().await.unwrap(),
        HealthStatus::Unhealthy(_)
    ));
    assert!(store.get_pairing("p1").await.is_err());
}

#[tokio::test]
async fn double_initialize_fails() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("x.db").to_str().unwrap())
        .await
        .unwrap();
    assert!(store.initialize().await.is_err());
}
