// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message ledger operations. Rows are inserted once and never updated,
//! except for the soft-delete marker.

use rusqlite::{OptionalExtension, params};
use tutorlink_core::RelayError;
use tutorlink_core::types::Message;

use crate::database::{Database, map_tr_err, now_timestamp, parse_column};

const MESSAGE_COLUMNS: &str = "id, pairing_id, sender_id, sender_type, content, kind, \
     status, source_message_id, thread_id, created_at, deleted_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        pairing_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_type: parse_column(row, 3)?,
        content: row.get(4)?,
        kind: parse_column(row, 5)?,
        status: parse_column(row, 6)?,
        source_message_id: row.get(7)?,
        thread_id: row.get(8)?,
        created_at: row.get(9)?,
        deleted_at: row.get(10)?,
    })
}

/// Append a ledger row.
pub async fn insert_message(db: &Database, msg: &Message) -> Result<(), RelayError> {
    let msg = msg.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                &format!(
                    "INSERT INTO messages ({MESSAGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    msg.id,
                    msg.pairing_id,
                    msg.sender_id,
                    msg.sender_type.to_string(),
                    msg.content,
                    msg.kind.to_string(),
                    msg.status.to_string(),
                    msg.source_message_id,
                    msg.thread_id,
                    msg.created_at,
                    msg.deleted_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent non-deleted row carrying a correlation id.
pub async fn find_by_thread_id(
    db: &Database,
    thread_id: &str,
) -> Result<Option<Message>, RelayError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Message>> {
            conn.query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE thread_id = ?1 AND deleted_at IS NULL
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![thread_id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Non-deleted history of a pairing in chronological order.
pub async fn messages_for_pairing(
    db: &Database,
    pairing_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Message>, RelayError> {
    let pairing_id = pairing_id.to_string();
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Message>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE pairing_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at ASC, rowid ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![pairing_id, limit], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a row deleted. Returns `false` if it does not exist or already is.
pub async fn soft_delete_message(db: &Database, id: &str) -> Result<bool, RelayError> {
    let id = id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let changed = conn.execute(
                "UPDATE messages SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                params![id, now],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::pairings::create_pairing;
    use crate::queries::parties::{upsert_student, upsert_tutor};
    use tempfile::tempdir;
    use tutorlink_core::types::{DeliveryStatus, MessageKind, Pairing, PairingStatus, PartyType};

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        upsert_student(&db, "s1", "Sora").await.unwrap();
        upsert_tutor(&db, "t1", "Taro").await.unwrap();
        create_pairing(
            &db,
            &Pairing {
                id: "p1".into(),
                student_id: "s1".into(),
                tutor_id: "t1".into(),
                status: PairingStatus::Active,
                line_chat_id: None,
                slack_channel_id: None,
                started_at: None,
                created_at: "2026-01-01T00:00:00.000Z".into(),
                updated_at: "2026-01-01T00:00:00.000Z".into(),
            },
        )
        .await
        .unwrap();
        (db, dir)
    }

    fn make_msg(id: &str, content: &str, thread: Option<&str>, at: &str) -> Message {
        Message {
            id: id.to_string(),
            pairing_id: "p1".to_string(),
            sender_id: "s1".to_string(),
            sender_type: PartyType::Student,
            content: content.to_string(),
            kind: MessageKind::Text,
            status: DeliveryStatus::Sent,
            source_message_id: Some(format!("src-{id}")),
            thread_id: thread.map(str::to_string),
            created_at: at.to_string(),
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn history_is_chronological() {
        let (db, _dir) = setup().await;
        insert_message(&db, &make_msg("m2", "second", None, "2026-01-01T00:00:02.000Z"))
            .await
            .unwrap();
        insert_message(&db, &make_msg("m1", "first", None, "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        let history = messages_for_pairing(&db, "p1", None).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);

        let limited = messages_for_pairing(&db, "p1", Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn thread_lookup_round_trips() {
        let (db, _dir) = setup().await;
        let msg = make_msg("m1", "Hello", Some("1690000000.000100"), "2026-01-01T00:00:01.000Z");
        insert_message(&db, &msg).await.unwrap();
        let found = find_by_thread_id(&db, "1690000000.000100").await.unwrap().unwrap();
        assert_eq!(found, msg);
        assert!(find_by_thread_id(&db, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn soft_delete_hides_row() {
        let (db, _dir) = setup().await;
        insert_message(&db, &make_msg("m1", "oops", Some("T1"), "2026-01-01T00:00:01.000Z"))
            .await
            .unwrap();
        assert!(soft_delete_message(&db, "m1").await.unwrap());
        assert!(!soft_delete_message(&db, "m1").await.unwrap());
        assert!(!soft_delete_message(&db, "missing").await.unwrap());

        assert!(messages_for_pairing(&db, "p1", None).await.unwrap().is_empty());
        assert!(find_by_thread_id(&db, "T1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_pairing_is_rejected_by_foreign_key() {
        let (db, _dir) = setup().await;
        let mut msg = make_msg("m1", "x", None, "2026-01-01T00:00:01.000Z");
        msg.pairing_id = "ghost".into();
        assert!(insert_message(&db, &msg).await.is_err());
    }
}
