// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Student and tutor profile rows. The relay only needs display names.

use rusqlite::{OptionalExtension, params};
use tutorlink_core::RelayError;
use tutorlink_core::types::PartyType;

use crate::database::{Database, map_tr_err, now_timestamp};

fn table(party_type: PartyType) -> &'static str {
    match party_type {
        PartyType::Student => "students",
        PartyType::Tutor => "tutors",
    }
}

async fn upsert(
    db: &Database,
    party_type: PartyType,
    id: &str,
    display_name: &str,
) -> Result<(), RelayError> {
    let id = id.to_string();
    let display_name = display_name.to_string();
    let now = now_timestamp();
    let table = table(party_type);
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (id, display_name, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                         display_name = excluded.display_name,
                         updated_at = excluded.updated_at"
                ),
                params![id, display_name, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_student(db: &Database, id: &str, display_name: &str) -> Result<(), RelayError> {
    upsert(db, PartyType::Student, id, display_name).await
}

pub async fn upsert_tutor(db: &Database, id: &str, display_name: &str) -> Result<(), RelayError> {
    upsert(db, PartyType::Tutor, id, display_name).await
}

pub async fn display_name(
    db: &Database,
    party_id: &str,
    party_type: PartyType,
) -> Result<Option<String>, RelayError> {
    let party_id = party_id.to_string();
    let table = table(party_type);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<String>> {
            conn.query_row(
                &format!("SELECT display_name FROM {table} WHERE id = ?1"),
                params![party_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn upsert_updates_name_in_place() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        upsert_student(&db, "s1", "Sora").await.unwrap();
        upsert_student(&db, "s1", "Sora K.").await.unwrap();
        upsert_tutor(&db, "s1", "Not the student").await.unwrap();

        assert_eq!(
            display_name(&db, "s1", PartyType::Student).await.unwrap().as_deref(),
            Some("Sora K.")
        );
        assert_eq!(
            display_name(&db, "s1", PartyType::Tutor).await.unwrap().as_deref(),
            Some("Not the student")
        );
        assert!(display_name(&db, "x", PartyType::Tutor).await.unwrap().is_none());
    }
}
