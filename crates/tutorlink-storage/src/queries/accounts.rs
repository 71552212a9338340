// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External account linkage queries.

use rusqlite::{OptionalExtension, params};
use tutorlink_core::RelayError;
use tutorlink_core::types::{ExternalAccount, PartyType, Provider};

use crate::database::{Database, map_tr_err, now_timestamp, parse_column};

const ACCOUNT_COLUMNS: &str = "id, provider, external_id, party_id, party_type, \
     conversation_handle, active, created_at, updated_at";

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExternalAccount> {
    Ok(ExternalAccount {
        id: row.get(0)?,
        provider: parse_column(row, 1)?,
        external_id: row.get(2)?,
        party_id: row.get(3)?,
        party_type: parse_column(row, 4)?,
        conversation_handle: row.get(5)?,
        active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Active account for a platform identity.
pub async fn find_active_account(
    db: &Database,
    provider: Provider,
    external_id: &str,
) -> Result<Option<ExternalAccount>, RelayError> {
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<ExternalAccount>> {
            conn.query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM external_accounts
                     WHERE provider = ?1 AND external_id = ?2 AND active = 1"
                ),
                params![provider.to_string(), external_id],
                row_to_account,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active account a party holds on a platform.
pub async fn find_account_for_party(
    db: &Database,
    party_id: &str,
    party_type: PartyType,
    provider: Provider,
) -> Result<Option<ExternalAccount>, RelayError> {
    let party_id = party_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<ExternalAccount>> {
            conn.query_row(
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM external_accounts
                     WHERE provider = ?1 AND party_id = ?2 AND party_type = ?3 AND active = 1"
                ),
                params![provider.to_string(), party_id, party_type.to_string()],
                row_to_account,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Every account a party has held, active or not, newest first.
pub async fn list_accounts_for_party(
    db: &Database,
    party_id: &str,
    party_type: PartyType,
) -> Result<Vec<ExternalAccount>, RelayError> {
    let party_id = party_id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<ExternalAccount>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM external_accounts
                 WHERE party_id = ?1 AND party_type = ?2
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![party_id, party_type.to_string()], row_to_account)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Link a party to a platform identity.
///
/// Any active record for the same identity or for the same party on the
/// same platform is deactivated first, in one transaction, so both
/// uniqueness rules hold afterwards.
pub async fn link_account(
    db: &Database,
    provider: Provider,
    external_id: &str,
    party_id: &str,
    party_type: PartyType,
) -> Result<ExternalAccount, RelayError> {
    let now = now_timestamp();
    let account = ExternalAccount {
        id: uuid::Uuid::new_v4().to_string(),
        provider,
        external_id: external_id.to_string(),
        party_id: party_id.to_string(),
        party_type,
        conversation_handle: None,
        active: true,
        created_at: now.clone(),
        updated_at: now,
    };
    let row = account.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE external_accounts SET active = 0, updated_at = ?5
                 WHERE active = 1 AND provider = ?1
                   AND (external_id = ?2 OR (party_id = ?3 AND party_type = ?4))",
                params![
                    row.provider.to_string(),
                    row.external_id,
                    row.party_id,
                    row.party_type.to_string(),
                    row.updated_at,
                ],
            )?;
            tx.execute(
                "INSERT INTO external_accounts
                 (id, provider, external_id, party_id, party_type, conversation_handle,
                  active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, 1, ?6, ?7)",
                params![
                    row.id,
                    row.provider.to_string(),
                    row.external_id,
                    row.party_id,
                    row.party_type.to_string(),
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)?;
    Ok(account)
}

/// Deactivate a party's account on a platform. Returns whether one was active.
pub async fn unlink_account(
    db: &Database,
    provider: Provider,
    party_id: &str,
    party_type: PartyType,
) -> Result<bool, RelayError> {
    let party_id = party_id.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<bool> {
            let changed = conn.execute(
                "UPDATE external_accounts SET active = 0, updated_at = ?4
                 WHERE active = 1 AND provider = ?1 AND party_id = ?2 AND party_type = ?3",
                params![provider.to_string(), party_id, party_type.to_string(), now],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Cache the conversation handle opened for an account.
pub async fn set_conversation_handle(
    db: &Database,
    account_id: &str,
    handle: &str,
) -> Result<(), RelayError> {
    let account_id = account_id.to_string();
    let handle = handle.to_string();
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                "UPDATE external_accounts SET conversation_handle = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![account_id, handle, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn link_then_find_by_identity_and_party() {
        let (db, _dir) = setup().await;
        let linked = link_account(&db, Provider::Line, "U1", "s1", PartyType::Student)
            .await
            .unwrap();

        let by_identity = find_active_account(&db, Provider::Line, "U1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_identity, linked);

        let by_party = find_account_for_party(&db, "s1", PartyType::Student, Provider::Line)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_party.id, linked.id);

        assert!(
            find_account_for_party(&db, "s1", PartyType::Student, Provider::Slack)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn relinking_party_deactivates_previous_identity() {
        let (db, _dir) = setup().await;
        link_account(&db, Provider::Slack, "W1", "t1", PartyType::Tutor)
            .await
            .unwrap();
        link_account(&db, Provider::Slack, "W2", "t1", PartyType::Tutor)
            .await
            .unwrap();

        assert!(find_active_account(&db, Provider::Slack, "W1").await.unwrap().is_none());
        let current = find_account_for_party(&db, "t1", PartyType::Tutor, Provider::Slack)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.external_id, "W2");

        let history = list_accounts_for_party(&db, "t1", PartyType::Tutor).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().filter(|a| a.active).count(), 1);
    }

    #[tokio::test]
    async fn identity_moves_to_new_party() {
        let (db, _dir) = setup().await;
        link_account(&db, Provider::Line, "U1", "s1", PartyType::Student)
            .await
            .unwrap();
        link_account(&db, Provider::Line, "U1", "s2", PartyType::Student)
            .await
            .unwrap();

        let owner = find_active_account(&db, Provider::Line, "U1").await.unwrap().unwrap();
        assert_eq!(owner.party_id, "s2");
        assert!(
            find_account_for_party(&db, "s1", PartyType::Student, Provider::Line)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unlink_deactivates_but_keeps_row() {
        let (db, _dir) = setup().await;
        link_account(&db, Provider::Line, "U1", "s1", PartyType::Student)
            .await
            .unwrap();
        assert!(unlink_account(&db, Provider::Line, "s1", PartyType::Student).await.unwrap());
        assert!(!unlink_account(&db, Provider::Line, "s1", PartyType::Student).await.unwrap());
        assert!(find_active_account(&db, Provider::Line, "U1").await.unwrap().is_none());
        let history = list_accounts_for_party(&db, "s1", PartyType::Student).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].active);
    }

    #[tokio::test]
    async fn conversation_handle_is_cached() {
        let (db, _dir) = setup().await;
        let account = link_account(&db, Provider::Slack, "W1", "t1", PartyType::Tutor)
            .await
            .unwrap();
        set_conversation_handle(&db, &account.id, "D024BE91L").await.unwrap();
        let reloaded = find_active_account(&db, Provider::Slack, "W1").await.unwrap().unwrap();
        assert_eq!(reloaded.conversation_handle.as_deref(), Some("D024BE91L"));
    }

    #[tokio::test]
    async fn partial_index_rejects_second_active_identity() {
        let (db, _dir) = setup().await;
        link_account(&db, Provider::Line, "U1", "s1", PartyType::Student)
            .await
            .unwrap();
        let result = db
            .connection()
            .call(|conn| -> rusqlite::Result<usize> {
                conn.execute(
                    "INSERT INTO external_accounts
                     (id, provider, external_id, party_id, party_type, active, created_at, updated_at)
                     VALUES ('x', 'line', 'U1', 's9', 'student', 1, 'now', 'now')",
                    [],
                )
            })
            .await;
        assert!(result.is_err());
    }
}
