// SPDX-FileCopyrightText: 2026 Tutorlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairing queries. Status is owned elsewhere; the relay reads it and caches
//! conversation handles.

use rusqlite::{OptionalExtension, params};
use tutorlink_core::RelayError;
use tutorlink_core::types::{Pairing, PairingStatus, PartyType, Provider};

use crate::database::{Database, map_tr_err, now_timestamp, parse_column};

const PAIRING_COLUMNS: &str = "id, student_id, tutor_id, status, line_chat_id, \
     slack_channel_id, started_at, created_at, updated_at";

fn row_to_pairing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pairing> {
    Ok(Pairing {
        id: row.get(0)?,
        student_id: row.get(1)?,
        tutor_id: row.get(2)?,
        status: parse_column(row, 3)?,
        line_chat_id: row.get(4)?,
        slack_channel_id: row.get(5)?,
        started_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn handle_column(provider: Provider) -> &'static str {
    match provider {
        Provider::Line => "line_chat_id",
        Provider::Slack => "slack_channel_id",
    }
}

fn party_column(party_type: PartyType) -> &'static str {
    match party_type {
        PartyType::Student => "student_id",
        PartyType::Tutor => "tutor_id",
    }
}

/// Insert a pairing record.
pub async fn create_pairing(db: &Database, pairing: &Pairing) -> Result<(), RelayError> {
    let p = pairing.clone();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                &format!(
                    "INSERT INTO pairings ({PAIRING_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    p.id,
                    p.student_id,
                    p.tutor_id,
                    p.status.to_string(),
                    p.line_chat_id,
                    p.slack_channel_id,
                    p.started_at,
                    p.created_at,
                    p.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_pairing(db: &Database, id: &str) -> Result<Option<Pairing>, RelayError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Option<Pairing>> {
            conn.query_row(
                &format!("SELECT {PAIRING_COLUMNS} FROM pairings WHERE id = ?1"),
                params![id],
                row_to_pairing,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Active pairings for a party, most recently started first.
///
/// Pairings that never recorded a start sort after those that did; ties
/// fall back to creation time.
pub async fn active_pairings_for_party(
    db: &Database,
    party_id: &str,
    party_type: PartyType,
) -> Result<Vec<Pairing>, RelayError> {
    let party_id = party_id.to_string();
    let column = party_column(party_type);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Pairing>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PAIRING_COLUMNS} FROM pairings
                 WHERE {column} = ?1 AND status = ?2
                 ORDER BY started_at IS NULL, started_at DESC, created_at DESC"
            ))?;
            let rows = stmt.query_map(
                params![party_id, PairingStatus::Active.to_string()],
                row_to_pairing,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Pairings whose cached handle on `provider` equals `handle`.
pub async fn pairings_by_conversation_handle(
    db: &Database,
    provider: Provider,
    handle: &str,
) -> Result<Vec<Pairing>, RelayError> {
    let handle = handle.to_string();
    let column = handle_column(provider);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Pairing>> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PAIRING_COLUMNS} FROM pairings WHERE {column} = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt.query_map(params![handle], row_to_pairing)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_conversation_handle(
    db: &Database,
    pairing_id: &str,
    provider: Provider,
    handle: &str,
) -> Result<(), RelayError> {
    let pairing_id = pairing_id.to_string();
    let handle = handle.to_string();
    let column = handle_column(provider);
    let now = now_timestamp();
    db.connection()
        .call(move |conn| -> rusqlite::Result<()> {
            conn.execute(
                &format!("UPDATE pairings SET {column} = ?2, updated_at = ?3 WHERE id = ?1"),
                params![pairing_id, handle, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
