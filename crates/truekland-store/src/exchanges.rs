//! Exchange proposals and their guarded status transitions.

use std::collections::BTreeMap;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use truekland_shared::validation::ExchangeProposal;
use truekland_shared::{ExchangeId, ExchangeStatus, PostId, UserId};

use crate::database::{fmt_ts, now, parse_enum, parse_ts, parse_uuid, Database};
use crate::error::{Result, StoreError};
use crate::models::{Exchange, ExchangeRole, Transition};

const EXCHANGE_COLUMNS: &str = "id, proposer_id, receiver_id, offered_post_id, requested_post_id,
        status, message, created_at, updated_at";

impl Database {
    pub fn create_exchange(
        &self,
        proposer: UserId,
        receiver: UserId,
        proposal: &ExchangeProposal,
    ) -> Result<Exchange> {
        let ts = now();
        let exchange = Exchange {
            id: ExchangeId::new(),
            proposer_id: proposer,
            receiver_id: receiver,
            offered_post_id: proposal.offered_post_id,
            requested_post_id: proposal.requested_post_id,
            status: ExchangeStatus::Pending,
            message: proposal.message.clone(),
            created_at: ts,
            updated_at: ts,
        };

        self.conn().execute(
            "INSERT INTO exchanges (id, proposer_id, receiver_id, offered_post_id,
                                    requested_post_id, status, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                exchange.id.to_string(),
                proposer.to_string(),
                receiver.to_string(),
                exchange.offered_post_id.to_string(),
                exchange.requested_post_id.to_string(),
                exchange.status.as_str(),
                exchange.message,
                fmt_ts(&ts),
            ],
        )?;

        tracing::debug!(exchange = %exchange.id, "created exchange");
        Ok(exchange)
    }

    pub fn get_exchange(&self, id: ExchangeId) -> Result<Exchange> {
        self.conn()
            .query_row(
                &format!("SELECT {EXCHANGE_COLUMNS} FROM exchanges WHERE id = ?1"),
                params![id.to_string()],
                row_to_exchange,
            )
            .map_err(StoreError::from_query)
    }

    /// Whether a pending proposal already exists for this pair of posts,
    /// in either direction.
    pub fn has_pending_exchange(&self, offered: PostId, requested: PostId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM exchanges
             WHERE status = 'pending'
               AND ((offered_post_id = ?1 AND requested_post_id = ?2)
                 OR (offered_post_id = ?2 AND requested_post_id = ?1))",
            params![offered.to_string(), requested.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Exchanges involving `user`, newest first.
    pub fn list_exchanges_for_user(
        &self,
        user: UserId,
        role: ExchangeRole,
        status: Option<ExchangeStatus>,
    ) -> Result<Vec<Exchange>> {
        let mut values = vec![Value::Text(user.to_string())];
        let mut sql = format!("SELECT {EXCHANGE_COLUMNS} FROM exchanges WHERE ");
        sql.push_str(match role {
            ExchangeRole::Any => "(proposer_id = ?1 OR receiver_id = ?1)",
            ExchangeRole::Proposer => "proposer_id = ?1",
            ExchangeRole::Receiver => "receiver_id = ?1",
        });
        if let Some(status) = status {
            values.push(Value::Text(status.as_str().to_string()));
            sql.push_str(" AND status = ?2");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_exchange)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Move an exchange from `from` to `to` as a single compare-and-set.
    ///
    /// If another writer changed the status first, nothing is written and
    /// [`StoreError::Conflict`] is returned. Accepting or completing requires
    /// both posts to still be available. Completing marks both posts
    /// unavailable and cancels every other open exchange on either post, in
    /// the same transaction.
    pub fn transition_exchange(
        &self,
        id: ExchangeId,
        from: ExchangeStatus,
        to: ExchangeStatus,
    ) -> Result<Transition> {
        let tx = self.conn().unchecked_transaction()?;
        let ts = fmt_ts(&now());

        let affected = tx.execute(
            "UPDATE exchanges SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![to.as_str(), ts, id.to_string(), from.as_str()],
        )?;

        if affected == 0 {
            drop(tx);
            let current = self.get_exchange(id)?;
            return Err(StoreError::Conflict(format!(
                "exchange is {}, expected {}",
                current.status, from
            )));
        }

        if matches!(to, ExchangeStatus::Accepted | ExchangeStatus::Completed) {
            let available: i64 = tx.query_row(
                "SELECT COUNT(*) FROM posts p JOIN exchanges e
                   ON p.id IN (e.offered_post_id, e.requested_post_id)
                 WHERE e.id = ?1 AND p.is_available = 1",
                params![id.to_string()],
                |row| row.get(0),
            )?;
            if available < 2 {
                // Dropping the transaction rolls the status change back.
                return Err(StoreError::Conflict(
                    "one of the posts is no longer available".into(),
                ));
            }
        }

        let mut superseded_ids = Vec::new();
        if to == ExchangeStatus::Completed {
            tx.execute(
                "UPDATE posts SET is_available = 0, updated_at = ?1
                 WHERE id IN (SELECT offered_post_id FROM exchanges WHERE id = ?2
                              UNION SELECT requested_post_id FROM exchanges WHERE id = ?2)",
                params![ts, id.to_string()],
            )?;

            let open_on_posts = "status IN ('pending', 'accepted') AND id != ?1
                 AND (offered_post_id IN (?2, ?3) OR requested_post_id IN (?2, ?3))";
            let (offered, requested): (String, String) = tx.query_row(
                "SELECT offered_post_id, requested_post_id FROM exchanges WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            {
                let mut stmt =
                    tx.prepare(&format!("SELECT id FROM exchanges WHERE {open_on_posts}"))?;
                let rows = stmt.query_map(params![id.to_string(), offered, requested], |row| {
                    row.get::<_, String>(0)
                })?;
                superseded_ids = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            }
            tx.execute(
                &format!(
                    "UPDATE exchanges SET status = 'cancelled', updated_at = ?4 WHERE {open_on_posts}"
                ),
                params![id.to_string(), offered, requested, ts],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            exchange = %id,
            from = %from,
            to = %to,
            superseded = superseded_ids.len(),
            "exchange transitioned"
        );

        let mut superseded = Vec::with_capacity(superseded_ids.len());
        for raw in superseded_ids {
            superseded.push(self.get_exchange(ExchangeId(parse_uuid(0, &raw)?))?);
        }
        Ok(Transition {
            exchange: self.get_exchange(id)?,
            superseded,
        })
    }

    pub fn count_exchanges_by_status(&self) -> Result<BTreeMap<String, i64>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT status, COUNT(*) FROM exchanges GROUP BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (status, n) = row?;
            counts.insert(status, n);
        }
        Ok(counts)
    }
}

fn row_to_exchange(row: &rusqlite::Row<'_>) -> rusqlite::Result<Exchange> {
    let id: String = row.get(0)?;
    let proposer: String = row.get(1)?;
    let receiver: String = row.get(2)?;
    let offered: String = row.get(3)?;
    let requested: String = row.get(4)?;
    let status: String = row.get(5)?;
    let created: String = row.get(7)?;
    let updated: String = row.get(8)?;

    Ok(Exchange {
        id: ExchangeId(parse_uuid(0, &id)?),
        proposer_id: UserId(parse_uuid(1, &proposer)?),
        receiver_id: UserId(parse_uuid(2, &receiver)?),
        offered_post_id: PostId(parse_uuid(3, &offered)?),
        requested_post_id: PostId(parse_uuid(4, &requested)?),
        status: parse_enum(5, &status)?,
        message: row.get(6)?,
        created_at: parse_ts(7, &created)?,
        updated_at: parse_ts(8, &updated)?,
    })
}
