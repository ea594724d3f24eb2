//! CRUD and search for [`Post`] listings.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};

use truekland_shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use truekland_shared::validation::{PostChanges, PostDraft};
use truekland_shared::{ExchangeStatus, PostId, UserId};

use crate::database::{fmt_ts, like_pattern, now, parse_enum, parse_ts, parse_uuid, Database};
use crate::error::{Result, StoreError};
use crate::models::{Exchange, Post, PostFilter};

const POST_SELECT: &str = "SELECT p.id, p.owner_id, u.display_name, p.title, p.description,
        p.category, p.price, p.images, p.is_authorized, p.is_available,
        p.created_at, p.updated_at
 FROM posts p JOIN users u ON u.id = p.owner_id";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_post(&self, owner: UserId, draft: &PostDraft, authorized: bool) -> Result<Post> {
        let id = PostId::new();
        let ts = now();

        self.conn().execute(
            "INSERT INTO posts (id, owner_id, title, description, category, price, images,
                                is_authorized, is_available, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
            params![
                id.to_string(),
                owner.to_string(),
                draft.title,
                draft.description,
                draft.category.as_str(),
                draft.price,
                serde_json::to_string(&draft.images)?,
                authorized,
                fmt_ts(&ts),
            ],
        )?;

        tracing::debug!(post = %id, owner = %owner, "created post");
        self.get_post(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_post(&self, id: PostId) -> Result<Post> {
        self.conn()
            .query_row(
                &format!("{POST_SELECT} WHERE p.id = ?1"),
                params![id.to_string()],
                row_to_post,
            )
            .map_err(StoreError::from_query)
    }

    /// Newest first. Without `include_hidden` only authorized, available
    /// listings are returned.
    pub fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.include_hidden {
            clauses.push("p.is_authorized = 1 AND p.is_available = 1".into());
        }
        if let Some(category) = filter.category {
            values.push(Value::Text(category.as_str().to_string()));
            clauses.push(format!("p.category = ?{}", values.len()));
        }
        if let Some(owner) = filter.owner {
            values.push(Value::Text(owner.to_string()));
            clauses.push(format!("p.owner_id = ?{}", values.len()));
        }
        if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            values.push(Value::Text(like_pattern(query)));
            let n = values.len();
            clauses.push(format!(
                "(p.title LIKE ?{n} ESCAPE '\\' OR p.description LIKE ?{n} ESCAPE '\\')"
            ));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let limit = match filter.limit {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        values.push(Value::Integer(i64::from(limit)));
        let limit_idx = values.len();
        values.push(Value::Integer(i64::from(filter.offset)));
        let offset_idx = values.len();

        let sql = format!(
            "{POST_SELECT}{where_sql} ORDER BY p.created_at DESC, p.rowid DESC
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_post)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply owner edits. Moderation and availability flags are untouched.
    pub fn update_post(&self, id: PostId, changes: &PostChanges) -> Result<Post> {
        let mut post = self.get_post(id)?;

        if let Some(title) = &changes.title {
            post.title = title.clone();
        }
        if let Some(description) = &changes.description {
            post.description = description.clone();
        }
        if let Some(category) = changes.category {
            post.category = category;
        }
        if let Some(price) = changes.price {
            post.price = price;
        }
        if let Some(images) = &changes.images {
            post.images = images.clone();
        }
        post.updated_at = now();

        self.conn().execute(
            "UPDATE posts
             SET title = ?1, description = ?2, category = ?3, price = ?4, images = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                post.title,
                post.description,
                post.category.as_str(),
                post.price,
                serde_json::to_string(&post.images)?,
                fmt_ts(&post.updated_at),
                id.to_string(),
            ],
        )?;

        Ok(post)
    }

    pub fn set_post_authorized(&self, id: PostId, authorized: bool) -> Result<Post> {
        self.set_post_flag(id, "is_authorized", authorized)
    }

    pub fn set_post_available(&self, id: PostId, available: bool) -> Result<Post> {
        self.set_post_flag(id, "is_available", available)
    }

    fn set_post_flag(&self, id: PostId, column: &'static str, value: bool) -> Result<Post> {
        let affected = self.conn().execute(
            &format!("UPDATE posts SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
            params![value, fmt_ts(&now()), id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get_post(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a listing. Open exchanges that mention it are cancelled in the
    /// same transaction and returned.
    pub fn delete_post(&self, id: PostId) -> Result<Vec<Exchange>> {
        let tx = self.conn().unchecked_transaction()?;

        let open = {
            let mut stmt = tx.prepare(
                "SELECT id FROM exchanges
                 WHERE status IN ('pending', 'accepted')
                   AND (offered_post_id = ?1 OR requested_post_id = ?1)",
            )?;
            let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
            let ids = rows.collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };

        tx.execute(
            "UPDATE exchanges SET status = ?1, updated_at = ?2
             WHERE status IN ('pending', 'accepted')
               AND (offered_post_id = ?3 OR requested_post_id = ?3)",
            params![
                ExchangeStatus::Cancelled.as_str(),
                fmt_ts(&now()),
                id.to_string()
            ],
        )?;

        let affected = tx.execute("DELETE FROM posts WHERE id = ?1", params![id.to_string()])?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        tx.commit()?;

        tracing::debug!(post = %id, cancelled = open.len(), "deleted post");

        let mut cancelled = Vec::with_capacity(open.len());
        for raw in open {
            let exchange_id = parse_uuid(0, &raw)?;
            cancelled.push(self.get_exchange(exchange_id.into())?);
        }
        Ok(cancelled)
    }

    pub fn count_posts(&self) -> Result<(i64, i64)> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN is_authorized = 0 THEN 1 ELSE 0 END), 0)
             FROM posts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let id: String = row.get(0)?;
    let owner: String = row.get(1)?;
    let category: String = row.get(5)?;
    let images: String = row.get(7)?;
    let created: String = row.get(10)?;
    let updated: String = row.get(11)?;

    let images: Vec<String> = serde_json::from_str(&images).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Post {
        id: PostId(parse_uuid(0, &id)?),
        owner_id: UserId(parse_uuid(1, &owner)?),
        owner_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        category: parse_enum(5, &category)?,
        price: row.get(6)?,
        images,
        is_authorized: row.get(8)?,
        is_available: row.get(9)?,
        created_at: parse_ts(10, &created)?,
        updated_at: parse_ts(11, &updated)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft, seed_user};
    use truekland_shared::Category;

    #[test]
    fn create_get_and_owner_name() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");

        let post = db.create_post(ana, &draft("Guitar", Category::Music), true).unwrap();
        assert_eq!(post.owner_name, "ana");
        assert_eq!(post.images.len(), 1);
        assert!(post.is_public());
        assert_eq!(db.get_post(post.id).unwrap(), post);
    }

    #[test]
    fn browse_hides_unauthorized_and_filters() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");

        let guitar = db.create_post(ana, &draft("Guitar", Category::Music), true).unwrap();
        db.create_post(ana, &draft("Drill", Category::Tools), true).unwrap();
        let hidden = db.create_post(ana, &draft("Piano", Category::Music), false).unwrap();

        let music = db
            .list_posts(&PostFilter {
                category: Some(Category::Music),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(music.iter().map(|p| p.id).collect::<Vec<_>>(), vec![guitar.id]);

        let all = db
            .list_posts(&PostFilter {
                include_hidden: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), 3);
        // Newest first.
        assert_eq!(all[0].id, hidden.id);
    }

    #[test]
    fn search_is_case_insensitive_and_literal() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        db.create_post(ana, &draft("Vintage GUITAR", Category::Music), true).unwrap();
        db.create_post(ana, &draft("Drill", Category::Tools), true).unwrap();

        let found = db
            .list_posts(&PostFilter {
                query: Some("guitar".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);

        let none = db
            .list_posts(&PostFilter {
                query: Some("%".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn paging() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        for i in 0..5 {
            db.create_post(ana, &draft(&format!("Item {i}"), Category::Other), true)
                .unwrap();
        }
        let page = db
            .list_posts(&PostFilter {
                limit: 2,
                offset: 4,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Item 0");
    }

    #[test]
    fn update_and_flags() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let post = db.create_post(ana, &draft("Guitar", Category::Music), true).unwrap();

        let updated = db
            .update_post(
                post.id,
                &PostChanges {
                    price: Some(99.5),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.price, 99.5);
        assert_eq!(updated.title, "Guitar");

        let hidden = db.set_post_authorized(post.id, false).unwrap();
        assert!(!hidden.is_authorized);
        assert_eq!(db.count_posts().unwrap(), (1, 1));

        assert!(matches!(
            db.set_post_available(PostId::new(), false),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn delete_missing_post() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.delete_post(PostId::new()), Err(StoreError::NotFound)));
    }
}
