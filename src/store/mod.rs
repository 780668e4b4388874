mod admin;

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Comment, Idea};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::tenant::Tenant;

/// Tenant-scoped repository over the SQLite pool. Every operation takes the
/// tenant explicitly; the partition key is bound in SQL, never concatenated
/// into it.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
}

/// Input for idea creation. The author comes from the caller's session, the
/// id, vote count and timestamp are assigned here.
#[derive(Debug, Clone)]
pub struct NewIdea {
    pub title: String,
    pub description: String,
    pub author_email: String,
}

#[derive(Debug, Clone, Default)]
pub struct IdeaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

const SEED_TITLE: &str = "Light Mode by default";
const SEED_DESCRIPTION: &str = "The app should detect system preference and set light mode accordingly, as per the latest design guidelines.";
const SEED_COMMENT: &str = "This should definitely be a thing!";
const SEED_AUTHOR: &str = "hello@ideaboard.dev";
const SEED_VOTES: i64 = 5;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

fn seed_id(tenant: &Tenant, kind: &str) -> String {
    let name = format!("{}/seed/{kind}", tenant.as_str());
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

impl Store {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// A board accepts no content until its admin has completed credential
    /// registration. Called at the top of every mutating operation.
    fn ensure_admin_configured(&self, conn: &Connection, tenant: &Tenant) -> AppResult<()> {
        let configured: bool = conn
            .query_row(
                "SELECT passkey_json IS NOT NULL FROM admin_credentials WHERE host = ?1",
                params![tenant.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(false);

        if configured {
            Ok(())
        } else {
            Err(AppError::AdminNotConfigured)
        }
    }

    // -- Ideas --

    /// List a tenant's ideas newest-first with nested comments. An empty
    /// board is seeded with one starter idea; seeding is idempotent.
    pub fn list_ideas(&self, tenant: &Tenant) -> AppResult<Vec<Idea>> {
        let conn = self.pool.get()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ideas WHERE host = ?1",
            params![tenant.as_str()],
            |row| row.get(0),
        )?;
        if count == 0 {
            self.seed_starter_idea(&conn, tenant)?;
        }

        let mut stmt = conn.prepare(
            "SELECT id, title, description, author_email, votes, created_at
             FROM ideas WHERE host = ?1 ORDER BY created_at DESC",
        )?;
        let mut ideas: Vec<Idea> = stmt
            .query_map(params![tenant.as_str()], |row| {
                Ok(Idea {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    author_email: row.get(3)?,
                    votes: row.get(4)?,
                    created_at: row.get(5)?,
                    comments: Vec::new(),
                })
            })?
            .collect::<Result<_, _>>()?;

        // One query for all comments instead of one per idea.
        let mut stmt = conn.prepare(
            "SELECT idea_id, id, text, author_email, created_at
             FROM comments WHERE host = ?1 ORDER BY created_at ASC",
        )?;
        let comments: Vec<(String, Comment)> = stmt
            .query_map(params![tenant.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Comment {
                        id: row.get(1)?,
                        text: row.get(2)?,
                        author_email: row.get(3)?,
                        created_at: row.get(4)?,
                    },
                ))
            })?
            .collect::<Result<_, _>>()?;

        for (idea_id, comment) in comments {
            if let Some(idea) = ideas.iter_mut().find(|i| i.id == idea_id) {
                idea.comments.push(comment);
            }
        }

        Ok(ideas)
    }

    pub fn get_idea(&self, tenant: &Tenant, id: &str) -> AppResult<Idea> {
        let conn = self.pool.get()?;
        self.get_idea_on(&conn, tenant, id)
    }

    fn get_idea_on(&self, conn: &Connection, tenant: &Tenant, id: &str) -> AppResult<Idea> {
        let mut idea = conn
            .query_row(
                "SELECT id, title, description, author_email, votes, created_at
                 FROM ideas WHERE host = ?1 AND id = ?2",
                params![tenant.as_str(), id],
                |row| {
                    Ok(Idea {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        author_email: row.get(3)?,
                        votes: row.get(4)?,
                        created_at: row.get(5)?,
                        comments: Vec::new(),
                    })
                },
            )
            .optional()?
            .ok_or(AppError::NotFound)?;

        let mut stmt = conn.prepare(
            "SELECT id, text, author_email, created_at
             FROM comments WHERE host = ?1 AND idea_id = ?2 ORDER BY created_at ASC",
        )?;
        idea.comments = stmt
            .query_map(params![tenant.as_str(), id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    author_email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<_, _>>()?;

        Ok(idea)
    }

    pub fn create_idea(&self, tenant: &Tenant, new: NewIdea) -> AppResult<Idea> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        let idea = Idea {
            id: new_id(),
            title: new.title,
            description: new.description,
            author_email: new.author_email,
            votes: 0,
            created_at: now_ms(),
            comments: Vec::new(),
        };

        conn.execute(
            "INSERT INTO ideas (host, id, title, description, author_email, votes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tenant.as_str(),
                idea.id,
                idea.title,
                idea.description,
                idea.author_email,
                idea.votes,
                idea.created_at
            ],
        )?;

        Ok(idea)
    }

    pub fn update_idea(&self, tenant: &Tenant, id: &str, patch: IdeaPatch) -> AppResult<Idea> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        let current = self.get_idea_on(&conn, tenant, id)?;
        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.unwrap_or(current.description);

        conn.execute(
            "UPDATE ideas SET title = ?1, description = ?2 WHERE host = ?3 AND id = ?4",
            params![title, description, tenant.as_str(), id],
        )?;

        self.get_idea_on(&conn, tenant, id)
    }

    /// Delete an idea and all of its comments in one transaction.
    pub fn delete_idea(&self, tenant: &Tenant, id: &str) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM comments WHERE host = ?1 AND idea_id = ?2",
            params![tenant.as_str(), id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM ideas WHERE host = ?1 AND id = ?2",
            params![tenant.as_str(), id],
        )?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        tx.commit()?;
        Ok(())
    }

    /// Apply a vote delta, clamped at zero. The clamp happens inside a
    /// single UPDATE so concurrent voters cannot lose updates.
    pub fn vote_idea(&self, tenant: &Tenant, id: &str, delta: i64) -> AppResult<Idea> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        conn.query_row(
            "UPDATE ideas SET votes = MAX(0, votes + ?1)
             WHERE host = ?2 AND id = ?3 RETURNING votes",
            params![delta, tenant.as_str(), id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

        self.get_idea_on(&conn, tenant, id)
    }

    pub fn reset_votes(&self, tenant: &Tenant, id: &str) -> AppResult<Idea> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        let updated = conn.execute(
            "UPDATE ideas SET votes = 0 WHERE host = ?1 AND id = ?2",
            params![tenant.as_str(), id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }

        self.get_idea_on(&conn, tenant, id)
    }

    // -- Comments --

    pub fn add_comment(
        &self,
        tenant: &Tenant,
        idea_id: &str,
        text: String,
        author_email: String,
    ) -> AppResult<Comment> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        // Surface a clean NotFound instead of a foreign-key failure.
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM ideas WHERE host = ?1 AND id = ?2",
            params![tenant.as_str(), idea_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound);
        }

        let comment = Comment {
            id: new_id(),
            text,
            author_email,
            created_at: now_ms(),
        };

        conn.execute(
            "INSERT INTO comments (host, idea_id, id, text, author_email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tenant.as_str(),
                idea_id,
                comment.id,
                comment.text,
                comment.author_email,
                comment.created_at
            ],
        )?;

        Ok(comment)
    }

    pub fn get_comment(
        &self,
        tenant: &Tenant,
        idea_id: &str,
        comment_id: &str,
    ) -> AppResult<Comment> {
        let conn = self.pool.get()?;
        self.get_comment_on(&conn, tenant, idea_id, comment_id)
    }

    fn get_comment_on(
        &self,
        conn: &Connection,
        tenant: &Tenant,
        idea_id: &str,
        comment_id: &str,
    ) -> AppResult<Comment> {
        conn.query_row(
            "SELECT id, text, author_email, created_at
             FROM comments WHERE host = ?1 AND idea_id = ?2 AND id = ?3",
            params![tenant.as_str(), idea_id, comment_id],
            |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    author_email: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or(AppError::NotFound)
    }

    pub fn update_comment(
        &self,
        tenant: &Tenant,
        idea_id: &str,
        comment_id: &str,
        text: String,
    ) -> AppResult<Comment> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        let updated = conn.execute(
            "UPDATE comments SET text = ?1 WHERE host = ?2 AND idea_id = ?3 AND id = ?4",
            params![text, tenant.as_str(), idea_id, comment_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound);
        }

        self.get_comment_on(&conn, tenant, idea_id, comment_id)
    }

    pub fn delete_comment(
        &self,
        tenant: &Tenant,
        idea_id: &str,
        comment_id: &str,
    ) -> AppResult<()> {
        let conn = self.pool.get()?;
        self.ensure_admin_configured(&conn, tenant)?;

        let deleted = conn.execute(
            "DELETE FROM comments WHERE host = ?1 AND idea_id = ?2 AND id = ?3",
            params![tenant.as_str(), idea_id, comment_id],
        )?;
        if deleted == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    // -- Seeding --

    /// Insert the fixed starter idea for an empty board. Runs without the
    /// admin-setup gate; this is the only write that does. The ids are a
    /// deterministic function of the tenant and the inserts are OR IGNORE,
    /// so concurrent first reads collapse to a single seed.
    fn seed_starter_idea(&self, conn: &Connection, tenant: &Tenant) -> AppResult<()> {
        let idea_id = seed_id(tenant, "idea");
        let comment_id = seed_id(tenant, "comment");
        let now = now_ms();

        conn.execute(
            "INSERT OR IGNORE INTO ideas (host, id, title, description, author_email, votes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tenant.as_str(),
                idea_id,
                SEED_TITLE,
                SEED_DESCRIPTION,
                SEED_AUTHOR,
                SEED_VOTES,
                now
            ],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO comments (host, idea_id, id, text, author_email, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                tenant.as_str(),
                idea_id,
                comment_id,
                SEED_COMMENT,
                SEED_AUTHOR,
                now
            ],
        )?;

        tracing::info!(tenant = tenant.as_str(), "Seeded starter idea");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_store() -> Store {
        Store::new(db::test_pool())
    }

    fn tenant(host: &str) -> Tenant {
        Tenant::new(host)
    }

    /// Mark a tenant's admin as configured so gated writes go through.
    fn configure_admin(store: &Store, tenant: &Tenant) {
        store
            .create_admin(tenant, "admin", "{\"fake\":\"passkey\"}")
            .unwrap();
    }

    fn new_idea(author: &str) -> NewIdea {
        NewIdea {
            title: "A test idea".to_string(),
            description: "Something that really should exist".to_string(),
            author_email: author.to_string(),
        }
    }

    #[test]
    fn list_seeds_exactly_once() {
        let store = test_store();
        let t = tenant("a.test");

        let first = store.list_ideas(&t).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, SEED_TITLE);
        assert_eq!(first[0].votes, SEED_VOTES);
        assert_eq!(first[0].comments.len(), 1);
        assert_eq!(first[0].comments[0].text, SEED_COMMENT);

        let second = store.list_ideas(&t).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
    }

    #[test]
    fn concurrent_first_reads_seed_one_idea() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(db::shared_test_pool(dir.path()));
        let t = tenant("seedrace.test");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let t = t.clone();
                std::thread::spawn(move || store.list_ideas(&t).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let ideas = store.list_ideas(&t).unwrap();
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas[0].title, SEED_TITLE);
        assert_eq!(ideas[0].comments.len(), 1);
    }

    #[test]
    fn writes_fail_before_admin_setup() {
        let store = test_store();
        let t = tenant("b.test");

        let err = store.create_idea(&t, new_idea("u@x.com")).unwrap_err();
        assert!(matches!(err, AppError::AdminNotConfigured));

        // Nothing was persisted (the seed only runs on list)
        let conn = store.pool().get().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM ideas WHERE host = 'b.test'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn vote_floor_never_goes_negative() {
        let store = test_store();
        let t = tenant("votes.test");
        configure_admin(&store, &t);

        let idea = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        assert_eq!(idea.votes, 0);

        let after_unvote = store.vote_idea(&t, &idea.id, -1).unwrap();
        assert_eq!(after_unvote.votes, 0);

        let up = store.vote_idea(&t, &idea.id, 1).unwrap();
        assert_eq!(up.votes, 1);
        let up2 = store.vote_idea(&t, &idea.id, 1).unwrap();
        assert_eq!(up2.votes, 2);

        store.vote_idea(&t, &idea.id, -1).unwrap();
        store.vote_idea(&t, &idea.id, -1).unwrap();
        let floored = store.vote_idea(&t, &idea.id, -1).unwrap();
        assert_eq!(floored.votes, 0);
    }

    #[test]
    fn reset_votes_zeroes_the_counter() {
        let store = test_store();
        let t = tenant("reset.test");
        configure_admin(&store, &t);

        let idea = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        store.vote_idea(&t, &idea.id, 1).unwrap();
        store.vote_idea(&t, &idea.id, 1).unwrap();

        let reset = store.reset_votes(&t, &idea.id).unwrap();
        assert_eq!(reset.votes, 0);
    }

    #[test]
    fn tenants_are_isolated() {
        let store = test_store();
        let t1 = tenant("one.test");
        let t2 = tenant("two.test");
        configure_admin(&store, &t1);
        configure_admin(&store, &t2);

        let idea = store.create_idea(&t1, new_idea("u@x.com")).unwrap();

        assert!(matches!(
            store.get_idea(&t2, &idea.id).unwrap_err(),
            AppError::NotFound
        ));
        let t2_ideas = store.list_ideas(&t2).unwrap();
        assert!(t2_ideas.iter().all(|i| i.id != idea.id));
    }

    #[test]
    fn delete_idea_cascades_comments() {
        let store = test_store();
        let t = tenant("cascade.test");
        configure_admin(&store, &t);

        let idea = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        for n in 0..3 {
            store
                .add_comment(&t, &idea.id, format!("comment {n}"), "c@x.com".to_string())
                .unwrap();
        }

        store.delete_idea(&t, &idea.id).unwrap();

        let conn = store.pool().get().unwrap();
        let remaining: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM comments WHERE host = 'cascade.test' AND idea_id = ?1",
                params![idea.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn update_idea_applies_partial_patch() {
        let store = test_store();
        let t = tenant("patch.test");
        configure_admin(&store, &t);

        let idea = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        let updated = store
            .update_idea(
                &t,
                &idea.id,
                IdeaPatch {
                    title: Some("New title".to_string()),
                    description: None,
                },
            )
            .unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.description, idea.description);
    }

    #[test]
    fn comment_crud_roundtrip() {
        let store = test_store();
        let t = tenant("comments.test");
        configure_admin(&store, &t);

        let idea = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        let comment = store
            .add_comment(&t, &idea.id, "first".to_string(), "c@x.com".to_string())
            .unwrap();

        let edited = store
            .update_comment(&t, &idea.id, &comment.id, "edited".to_string())
            .unwrap();
        assert_eq!(edited.text, "edited");
        assert_eq!(edited.author_email, "c@x.com");

        store.delete_comment(&t, &idea.id, &comment.id).unwrap();
        assert!(matches!(
            store.get_comment(&t, &idea.id, &comment.id).unwrap_err(),
            AppError::NotFound
        ));
    }

    #[test]
    fn comment_on_missing_idea_is_not_found() {
        let store = test_store();
        let t = tenant("ghost.test");
        configure_admin(&store, &t);

        let err = store
            .add_comment(&t, "no-such-idea", "hi".to_string(), "c@x.com".to_string())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn vote_on_missing_idea_is_not_found() {
        let store = test_store();
        let t = tenant("missing.test");
        configure_admin(&store, &t);

        let err = store.vote_idea(&t, "nope", 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn ids_are_unique_and_timestamps_present() {
        let store = test_store();
        let t = tenant("ids.test");
        configure_admin(&store, &t);

        let a = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        let b = store.create_idea(&t, new_idea("u@x.com")).unwrap();
        assert_ne!(a.id, b.id);
        assert!(a.created_at > 0);
    }

    #[test]
    fn list_orders_newest_first() {
        let store = test_store();
        let t = tenant("order.test");
        configure_admin(&store, &t);

        // Bypass create timestamps to control ordering.
        let conn = store.pool().get().unwrap();
        for (id, ts) in [("old", 100), ("new", 200)] {
            conn.execute(
                "INSERT INTO ideas (host, id, title, description, author_email, votes, created_at)
                 VALUES ('order.test', ?1, 'Title', 'Description..', 'u@x.com', 0, ?2)",
                params![id, ts],
            )
            .unwrap();
        }
        drop(conn);

        let ideas = store.list_ideas(&t).unwrap();
        assert_eq!(ideas[0].id, "new");
        assert_eq!(ideas[1].id, "old");
    }
}
