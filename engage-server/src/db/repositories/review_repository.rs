use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use engage_types::{
    Comment, Disposition, HandledPost, MessageRef, NewReview, PendingReview, ReviewStatus,
};

use crate::db::{from_db_time, to_db_time, DbPool};

/// Storage for the review queue and its terminal records.
///
/// Terminal transitions are single transactions that delete the pending row
/// first; terminal rows are only written when that delete (or, for skips, the
/// absence of an earlier terminal row) proves this call is the first to decide.
/// The one exception is a comment that was already published: it is recorded
/// even when it lost the race.
#[derive(Clone)]
pub struct ReviewRepository {
    pool: DbPool,
}

impl ReviewRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Queue a review. First writer wins; returns false when the post already
    /// has a pending, commented or handled row.
    pub fn enqueue(&self, review: &NewReview, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.pool.get()?;
        let inserted = conn
            .execute(
                "INSERT INTO pending_reviews
                    (social_id, profile_name, post_text, generated_text, status, created_at)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6
                 WHERE NOT EXISTS (SELECT 1 FROM comments WHERE social_id = ?1)
                   AND NOT EXISTS (SELECT 1 FROM handled_posts WHERE social_id = ?1)
                 ON CONFLICT(social_id) DO NOTHING",
                rusqlite::params![
                    review.social_id,
                    review.profile_name,
                    review.post_text,
                    review.generated_text,
                    ReviewStatus::Pending.as_str(),
                    to_db_time(&now),
                ],
            )
            .context("Failed to enqueue review")?;
        Ok(inserted == 1)
    }

    /// Remember where the review message was posted
    pub fn attach_message_ref(&self, social_id: &str, message_ref: &MessageRef) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE pending_reviews SET slack_channel = ?2, slack_ts = ?3 WHERE social_id = ?1",
            rusqlite::params![social_id, message_ref.channel, message_ref.ts],
        )
        .context("Failed to store review message reference")?;
        Ok(())
    }

    pub fn get_pending(&self, social_id: &str) -> Result<Option<PendingReview>> {
        let conn = self.pool.get()?;
        let review = conn
            .query_row(
                "SELECT social_id, profile_name, post_text, generated_text, status, created_at,
                        slack_channel, slack_ts
                 FROM pending_reviews WHERE social_id = ?1",
                [social_id],
                row_to_pending,
            )
            .optional()
            .context("Failed to load pending review")?;
        Ok(review)
    }

    /// Pending reviews, oldest first
    pub fn list_pending(&self) -> Result<Vec<PendingReview>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT social_id, profile_name, post_text, generated_text, status, created_at,
                    slack_channel, slack_ts
             FROM pending_reviews ORDER BY created_at, social_id",
        )?;
        let reviews = stmt
            .query_map([], row_to_pending)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list pending reviews")?;
        Ok(reviews)
    }

    /// Record a published comment and retire the pending row, atomically.
    ///
    /// Returns false (and writes nothing) when no pending row existed, i.e.
    /// another decision got there first.
    pub fn commit_posted(
        &self,
        social_id: &str,
        comment_text: &str,
        edited: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let removed = tx
            .execute("DELETE FROM pending_reviews WHERE social_id = ?1", [social_id])
            .context("Failed to delete pending review")?;
        if removed == 0 {
            tx.rollback()?;
            return Ok(false);
        }

        let at = to_db_time(&now);
        tx.execute(
            "INSERT INTO comments (social_id, comment_text, commented_at, edited)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(social_id) DO NOTHING",
            rusqlite::params![social_id, comment_text, at, edited],
        )
        .context("Failed to record comment")?;
        tx.execute(
            "INSERT INTO handled_posts (social_id, disposition, handled_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(social_id) DO NOTHING",
            rusqlite::params![social_id, Disposition::Posted.as_str(), at],
        )
        .context("Failed to record handled post")?;

        tx.commit().context("Failed to commit posted review")?;
        Ok(true)
    }

    /// Record a skip. Returns false when the post already reached a terminal
    /// state; a stray pending row is removed either way.
    pub fn commit_skipped(&self, social_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM pending_reviews WHERE social_id = ?1", [social_id])
            .context("Failed to delete pending review")?;
        let inserted = tx
            .execute(
                "INSERT INTO handled_posts (social_id, disposition, handled_at)
                 SELECT ?1, ?2, ?3
                 WHERE NOT EXISTS (SELECT 1 FROM comments WHERE social_id = ?1)
                 ON CONFLICT(social_id) DO NOTHING",
                rusqlite::params![social_id, Disposition::Skipped.as_str(), to_db_time(&now)],
            )
            .context("Failed to record skipped post")?;

        tx.commit().context("Failed to commit skipped review")?;
        Ok(inserted == 1)
    }

    /// Record a comment that was published after another decision retired the
    /// pending row. A skip recorded in the meantime is upgraded to posted.
    ///
    /// Returns false when a comment was already recorded for the post.
    pub fn commit_late_publish(
        &self,
        social_id: &str,
        comment_text: &str,
        edited: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM pending_reviews WHERE social_id = ?1", [social_id])
            .context("Failed to delete pending review")?;
        let at = to_db_time(&now);
        let inserted = tx
            .execute(
                "INSERT INTO comments (social_id, comment_text, commented_at, edited)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(social_id) DO NOTHING",
                rusqlite::params![social_id, comment_text, at, edited],
            )
            .context("Failed to record comment")?;
        if inserted == 0 {
            tx.rollback()?;
            return Ok(false);
        }
        tx.execute(
            "INSERT INTO handled_posts (social_id, disposition, handled_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(social_id) DO UPDATE
                SET disposition = excluded.disposition, handled_at = excluded.handled_at",
            rusqlite::params![social_id, Disposition::Posted.as_str(), at],
        )
        .context("Failed to record handled post")?;

        tx.commit().context("Failed to commit late comment")?;
        Ok(true)
    }

    pub fn get_comment(&self, social_id: &str) -> Result<Option<Comment>> {
        let conn = self.pool.get()?;
        let comment = conn
            .query_row(
                "SELECT social_id, comment_text, commented_at, edited FROM comments WHERE social_id = ?1",
                [social_id],
                |row| {
                    let commented_at: String = row.get(2)?;
                    Ok(Comment {
                        social_id: row.get(0)?,
                        comment_text: row.get(1)?,
                        commented_at: from_db_time(2, &commented_at)?,
                        edited: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to load comment")?;
        Ok(comment)
    }

    pub fn get_handled(&self, social_id: &str) -> Result<Option<HandledPost>> {
        let conn = self.pool.get()?;
        let handled = conn
            .query_row(
                "SELECT social_id, disposition, handled_at FROM handled_posts WHERE social_id = ?1",
                [social_id],
                |row| {
                    let disposition: String = row.get(1)?;
                    let handled_at: String = row.get(2)?;
                    Ok(HandledPost {
                        social_id: row.get(0)?,
                        disposition: Disposition::parse(&disposition).ok_or_else(|| {
                            rusqlite::Error::InvalidColumnType(
                                1,
                                "disposition".to_string(),
                                rusqlite::types::Type::Text,
                            )
                        })?,
                        handled_at: from_db_time(2, &handled_at)?,
                    })
                },
            )
            .optional()
            .context("Failed to load handled post")?;
        Ok(handled)
    }

    pub fn count_pending(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM pending_reviews", [])
    }

    pub fn count_comments(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM comments", [])
    }

    pub fn count_handled(&self, disposition: Disposition) -> Result<i64> {
        self.count(
            "SELECT COUNT(*) FROM handled_posts WHERE disposition = ?1",
            [disposition.as_str()],
        )
    }

    fn count<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<i64> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_pending(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingReview> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let channel: Option<String> = row.get(6)?;
    let ts: Option<String> = row.get(7)?;
    Ok(PendingReview {
        social_id: row.get(0)?,
        profile_name: row.get(1)?,
        post_text: row.get(2)?,
        generated_text: row.get(3)?,
        status: ReviewStatus::parse(&status).unwrap_or_default(),
        message_ref: match (channel, ts) {
            (Some(channel), Some(ts)) => Some(MessageRef { channel, ts }),
            _ => None,
        },
        created_at: from_db_time(5, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn repo() -> ReviewRepository {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        ReviewRepository::new(db.pool)
    }

    fn review(id: &str) -> NewReview {
        NewReview {
            social_id: id.to_string(),
            profile_name: "Ada".to_string(),
            post_text: "Shipping the engine".to_string(),
            generated_text: "Congrats on the launch!".to_string(),
        }
    }

    #[test]
    fn test_enqueue_first_writer_wins() {
        let repo = repo();
        let now = Utc::now();
        assert!(repo.enqueue(&review("urn:li:activity:1"), now).unwrap());

        let mut second = review("urn:li:activity:1");
        second.generated_text = "Different draft".to_string();
        assert!(!repo.enqueue(&second, now).unwrap());

        let pending = repo.get_pending("urn:li:activity:1").unwrap().unwrap();
        assert_eq!(pending.generated_text, "Congrats on the launch!");
        assert_eq!(pending.status, ReviewStatus::Pending);
        assert_eq!(pending.message_ref, None);
    }

    #[test]
    fn test_enqueue_refuses_decided_posts() {
        let repo = repo();
        let now = Utc::now();
        repo.enqueue(&review("a"), now).unwrap();
        assert!(repo.commit_skipped("a", now).unwrap());
        assert!(!repo.enqueue(&review("a"), now).unwrap());
        assert_eq!(repo.count_pending().unwrap(), 0);
    }

    #[test]
    fn test_message_ref_round_trip() {
        let repo = repo();
        repo.enqueue(&review("a"), Utc::now()).unwrap();
        repo.attach_message_ref("a", &MessageRef::new("D123", "1700000000.000100"))
            .unwrap();
        let pending = repo.get_pending("a").unwrap().unwrap();
        assert_eq!(pending.message_ref, Some(MessageRef::new("D123", "1700000000.000100")));
    }

    #[test]
    fn test_commit_posted_once() {
        let repo = repo();
        let now = Utc::now();
        repo.enqueue(&review("a"), now).unwrap();

        assert!(repo.commit_posted("a", "Congrats!", false, now).unwrap());
        assert!(!repo.commit_posted("a", "Congrats again!", true, now).unwrap());

        assert_eq!(repo.count_comments().unwrap(), 1);
        assert_eq!(repo.count_pending().unwrap(), 0);
        assert_eq!(repo.count_handled(Disposition::Posted).unwrap(), 1);
        let comment = repo.get_comment("a").unwrap().unwrap();
        assert_eq!(comment.comment_text, "Congrats!");
        assert!(!comment.edited);
    }

    #[test]
    fn test_commit_posted_without_pending_writes_nothing() {
        let repo = repo();
        assert!(!repo.commit_posted("ghost", "text", false, Utc::now()).unwrap());
        assert_eq!(repo.count_comments().unwrap(), 0);
        assert!(repo.get_handled("ghost").unwrap().is_none());
    }

    #[test]
    fn test_skip_is_idempotent_and_loses_to_posted() {
        let repo = repo();
        let now = Utc::now();
        repo.enqueue(&review("a"), now).unwrap();
        repo.enqueue(&review("b"), now).unwrap();

        assert!(repo.commit_skipped("a", now).unwrap());
        assert!(!repo.commit_skipped("a", now).unwrap());
        assert_eq!(repo.count_handled(Disposition::Skipped).unwrap(), 1);

        repo.commit_posted("b", "Nice", false, now).unwrap();
        assert!(!repo.commit_skipped("b", now).unwrap());
        assert_eq!(
            repo.get_handled("b").unwrap().unwrap().disposition,
            Disposition::Posted
        );
    }

    #[test]
    fn test_late_publish_upgrades_skip() {
        let repo = repo();
        let now = Utc::now();
        repo.enqueue(&review("a"), now).unwrap();
        repo.commit_skipped("a", now).unwrap();

        assert!(repo.commit_late_publish("a", "Congrats!", false, now).unwrap());
        assert_eq!(repo.get_comment("a").unwrap().unwrap().comment_text, "Congrats!");
        assert_eq!(
            repo.get_handled("a").unwrap().unwrap().disposition,
            Disposition::Posted
        );
        assert_eq!(repo.count_handled(Disposition::Skipped).unwrap(), 0);

        // A second late publish keeps the first comment
        assert!(!repo.commit_late_publish("a", "Again", true, now).unwrap());
        assert_eq!(repo.count_comments().unwrap(), 1);
        assert_eq!(repo.get_comment("a").unwrap().unwrap().comment_text, "Congrats!");
    }

    #[test]
    fn test_skip_without_pending_row_still_records() {
        let repo = repo();
        assert!(repo.commit_skipped("never-queued", Utc::now()).unwrap());
        assert_eq!(
            repo.get_handled("never-queued").unwrap().unwrap().disposition,
            Disposition::Skipped
        );
    }
}
