use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::debug;

use crate::models::{UserDeletion, UserRow};
use crate::{Database, OptionalExt, friends, markers, shares};

impl Database {
    /// Insert the user if the email is new. An existing record is returned
    /// untouched, display name included.
    pub fn create_user(
        &self,
        email: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<(UserRow, bool)> {
        self.with_tx(|tx| {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO users (email, display_name, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![email, display_name, now],
            )? == 1;
            let user = query_user(tx, email)?
                .ok_or_else(|| anyhow::anyhow!("User vanished after upsert: {}", email))?;
            Ok((user, inserted))
        })
    }

    pub fn get_user(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, email))
    }

    /// Returns the updated row, or `None` if no such user exists.
    pub fn update_display_name(&self, email: &str, display_name: &str) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE users SET display_name = ?2 WHERE email = ?1",
                (email, display_name),
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(tx, email)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT email, display_name, created_at FROM users ORDER BY email")?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete a user and everything that references them in one transaction:
    /// shares they granted or received, their friendships, their markers and
    /// photos (with the shares on those photos). Returns `None` if the user
    /// does not exist.
    pub fn delete_user(&self, email: &str) -> Result<Option<UserDeletion>> {
        self.with_tx(|tx| {
            if !user_exists(tx, email)? {
                return Ok(None);
            }

            let mut report = UserDeletion {
                shares_revoked: shares::revoke_all_involving(tx, email)?,
                friendships_removed: friends::remove_all_for(tx, email)?,
                ..Default::default()
            };

            let owned = markers::delete_all_for_owner(tx, email)?;
            report.shares_revoked += owned.shares_revoked;
            report.photos_removed = owned.photos_removed;
            report.markers_removed = owned.markers_removed;

            tx.execute("DELETE FROM users WHERE email = ?1", [email])?;
            debug!("Deleted user {} ({:?})", email, report);
            Ok(Some(report))
        })
    }
}

pub(crate) fn user_exists(conn: &Connection, email: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn query_user(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        "SELECT email, display_name, created_at FROM users WHERE email = ?1",
        [email],
        user_from_row,
    )
    .optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        email: row.get(0)?,
        display_name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::GrantOutcome;
    use crate::test_support::{db_with_users, marker_row, new_photo};

    #[test]
    fn create_user_is_an_idempotent_upsert() {
        let db = Database::open_in_memory().unwrap();
        let (first, inserted) = db.create_user("a@x.com", "Alex", Utc::now()).unwrap();
        assert!(inserted);

        let (second, inserted) = db.create_user("a@x.com", "Someone Else", Utc::now()).unwrap();
        assert!(!inserted);
        assert_eq!(second, first);
        assert_eq!(second.display_name, "Alex");
    }

    #[test]
    fn update_display_name_reports_missing_user() {
        let db = db_with_users(&["a@x.com"]);
        let updated = db.update_display_name("a@x.com", "Renamed").unwrap().unwrap();
        assert_eq!(updated.display_name, "Renamed");
        assert!(db.update_display_name("ghost@x.com", "Nope").unwrap().is_none());
    }

    #[test]
    fn list_users_returns_everyone() {
        let db = db_with_users(&["c@x.com", "a@x.com", "b@x.com"]);
        let emails: Vec<String> = db.list_users().unwrap().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn delete_user_cascades_everywhere() {
        let db = db_with_users(&["a@x.com", "b@x.com", "c@x.com"]);
        db.add_friendship("a@x.com", "b@x.com", Utc::now()).unwrap();
        db.add_friendship("a@x.com", "c@x.com", Utc::now()).unwrap();
        db.add_friendship("b@x.com", "c@x.com", Utc::now()).unwrap();

        // a owns a marker shared with b; c shares a photo with a
        let a_marker = marker_row("a@x.com");
        db.insert_marker(&a_marker).unwrap();
        db.add_photo("a@x.com", &a_marker.id, &new_photo("a.jpg", "a@x.com"))
            .unwrap();
        assert_eq!(
            db.grant_share("a.jpg", "a@x.com", "b@x.com", Utc::now()).unwrap(),
            GrantOutcome::Granted
        );

        let c_marker = marker_row("c@x.com");
        db.insert_marker(&c_marker).unwrap();
        db.add_photo("c@x.com", &c_marker.id, &new_photo("c.jpg", "c@x.com"))
            .unwrap();
        db.grant_share("c.jpg", "c@x.com", "a@x.com", Utc::now()).unwrap();
        db.grant_share("c.jpg", "c@x.com", "b@x.com", Utc::now()).unwrap();

        let report = db.delete_user("a@x.com").unwrap().unwrap();
        assert_eq!(report.friendships_removed, 2);
        assert_eq!(report.shares_revoked, 2);
        assert_eq!(report.markers_removed, 1);
        assert_eq!(report.photos_removed, 1);

        assert!(db.get_user("a@x.com").unwrap().is_none());
        assert_eq!(db.list_friends("b@x.com").unwrap().unwrap(), vec!["c@x.com"]);
        assert_eq!(db.list_friends("c@x.com").unwrap().unwrap(), vec!["b@x.com"]);

        // c's photo keeps its other recipient
        let c_photos = db.list_markers("c@x.com").unwrap().unwrap();
        let recipients: Vec<&str> = c_photos[0].photos[0]
            .shares
            .iter()
            .map(|s| s.recipient_email.as_str())
            .collect();
        assert_eq!(recipients, vec!["b@x.com"]);
        assert!(db.photo_by_key("a.jpg").unwrap().is_none());
    }

    #[test]
    fn delete_missing_user_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.delete_user("ghost@x.com").unwrap().is_none());
    }

    #[test]
    fn failed_cascade_keeps_the_user() {
        let db = db_with_users(&["a@x.com", "b@x.com"]);
        db.add_friendship("a@x.com", "b@x.com", Utc::now()).unwrap();
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE photo_shares")?;
            Ok(())
        })
        .unwrap();

        assert!(db.delete_user("a@x.com").is_err());
        assert!(db.get_user("a@x.com").unwrap().is_some());
        assert_eq!(db.list_friends("b@x.com").unwrap().unwrap(), vec!["a@x.com"]);
    }
}
