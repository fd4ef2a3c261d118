use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::users::user_exists;
use crate::{Database, OptionalExt};

/// Result of an add-friend attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendshipChange {
    Added,
    AlreadyFriends,
    /// The named user has no record.
    MissingUser(String),
}

/// Canonical spelling of an undirected edge: smaller email first.
fn edge<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Database {
    pub fn add_friendship(
        &self,
        owner: &str,
        friend: &str,
        now: DateTime<Utc>,
    ) -> Result<FriendshipChange> {
        self.with_tx(|tx| {
            for email in [owner, friend] {
                if !user_exists(tx, email)? {
                    return Ok(FriendshipChange::MissingUser(email.to_string()));
                }
            }

            let (low, high) = edge(owner, friend);
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO friendships (user_low, user_high, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![low, high, now],
            )?;

            Ok(if inserted == 1 {
                FriendshipChange::Added
            } else {
                FriendshipChange::AlreadyFriends
            })
        })
    }

    /// Returns whether an edge was actually removed.
    pub fn remove_friendship(&self, owner: &str, friend: &str) -> Result<bool> {
        let (low, high) = edge(owner, friend);
        self.with_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM friendships WHERE user_low = ?1 AND user_high = ?2",
                (low, high),
            )?;
            Ok(removed > 0)
        })
    }

    /// Friend emails in sorted order, or `None` if the owner has no record.
    pub fn list_friends(&self, owner: &str) -> Result<Option<Vec<String>>> {
        self.with_conn(|conn| {
            if !user_exists(conn, owner)? {
                return Ok(None);
            }
            query_friends(conn, owner).map(Some)
        })
    }

    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| are_friends(conn, a, b))
    }
}

pub(crate) fn query_friends(conn: &Connection, owner: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_high FROM friendships WHERE user_low = ?1
         UNION
         SELECT user_low FROM friendships WHERE user_high = ?1
         ORDER BY 1",
    )?;
    let friends = stmt
        .query_map([owner], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(friends)
}

pub(crate) fn are_friends(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    let (low, high) = edge(a, b);
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM friendships WHERE user_low = ?1 AND user_high = ?2",
            (low, high),
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn remove_all_for(conn: &Connection, email: &str) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM friendships WHERE user_low = ?1 OR user_high = ?1",
        [email],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::db_with_users;

    #[test]
    fn friendship_is_symmetric() {
        let db = db_with_users(&["b@x.com", "a@x.com"]);
        assert_eq!(
            db.add_friendship("b@x.com", "a@x.com", Utc::now()).unwrap(),
            FriendshipChange::Added
        );

        assert_eq!(db.list_friends("a@x.com").unwrap().unwrap(), vec!["b@x.com"]);
        assert_eq!(db.list_friends("b@x.com").unwrap().unwrap(), vec!["a@x.com"]);
        assert!(db.are_friends("a@x.com", "b@x.com").unwrap());
        assert!(db.are_friends("b@x.com", "a@x.com").unwrap());
    }

    #[test]
    fn adding_twice_is_a_no_op() {
        let db = db_with_users(&["a@x.com", "b@x.com"]);
        db.add_friendship("a@x.com", "b@x.com", Utc::now()).unwrap();
        assert_eq!(
            db.add_friendship("b@x.com", "a@x.com", Utc::now()).unwrap(),
            FriendshipChange::AlreadyFriends
        );
        assert_eq!(db.list_friends("a@x.com").unwrap().unwrap().len(), 1);
    }

    #[test]
    fn missing_user_is_reported_without_writing() {
        let db = db_with_users(&["a@x.com"]);
        assert_eq!(
            db.add_friendship("a@x.com", "ghost@x.com", Utc::now()).unwrap(),
            FriendshipChange::MissingUser("ghost@x.com".into())
        );
        assert!(db.list_friends("a@x.com").unwrap().unwrap().is_empty());
        assert!(db.list_friends("ghost@x.com").unwrap().is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let db = db_with_users(&["a@x.com", "b@x.com"]);
        db.add_friendship("a@x.com", "b@x.com", Utc::now()).unwrap();

        assert!(db.remove_friendship("b@x.com", "a@x.com").unwrap());
        assert!(!db.remove_friendship("a@x.com", "b@x.com").unwrap());
        assert!(db.list_friends("a@x.com").unwrap().unwrap().is_empty());
        assert!(db.list_friends("b@x.com").unwrap().unwrap().is_empty());
    }

    #[test]
    fn nobody_is_their_own_friend() {
        let db = db_with_users(&["a@x.com"]);
        assert!(!db.are_friends("a@x.com", "a@x.com").unwrap());
    }
}
