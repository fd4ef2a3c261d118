use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::models::{PhotoRecord, ReceivedShare, ShareRow};
use crate::users::user_exists;
use crate::{Database, friends, markers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted,
    /// The recipient already had the photo; nothing changed.
    AlreadyShared,
    PhotoMissing,
    /// Sender neither owns the marker nor uploaded the photo.
    NotPermitted,
    /// Recipient is not currently a friend of the sender.
    NotFriends,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    /// The recipient did not have the photo; nothing changed.
    NotShared,
    PhotoMissing,
    /// Only the sender of record may cancel.
    NotSharer { shared_by: Option<String> },
}

const SHARE_COLUMNS: &str = "s.id, s.photo_id, s.recipient_email, s.granted_by, s.granted_at";

impl Database {
    /// Share a photo with one recipient. Ownership and friendship are checked
    /// in the same transaction as the insert, so a concurrent unfriend cannot
    /// slip between the check and the grant.
    pub fn grant_share(
        &self,
        image_key: &str,
        sender: &str,
        recipient: &str,
        now: DateTime<Utc>,
    ) -> Result<GrantOutcome> {
        self.with_tx(|tx| {
            let Some(photo) = markers::query_photo_by_key(tx, image_key)? else {
                return Ok(GrantOutcome::PhotoMissing);
            };
            let marker = markers::query_marker(tx, &photo.marker_id)?
                .ok_or_else(|| anyhow!("Photo {} points at missing marker {}", photo.id, photo.marker_id))?;

            if sender != marker.owner_email && sender != photo.uploaded_by {
                return Ok(GrantOutcome::NotPermitted);
            }
            if !friends::are_friends(tx, sender, recipient)? {
                return Ok(GrantOutcome::NotFriends);
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO photo_shares (photo_id, recipient_email, granted_by, granted_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![photo.id, recipient, sender, now],
            )?;

            Ok(if inserted == 1 {
                GrantOutcome::Granted
            } else {
                GrantOutcome::AlreadyShared
            })
        })
    }

    pub fn cancel_share(&self, image_key: &str, sender: &str, recipient: &str) -> Result<CancelOutcome> {
        self.with_tx(|tx| {
            let Some(photo) = markers::query_photo_by_key(tx, image_key)? else {
                return Ok(CancelOutcome::PhotoMissing);
            };

            let shares = shares_for_photo(tx, photo.id)?;
            if !shares.iter().any(|s| s.recipient_email == recipient) {
                return Ok(CancelOutcome::NotShared);
            }

            let shared_by = shares.first().map(|s| s.granted_by.clone());
            if shared_by.as_deref() != Some(sender) {
                return Ok(CancelOutcome::NotSharer { shared_by });
            }

            tx.execute(
                "DELETE FROM photo_shares WHERE photo_id = ?1 AND recipient_email = ?2",
                rusqlite::params![photo.id, recipient],
            )?;
            Ok(CancelOutcome::Cancelled)
        })
    }

    /// Drop every share one of the pair granted to the other. Safe to repeat.
    pub fn revoke_shares_between(&self, a: &str, b: &str) -> Result<usize> {
        self.with_tx(|tx| {
            let revoked = tx.execute(
                "DELETE FROM photo_shares
                 WHERE (granted_by = ?1 AND recipient_email = ?2)
                    OR (granted_by = ?2 AND recipient_email = ?1)",
                (a, b),
            )?;
            Ok(revoked)
        })
    }

    /// Photos currently shared with `recipient`, oldest grant first.
    /// `None` if the recipient has no record.
    pub fn shared_with(&self, recipient: &str) -> Result<Option<Vec<ReceivedShare>>> {
        self.with_conn(|conn| {
            if !user_exists(conn, recipient)? {
                return Ok(None);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM photo_shares s WHERE s.recipient_email = ?1 ORDER BY s.id",
                SHARE_COLUMNS
            ))?;
            let received = stmt
                .query_map([recipient], share_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut out = Vec::with_capacity(received.len());
            for share in received {
                let photo = markers::query_photo_by_id(conn, share.photo_id)?
                    .ok_or_else(|| anyhow!("Share {} points at missing photo {}", share.id, share.photo_id))?;
                let marker = markers::query_marker(conn, &photo.marker_id)?
                    .ok_or_else(|| anyhow!("Photo {} points at missing marker {}", photo.id, photo.marker_id))?;
                let shares = shares_for_photo(conn, photo.id)?;
                out.push(ReceivedShare {
                    marker,
                    photo: PhotoRecord { photo, shares },
                    granted_by: share.granted_by,
                });
            }
            Ok(Some(out))
        })
    }

    /// Shares whose grantor and recipient are no longer friends. Normal
    /// operation never leaves any; they are residue of an unfriend whose
    /// revocation step failed.
    pub fn stale_shares(&self) -> Result<Vec<ShareRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM photo_shares s
                 WHERE NOT EXISTS (
                     SELECT 1 FROM friendships f
                     WHERE (f.user_low = s.granted_by AND f.user_high = s.recipient_email)
                        OR (f.user_low = s.recipient_email AND f.user_high = s.granted_by)
                 )
                 ORDER BY s.id",
                SHARE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], share_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn shares_for_photo(conn: &Connection, photo_id: i64) -> Result<Vec<ShareRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM photo_shares s WHERE s.photo_id = ?1 ORDER BY s.id",
        SHARE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([photo_id], share_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn shares_for_marker(conn: &Connection, marker_id: &str) -> Result<Vec<ShareRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM photo_shares s
         JOIN photos p ON s.photo_id = p.id
         WHERE p.marker_id = ?1
         ORDER BY s.id",
        SHARE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([marker_id], share_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Revoke everything `email` granted or received.
pub(crate) fn revoke_all_involving(conn: &Connection, email: &str) -> Result<usize> {
    let revoked = conn.execute(
        "DELETE FROM photo_shares WHERE granted_by = ?1 OR recipient_email = ?1",
        [email],
    )?;
    Ok(revoked)
}

fn share_from_row(row: &Row<'_>) -> rusqlite::Result<ShareRow> {
    Ok(ShareRow {
        id: row.get(0)?,
        photo_id: row.get(1)?,
        recipient_email: row.get(2)?,
        granted_by: row.get(3)?,
        granted_at: row.get(4)?,
    })
}
