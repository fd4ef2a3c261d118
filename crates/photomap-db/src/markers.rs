use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use crate::models::{MarkerRecord, MarkerRow, PhotoRecord, PhotoRow, ShareRow};
use crate::users::user_exists;
use crate::{Database, OptionalExt, shares};

/// Photo metadata as handed over by the upload collaborator.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub file_name: String,
    pub image_url: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhotoInsert {
    Added(PhotoRow),
    MarkerMissing,
    NotOwner,
    DuplicateFileName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDeletion {
    Deleted {
        photos_removed: usize,
        shares_revoked: usize,
    },
    Missing,
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoDeletion {
    Deleted { shares_revoked: usize },
    MarkerMissing,
    PhotoMissing,
    NotOwner,
}

#[derive(Debug, Default)]
pub(crate) struct OwnedDeletion {
    pub markers_removed: usize,
    pub photos_removed: usize,
    pub shares_revoked: usize,
}

const MARKER_COLUMNS: &str =
    "id, owner_email, lat, lng, title, location_label, color, created_at";
const PHOTO_COLUMNS: &str = "id, marker_id, file_name, image_url, uploaded_by, uploaded_at";

impl Database {
    /// Returns `false` if the owner has no user record.
    pub fn insert_marker(&self, marker: &MarkerRow) -> Result<bool> {
        self.with_tx(|tx| {
            if !user_exists(tx, &marker.owner_email)? {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO markers (id, owner_email, lat, lng, title, location_label, color, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    marker.id,
                    marker.owner_email,
                    marker.lat,
                    marker.lng,
                    marker.title,
                    marker.location_label,
                    marker.color,
                    marker.created_at,
                ],
            )?;
            Ok(true)
        })
    }

    pub fn get_marker(&self, id: &str) -> Result<Option<MarkerRecord>> {
        self.with_conn(|conn| match query_marker(conn, id)? {
            Some(marker) => load_record(conn, marker).map(Some),
            None => Ok(None),
        })
    }

    /// Markers of one owner, oldest first. `None` if the owner has no record.
    pub fn list_markers(&self, owner: &str) -> Result<Option<Vec<MarkerRecord>>> {
        self.with_conn(|conn| {
            if !user_exists(conn, owner)? {
                return Ok(None);
            }
            query_markers_for_owner(conn, owner)?
                .into_iter()
                .map(|marker| load_record(conn, marker))
                .collect::<Result<Vec<_>>>()
                .map(Some)
        })
    }

    /// Remove a marker with all of its photos and their shares.
    pub fn delete_marker(&self, caller: &str, id: &str) -> Result<MarkerDeletion> {
        self.with_tx(|tx| {
            let Some(marker) = query_marker(tx, id)? else {
                return Ok(MarkerDeletion::Missing);
            };
            if marker.owner_email != caller {
                return Ok(MarkerDeletion::NotOwner);
            }

            let shares_revoked = tx.execute(
                "DELETE FROM photo_shares
                 WHERE photo_id IN (SELECT id FROM photos WHERE marker_id = ?1)",
                [id],
            )?;
            let photos_removed = tx.execute("DELETE FROM photos WHERE marker_id = ?1", [id])?;
            tx.execute("DELETE FROM markers WHERE id = ?1", [id])?;

            Ok(MarkerDeletion::Deleted {
                photos_removed,
                shares_revoked,
            })
        })
    }

    pub fn add_photo(&self, caller: &str, marker_id: &str, photo: &NewPhoto) -> Result<PhotoInsert> {
        self.with_tx(|tx| {
            let Some(marker) = query_marker(tx, marker_id)? else {
                return Ok(PhotoInsert::MarkerMissing);
            };
            if marker.owner_email != caller {
                return Ok(PhotoInsert::NotOwner);
            }
            if query_photo_by_key(tx, &photo.file_name)?.is_some() {
                return Ok(PhotoInsert::DuplicateFileName);
            }

            tx.execute(
                "INSERT INTO photos (marker_id, file_name, image_url, uploaded_by, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    marker_id,
                    photo.file_name,
                    photo.image_url,
                    photo.uploaded_by,
                    photo.uploaded_at,
                ],
            )?;

            Ok(PhotoInsert::Added(PhotoRow {
                id: tx.last_insert_rowid(),
                marker_id: marker_id.to_string(),
                file_name: photo.file_name.clone(),
                image_url: photo.image_url.clone(),
                uploaded_by: photo.uploaded_by.clone(),
                uploaded_at: photo.uploaded_at,
            }))
        })
    }

    /// Remove one photo from a marker together with its shares.
    pub fn delete_photo(&self, caller: &str, marker_id: &str, file_name: &str) -> Result<PhotoDeletion> {
        self.with_tx(|tx| {
            let Some(marker) = query_marker(tx, marker_id)? else {
                return Ok(PhotoDeletion::MarkerMissing);
            };
            if marker.owner_email != caller {
                return Ok(PhotoDeletion::NotOwner);
            }
            let photo = match query_photo_by_key(tx, file_name)? {
                Some(photo) if photo.marker_id == marker_id => photo,
                _ => return Ok(PhotoDeletion::PhotoMissing),
            };

            let shares_revoked =
                tx.execute("DELETE FROM photo_shares WHERE photo_id = ?1", [photo.id])?;
            tx.execute("DELETE FROM photos WHERE id = ?1", [photo.id])?;

            Ok(PhotoDeletion::Deleted { shares_revoked })
        })
    }

    /// Resolve an image key (the storage file name) to its photo and shares.
    pub fn photo_by_key(&self, file_name: &str) -> Result<Option<PhotoRecord>> {
        self.with_conn(|conn| match query_photo_by_key(conn, file_name)? {
            Some(photo) => {
                let shares = shares::shares_for_photo(conn, photo.id)?;
                Ok(Some(PhotoRecord { photo, shares }))
            }
            None => Ok(None),
        })
    }
}

/// Remove every marker owned by `owner`, their photos and the shares on them.
pub(crate) fn delete_all_for_owner(conn: &Connection, owner: &str) -> Result<OwnedDeletion> {
    let shares_revoked = conn.execute(
        "DELETE FROM photo_shares WHERE photo_id IN (
             SELECT p.id FROM photos p JOIN markers m ON p.marker_id = m.id
             WHERE m.owner_email = ?1
         )",
        [owner],
    )?;
    let photos_removed = conn.execute(
        "DELETE FROM photos WHERE marker_id IN (SELECT id FROM markers WHERE owner_email = ?1)",
        [owner],
    )?;
    let markers_removed = conn.execute("DELETE FROM markers WHERE owner_email = ?1", [owner])?;

    Ok(OwnedDeletion {
        markers_removed,
        photos_removed,
        shares_revoked,
    })
}

pub(crate) fn query_marker(conn: &Connection, id: &str) -> Result<Option<MarkerRow>> {
    conn.query_row(
        &format!("SELECT {} FROM markers WHERE id = ?1", MARKER_COLUMNS),
        [id],
        marker_from_row,
    )
    .optional()
}

fn query_markers_for_owner(conn: &Connection, owner: &str) -> Result<Vec<MarkerRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM markers WHERE owner_email = ?1 ORDER BY created_at, id",
        MARKER_COLUMNS
    ))?;
    let rows = stmt
        .query_map([owner], marker_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_photo_by_key(conn: &Connection, file_name: &str) -> Result<Option<PhotoRow>> {
    conn.query_row(
        &format!("SELECT {} FROM photos WHERE file_name = ?1", PHOTO_COLUMNS),
        [file_name],
        photo_from_row,
    )
    .optional()
}

pub(crate) fn query_photo_by_id(conn: &Connection, id: i64) -> Result<Option<PhotoRow>> {
    conn.query_row(
        &format!("SELECT {} FROM photos WHERE id = ?1", PHOTO_COLUMNS),
        [id],
        photo_from_row,
    )
    .optional()
}

/// Attach photos (upload order) and their shares (grant order) to a marker.
fn load_record(conn: &Connection, marker: MarkerRow) -> Result<MarkerRecord> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM photos WHERE marker_id = ?1 ORDER BY id",
        PHOTO_COLUMNS
    ))?;
    let photos = stmt
        .query_map([&marker.id], photo_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // All shares on this marker in one query, grouped by photo
    let mut shares_by_photo: HashMap<i64, Vec<ShareRow>> = HashMap::new();
    for share in shares::shares_for_marker(conn, &marker.id)? {
        shares_by_photo.entry(share.photo_id).or_default().push(share);
    }

    let photos = photos
        .into_iter()
        .map(|photo| PhotoRecord {
            shares: shares_by_photo.remove(&photo.id).unwrap_or_default(),
            photo,
        })
        .collect();

    Ok(MarkerRecord { marker, photos })
}

pub(crate) fn marker_from_row(row: &Row<'_>) -> rusqlite::Result<MarkerRow> {
    Ok(MarkerRow {
        id: row.get(0)?,
        owner_email: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        title: row.get(4)?,
        location_label: row.get(5)?,
        color: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        marker_id: row.get(1)?,
        file_name: row.get(2)?,
        image_url: row.get(3)?,
        uploaded_by: row.get(4)?,
        uploaded_at: row.get(5)?,
    })
}
