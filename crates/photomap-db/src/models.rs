/// Database row types. These map directly to SQLite rows and stay independent
/// of the API models in photomap-types.
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRow {
    pub id: String,
    pub owner_email: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub location_label: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRow {
    pub id: i64,
    pub marker_id: String,
    pub file_name: String,
    pub image_url: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShareRow {
    pub id: i64,
    pub photo_id: i64,
    pub recipient_email: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

/// A photo and its active shares, oldest grant first.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub photo: PhotoRow,
    pub shares: Vec<ShareRow>,
}

impl PhotoRecord {
    /// Sender of record: whoever granted the oldest share still standing.
    pub fn shared_by(&self) -> Option<&str> {
        self.shares.first().map(|s| s.granted_by.as_str())
    }
}

/// A marker and its photos in upload order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub marker: MarkerRow,
    pub photos: Vec<PhotoRecord>,
}

/// A share seen from the recipient's side.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedShare {
    pub marker: MarkerRow,
    pub photo: PhotoRecord,
    pub granted_by: String,
}

/// What a user deletion removed along with the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserDeletion {
    pub friendships_removed: usize,
    pub shares_revoked: usize,
    pub markers_removed: usize,
    pub photos_removed: usize,
}
