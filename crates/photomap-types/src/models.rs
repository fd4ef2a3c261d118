use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label used when the geocoding collaborator could not name a place.
pub const UNKNOWN_LOCATION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// A user together with everything hanging off their account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub friends: Vec<String>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Pin colors the map client knows how to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum MarkerColor {
    #[default]
    Red,
    Blue,
    Green,
    Yellow,
    Orange,
    Violet,
    Azure,
}

impl MarkerColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Violet => "violet",
            Self::Azure => "azure",
        }
    }

    /// Case-insensitive lookup. Anything outside the palette renders as red.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "blue" => Self::Blue,
            "green" => Self::Green,
            "yellow" => Self::Yellow,
            "orange" => Self::Orange,
            "violet" => Self::Violet,
            "azure" => Self::Azure,
            _ => Self::Red,
        }
    }
}

impl From<String> for MarkerColor {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: Uuid,
    pub owner_email: String,
    pub position: Position,
    pub title: String,
    pub location_label: String,
    pub color: MarkerColor,
    pub photos: Vec<PhotoInstance>,
    pub created_at: DateTime<Utc>,
}

/// One uploaded photo and its share state.
///
/// `shared` always equals `!shared_to.is_empty()`; `shared_by` is the sender
/// of record and is `None` exactly when nothing is shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoInstance {
    pub image_url: String,
    pub file_name: String,
    pub uploaded_by: String,
    pub upload_timestamp: DateTime<Utc>,
    pub shared_to: Vec<String>,
    pub shared: bool,
    pub shared_by: Option<String>,
}

/// A photo as seen by one of its recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPhoto {
    pub marker_id: Uuid,
    pub marker_title: String,
    pub owner_email: String,
    pub position: Position,
    pub granted_by: String,
    pub photo: PhotoInstance,
}
