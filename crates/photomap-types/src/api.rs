use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Marker, MarkerColor, PhotoInstance, Position};

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub google_email: String,
    pub google_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub google_name: String,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    pub google_email: String,
    pub friend_email: String,
}

// -- Markers --

/// Body of `POST /user/{email}/location`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLocationRequest {
    pub location: LocationPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationPayload {
    pub position: Position,
    pub title: String,
    /// Reverse-geocoded place name, if the client managed to get one.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub color: MarkerColor,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationResponse {
    pub message: String,
    pub added_location: Marker,
}

// -- Photos --

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPhotoRequest {
    pub image_url: String,
    pub file_name: String,
    /// Upload time reported by the storage collaborator. Defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPhotoResponse {
    pub message: String,
    pub photo: PhotoInstance,
}

// -- Sharing --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareImageRequest {
    pub recipient_email: String,
    pub image_key: String,
    pub sender_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelShareRequest {
    pub image_key: String,
    pub sender_email: String,
    pub recipient_email: String,
}

// -- Generic --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
