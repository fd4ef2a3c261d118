use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use photomap_db::Database;
use photomap_db::markers::{MarkerDeletion, NewPhoto, PhotoDeletion, PhotoInsert};
use photomap_db::models::{MarkerRecord, MarkerRow, PhotoRecord};
use photomap_types::api::{
    AddPhotoRequest, AddPhotoResponse, CreateLocationRequest, CreateLocationResponse,
    LocationPayload, MessageResponse,
};
use photomap_types::models::{Marker, MarkerColor, PhotoInstance, Position, UNKNOWN_LOCATION};

use crate::error::ServiceError;
use crate::state::{AppState, blocking};
use crate::users::normalize_email;

// -- Row conversion --

pub(crate) fn marker_id(row: &MarkerRow) -> Uuid {
    row.id.parse().unwrap_or_else(|e| {
        warn!("Corrupt marker id '{}': {}", row.id, e);
        Uuid::default()
    })
}

pub(crate) fn position_of(row: &MarkerRow) -> Position {
    Position {
        lat: row.lat,
        lng: row.lng,
    }
}

pub(crate) fn photo_from_record(record: PhotoRecord) -> PhotoInstance {
    let shared_by = record.shared_by().map(str::to_string);
    let shared_to: Vec<String> = record
        .shares
        .into_iter()
        .map(|s| s.recipient_email)
        .collect();

    PhotoInstance {
        image_url: record.photo.image_url,
        file_name: record.photo.file_name,
        uploaded_by: record.photo.uploaded_by,
        upload_timestamp: record.photo.uploaded_at,
        shared: !shared_to.is_empty(),
        shared_to,
        shared_by,
    }
}

pub(crate) fn marker_from_record(record: MarkerRecord) -> Marker {
    Marker {
        id: marker_id(&record.marker),
        position: position_of(&record.marker),
        color: MarkerColor::parse(&record.marker.color),
        owner_email: record.marker.owner_email,
        title: record.marker.title,
        location_label: record.marker.location_label,
        created_at: record.marker.created_at,
        photos: record.photos.into_iter().map(photo_from_record).collect(),
    }
}

/// Markers and the photos they hold.
#[derive(Clone)]
pub struct MarkerService {
    db: Arc<Database>,
}

impl MarkerService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create_marker(&self, owner: &str, payload: LocationPayload) -> Result<Marker, ServiceError> {
        let owner = normalize_email(owner)?;

        let title = payload.title.trim();
        if title.is_empty() {
            return Err(ServiceError::InvalidOperation("Marker title must not be empty".into()));
        }
        if !payload.position.is_valid() {
            return Err(ServiceError::InvalidOperation(format!(
                "Position out of range: ({}, {})",
                payload.position.lat, payload.position.lng
            )));
        }
        let location_label = payload
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(UNKNOWN_LOCATION);

        let row = MarkerRow {
            id: Uuid::new_v4().to_string(),
            owner_email: owner.clone(),
            lat: payload.position.lat,
            lng: payload.position.lng,
            title: title.to_string(),
            location_label: location_label.to_string(),
            color: payload.color.as_str().to_string(),
            created_at: Utc::now(),
        };

        if !self.db.insert_marker(&row)? {
            return Err(ServiceError::NotFound(format!("User not found: {}", owner)));
        }
        info!("{} dropped marker {} at ({}, {})", owner, row.id, row.lat, row.lng);

        Ok(marker_from_record(MarkerRecord {
            marker: row,
            photos: vec![],
        }))
    }

    pub fn list_markers(&self, owner: &str) -> Result<Vec<Marker>, ServiceError> {
        let owner = normalize_email(owner)?;
        let records = self
            .db
            .list_markers(&owner)?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}", owner)))?;
        Ok(records.into_iter().map(marker_from_record).collect())
    }

    /// Delete a marker, its photos and every share on them. Returns the
    /// number of shares revoked.
    pub fn delete_marker(&self, caller: &str, marker_id: &str) -> Result<usize, ServiceError> {
        let caller = normalize_email(caller)?;
        match self.db.delete_marker(&caller, marker_id)? {
            MarkerDeletion::Deleted {
                photos_removed,
                shares_revoked,
            } => {
                info!(
                    "{} deleted marker {} ({} photos, {} shares)",
                    caller, marker_id, photos_removed, shares_revoked
                );
                Ok(shares_revoked)
            }
            MarkerDeletion::Missing => Err(marker_not_found(marker_id)),
            MarkerDeletion::NotOwner => Err(not_owner(&caller, marker_id)),
        }
    }

    pub fn add_photo(
        &self,
        caller: &str,
        marker_id: &str,
        file_name: &str,
        image_url: &str,
        uploaded_at: Option<DateTime<Utc>>,
    ) -> Result<PhotoInstance, ServiceError> {
        let caller = normalize_email(caller)?;
        let file_name = file_name.trim();
        if file_name.is_empty() || image_url.trim().is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Photo needs a file name and an image URL".into(),
            ));
        }

        let photo = NewPhoto {
            file_name: file_name.to_string(),
            image_url: image_url.trim().to_string(),
            uploaded_by: caller.clone(),
            uploaded_at: uploaded_at.unwrap_or_else(Utc::now),
        };

        match self.db.add_photo(&caller, marker_id, &photo)? {
            PhotoInsert::Added(row) => {
                info!("{} added {} to marker {}", caller, row.file_name, marker_id);
                Ok(photo_from_record(PhotoRecord {
                    photo: row,
                    shares: vec![],
                }))
            }
            PhotoInsert::MarkerMissing => Err(marker_not_found(marker_id)),
            PhotoInsert::NotOwner => Err(not_owner(&caller, marker_id)),
            PhotoInsert::DuplicateFileName => Err(ServiceError::InvalidOperation(format!(
                "Image key already in use: {}",
                file_name
            ))),
        }
    }

    /// Delete one photo and its shares. Returns the number of shares revoked.
    pub fn delete_photo(&self, caller: &str, marker_id: &str, file_name: &str) -> Result<usize, ServiceError> {
        let caller = normalize_email(caller)?;
        match self.db.delete_photo(&caller, marker_id, file_name)? {
            PhotoDeletion::Deleted { shares_revoked } => {
                info!(
                    "{} deleted {} from marker {} ({} shares)",
                    caller, file_name, marker_id, shares_revoked
                );
                Ok(shares_revoked)
            }
            PhotoDeletion::MarkerMissing => Err(marker_not_found(marker_id)),
            PhotoDeletion::PhotoMissing => Err(ServiceError::NotFound(format!(
                "Image not found on marker {}: {}",
                marker_id, file_name
            ))),
            PhotoDeletion::NotOwner => Err(not_owner(&caller, marker_id)),
        }
    }
}

fn marker_not_found(marker_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("Marker not found: {}", marker_id))
}

fn not_owner(caller: &str, marker_id: &str) -> ServiceError {
    ServiceError::Forbidden(format!("{} does not own marker {}", caller, marker_id))
}

// -- Handlers --

/// POST /user/{email}/location
pub async fn create_location(
    State(state): State<AppState>,
    Path(email): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<CreateLocationRequest>, ServiceError>,
) -> Result<impl IntoResponse, ServiceError> {
    let marker = blocking(&state, move |s| s.markers.create_marker(&email, req.location)).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateLocationResponse {
            message: "Location added".into(),
            added_location: marker,
        }),
    ))
}

/// GET /user/{email}/locations
pub async fn list_locations(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Marker>>, ServiceError> {
    let markers = blocking(&state, move |s| s.markers.list_markers(&email)).await?;
    Ok(Json(markers))
}

/// DELETE /user/{email}/location/{marker_id}
pub async fn delete_location(
    State(state): State<AppState>,
    Path((email, marker_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ServiceError> {
    blocking(&state, move |s| s.markers.delete_marker(&email, &marker_id)).await?;
    Ok(Json(MessageResponse::new("Location deleted")))
}

/// POST /user/{email}/location/{marker_id}/photos
pub async fn add_photo(
    State(state): State<AppState>,
    Path((email, marker_id)): Path<(String, String)>,
    WithRejection(Json(req), _): WithRejection<Json<AddPhotoRequest>, ServiceError>,
) -> Result<impl IntoResponse, ServiceError> {
    let photo = blocking(&state, move |s| {
        s.markers
            .add_photo(&email, &marker_id, &req.file_name, &req.image_url, req.timestamp)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(AddPhotoResponse {
            message: "Photo added".into(),
            photo,
        }),
    ))
}

/// DELETE /user/{email}/location/{marker_id}/photos/{file_name}
pub async fn delete_photo(
    State(state): State<AppState>,
    Path((email, marker_id, file_name)): Path<(String, String, String)>,
) -> Result<Json<MessageResponse>, ServiceError> {
    blocking(&state, move |s| {
        s.markers.delete_photo(&email, &marker_id, &file_name)
    })
    .await?;
    Ok(Json(MessageResponse::new("Image deleted")))
}
