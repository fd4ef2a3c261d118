use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use tracing::info;

use photomap_db::Database;
use photomap_db::models::{UserDeletion, UserRow};
use photomap_types::api::{CreateUserRequest, MessageResponse, UpdateUserRequest};
use photomap_types::models::{User, UserProfile};

use crate::error::ServiceError;
use crate::markers::marker_from_record;
use crate::state::{AppState, blocking};

/// Emails are identifiers: trimmed and compared case-insensitively.
pub fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(ServiceError::InvalidOperation("Email must not be empty".into()));
    }
    Ok(email)
}

pub(crate) fn user_from_row(row: UserRow) -> User {
    User {
        email: row.email,
        display_name: row.display_name,
        created_at: row.created_at,
    }
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Idempotent upsert: an existing user comes back unchanged.
    pub fn create_user(&self, email: &str, display_name: &str) -> Result<User, ServiceError> {
        let email = normalize_email(email)?;
        let (row, inserted) = self.db.create_user(&email, display_name.trim(), Utc::now())?;
        if inserted {
            info!("Created user {}", email);
        }
        Ok(user_from_row(row))
    }

    pub fn get_user(&self, email: &str) -> Result<User, ServiceError> {
        let email = normalize_email(email)?;
        self.db
            .get_user(&email)?
            .map(user_from_row)
            .ok_or_else(|| not_found(&email))
    }

    /// The user with their friends and markers.
    pub fn get_profile(&self, email: &str) -> Result<UserProfile, ServiceError> {
        let user = self.get_user(email)?;
        let friends = self
            .db
            .list_friends(&user.email)?
            .ok_or_else(|| not_found(&user.email))?;
        let markers = self
            .db
            .list_markers(&user.email)?
            .ok_or_else(|| not_found(&user.email))?
            .into_iter()
            .map(marker_from_record)
            .collect();

        Ok(UserProfile {
            user,
            friends,
            markers,
        })
    }

    pub fn update_display_name(&self, email: &str, display_name: &str) -> Result<User, ServiceError> {
        let email = normalize_email(email)?;
        let row = self
            .db
            .update_display_name(&email, display_name.trim())?
            .ok_or_else(|| not_found(&email))?;
        info!("Updated display name for {}", email);
        Ok(user_from_row(row))
    }

    pub fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.db.list_users()?.into_iter().map(user_from_row).collect())
    }

    /// All-or-nothing: friendships, shares and markers go in the same
    /// transaction as the user row, or nothing changes.
    pub fn delete_user(&self, email: &str) -> Result<UserDeletion, ServiceError> {
        let email = normalize_email(email)?;
        let report = self.db.delete_user(&email)?.ok_or_else(|| not_found(&email))?;
        info!(
            "Deleted user {}: {} friendships, {} shares, {} markers, {} photos",
            email,
            report.friendships_removed,
            report.shares_revoked,
            report.markers_removed,
            report.photos_removed
        );
        Ok(report)
    }
}

fn not_found(email: &str) -> ServiceError {
    ServiceError::NotFound(format!("User not found: {}", email))
}

// -- Handlers --

/// POST /user
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateUserRequest>, ServiceError>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = blocking(&state, move |s| {
        s.users.create_user(&req.google_email, &req.google_name)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /user/{email}
pub async fn get_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserProfile>, ServiceError> {
    let profile = blocking(&state, move |s| s.users.get_profile(&email)).await?;
    Ok(Json(profile))
}

/// PUT /user/{email}
pub async fn update_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateUserRequest>, ServiceError>,
) -> Result<Json<User>, ServiceError> {
    let user = blocking(&state, move |s| {
        s.users.update_display_name(&email, &req.google_name)
    })
    .await?;
    Ok(Json(user))
}

/// GET /users
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ServiceError> {
    let users = blocking(&state, |s| s.users.list_users()).await?;
    Ok(Json(users))
}

/// DELETE /user/{email}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let deleted = email.clone();
    blocking(&state, move |s| s.users.delete_user(&email)).await?;
    Ok(Json(MessageResponse::new(format!("User {} deleted", deleted))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppStateInner;
    use photomap_types::api::LocationPayload;
    use photomap_types::models::{MarkerColor, Position};

    fn services() -> AppStateInner {
        AppStateInner::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Alex@X.com ").unwrap(), "alex@x.com");
        assert!(matches!(
            normalize_email("   "),
            Err(ServiceError::InvalidOperation(_))
        ));
    }

    #[test]
    fn create_is_idempotent_and_keeps_first_name() {
        let s = services();
        let first = s.users.create_user("a@x.com", "Alex").unwrap();
        let again = s.users.create_user("A@x.com", "Other").unwrap();
        assert_eq!(first, again);
        assert_eq!(s.users.list_users().unwrap().len(), 1);
    }

    #[test]
    fn get_and_update_missing_user_is_not_found() {
        let s = services();
        assert!(matches!(s.users.get_user("ghost@x.com"), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            s.users.update_display_name("ghost@x.com", "Boo"),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(s.users.delete_user("ghost@x.com"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn profile_includes_friends_and_markers() {
        let s = services();
        s.users.create_user("a@x.com", "A").unwrap();
        s.users.create_user("b@x.com", "B").unwrap();
        s.friends.add_friend("a@x.com", "b@x.com").unwrap();
        s.markers
            .create_marker(
                "a@x.com",
                LocationPayload {
                    position: Position { lat: 1.0, lng: 2.0 },
                    title: "Home".into(),
                    location: None,
                    color: MarkerColor::Green,
                },
            )
            .unwrap();

        let profile = s.users.get_profile("a@x.com").unwrap();
        assert_eq!(profile.friends, vec!["b@x.com"]);
        assert_eq!(profile.markers.len(), 1);
        assert_eq!(profile.markers[0].title, "Home");
    }

    #[test]
    fn deleting_a_sharer_clears_everything_they_touched() {
        let s = services();
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            s.users.create_user(email, email).unwrap();
        }
        s.friends.add_friend("a@x.com", "b@x.com").unwrap();
        s.friends.add_friend("b@x.com", "c@x.com").unwrap();
        let marker = s
            .markers
            .create_marker(
                "a@x.com",
                LocationPayload {
                    position: Position { lat: 0.0, lng: 0.0 },
                    title: "M".into(),
                    location: None,
                    color: MarkerColor::default(),
                },
            )
            .unwrap();
        s.markers
            .add_photo("a@x.com", &marker.id.to_string(), "img1", "https://cdn/img1", None)
            .unwrap();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();

        s.users.delete_user("a@x.com").unwrap();

        assert!(matches!(s.users.get_user("a@x.com"), Err(ServiceError::NotFound(_))));
        assert_eq!(s.friends.list_friends("b@x.com").unwrap(), vec!["c@x.com"]);
        assert!(s.sharing.shared_with("b@x.com").unwrap().is_empty());
    }
}
