use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use photomap_db::Database;
use photomap_db::shares::{CancelOutcome, GrantOutcome};
use photomap_types::api::{CancelShareRequest, MessageResponse, ShareImageRequest};
use photomap_types::models::SharedPhoto;

use crate::error::ServiceError;
use crate::markers::{marker_id, photo_from_record, position_of};
use crate::state::{AppState, blocking};
use crate::users::normalize_email;

/// A share whose grantor and recipient are no longer friends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleShare {
    pub photo_id: i64,
    pub recipient_email: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
}

/// Per-photo share state: Unshared -> Shared -> Unshared, one recipient at a time.
#[derive(Clone)]
pub struct SharingService {
    db: Arc<Database>,
}

impl SharingService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Grant `recipient` access to the photo behind `image_key`.
    ///
    /// Sender must own the marker or have uploaded the photo, and recipient
    /// must be the sender's friend right now. Re-sharing is a no-op.
    pub fn share_image(&self, sender: &str, recipient: &str, image_key: &str) -> Result<(), ServiceError> {
        let sender = normalize_email(sender)?;
        let recipient = normalize_email(recipient)?;

        match self.db.grant_share(image_key, &sender, &recipient, Utc::now())? {
            GrantOutcome::Granted => {
                info!("{} shared {} with {}", sender, image_key, recipient);
                Ok(())
            }
            GrantOutcome::AlreadyShared => {
                debug!("{} already had {}", recipient, image_key);
                Ok(())
            }
            GrantOutcome::PhotoMissing => Err(photo_not_found(image_key)),
            GrantOutcome::NotPermitted => Err(ServiceError::Forbidden(format!(
                "{} cannot share {}",
                sender, image_key
            ))),
            GrantOutcome::NotFriends => Err(ServiceError::InvalidOperation(format!(
                "{} is not a friend of {}",
                recipient, sender
            ))),
        }
    }

    /// Withdraw `recipient`'s access. Only the sender of record may do this.
    pub fn cancel_share(&self, sender: &str, recipient: &str, image_key: &str) -> Result<(), ServiceError> {
        let sender = normalize_email(sender)?;
        let recipient = normalize_email(recipient)?;

        match self.db.cancel_share(image_key, &sender, &recipient)? {
            CancelOutcome::Cancelled => {
                info!("{} stopped sharing {} with {}", sender, image_key, recipient);
                Ok(())
            }
            CancelOutcome::NotShared => {
                debug!("{} did not have {}", recipient, image_key);
                Ok(())
            }
            CancelOutcome::PhotoMissing => Err(photo_not_found(image_key)),
            CancelOutcome::NotSharer { shared_by } => Err(ServiceError::Forbidden(format!(
                "{} is not the sharer of {} (shared by {})",
                sender,
                image_key,
                shared_by.as_deref().unwrap_or("nobody")
            ))),
        }
    }

    /// Drop every share either user granted the other. No-op when none exist.
    pub fn revoke_shares_for_pair(&self, a: &str, b: &str) -> Result<usize, ServiceError> {
        let revoked = self.db.revoke_shares_between(a, b)?;
        if revoked > 0 {
            info!("Revoked {} shares between {} and {}", revoked, a, b);
        }
        Ok(revoked)
    }

    /// Photos currently shared with `email`.
    pub fn shared_with(&self, email: &str) -> Result<Vec<SharedPhoto>, ServiceError> {
        let email = normalize_email(email)?;
        let received = self
            .db
            .shared_with(&email)?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}", email)))?;

        Ok(received
            .into_iter()
            .map(|r| SharedPhoto {
                marker_id: marker_id(&r.marker),
                marker_title: r.marker.title.clone(),
                owner_email: r.marker.owner_email.clone(),
                position: position_of(&r.marker),
                granted_by: r.granted_by,
                photo: photo_from_record(r.photo),
            })
            .collect())
    }

    /// Residue of unfriend cascades that did not finish.
    pub fn stale_shares(&self) -> Result<Vec<StaleShare>, ServiceError> {
        Ok(self
            .db
            .stale_shares()?
            .into_iter()
            .map(|s| StaleShare {
                photo_id: s.photo_id,
                recipient_email: s.recipient_email,
                granted_by: s.granted_by,
                granted_at: s.granted_at,
            })
            .collect())
    }
}

fn photo_not_found(image_key: &str) -> ServiceError {
    ServiceError::NotFound(format!("Image not found: {}", image_key))
}

// -- Handlers --

/// POST /image/share
pub async fn share_image(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<ShareImageRequest>, ServiceError>,
) -> Result<Json<MessageResponse>, ServiceError> {
    blocking(&state, move |s| {
        s.sharing
            .share_image(&req.sender_email, &req.recipient_email, &req.image_key)
    })
    .await?;
    Ok(Json(MessageResponse::new("Image shared")))
}

/// POST /image/cancel-share
pub async fn cancel_share(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CancelShareRequest>, ServiceError>,
) -> Result<Json<MessageResponse>, ServiceError> {
    blocking(&state, move |s| {
        s.sharing
            .cancel_share(&req.sender_email, &req.recipient_email, &req.image_key)
    })
    .await?;
    Ok(Json(MessageResponse::new("Share cancelled")))
}

/// GET /image/shared/{email}
pub async fn shared_with(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<SharedPhoto>>, ServiceError> {
    let photos = blocking(&state, move |s| s.sharing.shared_with(&email)).await?;
    Ok(Json(photos))
}

/// GET /image/stale-shares
pub async fn stale_shares(State(state): State<AppState>) -> Result<Json<Vec<StaleShare>>, ServiceError> {
    let stale = blocking(&state, |s| s.sharing.stale_shares()).await?;
    Ok(Json(stale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppStateInner;
    use photomap_types::api::LocationPayload;
    use photomap_types::models::{MarkerColor, Position};

    /// a and b are friends, a owns photo "img1". c is nobody's friend.
    fn setup() -> AppStateInner {
        let s = AppStateInner::new(Arc::new(Database::open_in_memory().unwrap()));
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            s.users.create_user(email, email).unwrap();
        }
        s.friends.add_friend("a@x.com", "b@x.com").unwrap();
        let marker = s
            .markers
            .create_marker(
                "a@x.com",
                LocationPayload {
                    position: Position { lat: 49.2, lng: -123.1 },
                    title: "Beach".into(),
                    location: Some("Vancouver".into()),
                    color: MarkerColor::Azure,
                },
            )
            .unwrap();
        s.markers
            .add_photo("a@x.com", &marker.id.to_string(), "img1", "https://cdn/img1", None)
            .unwrap();
        s
    }

    fn photo(s: &AppStateInner) -> photomap_types::models::PhotoInstance {
        s.markers.list_markers("a@x.com").unwrap()[0].photos[0].clone()
    }

    #[test]
    fn share_then_unfriend_then_reshare() {
        let s = setup();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();
        let p = photo(&s);
        assert_eq!(p.shared_to, vec!["b@x.com"]);
        assert!(p.shared);
        assert_eq!(p.shared_by.as_deref(), Some("a@x.com"));

        s.friends.remove_friend("a@x.com", "b@x.com").unwrap();
        let p = photo(&s);
        assert!(p.shared_to.is_empty());
        assert!(!p.shared);
        assert!(p.shared_by.is_none());

        assert!(matches!(
            s.sharing.share_image("a@x.com", "b@x.com", "img1"),
            Err(ServiceError::InvalidOperation(_))
        ));
    }

    #[test]
    fn sharing_requires_friendship_for_any_key() {
        let s = setup();
        assert!(matches!(
            s.sharing.share_image("a@x.com", "c@x.com", "img1"),
            Err(ServiceError::InvalidOperation(_))
        ));
        assert!(matches!(
            s.sharing.share_image("a@x.com", "c@x.com", "missing"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn only_owner_or_uploader_may_share() {
        let s = setup();
        assert!(matches!(
            s.sharing.share_image("b@x.com", "a@x.com", "img1"),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn resharing_is_idempotent() {
        let s = setup();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();
        s.sharing.share_image("a@x.com", "B@x.com", "img1").unwrap();
        assert_eq!(photo(&s).shared_to, vec!["b@x.com"]);
    }

    #[test]
    fn only_the_sharer_may_cancel() {
        let s = setup();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();

        for intruder in ["b@x.com", "c@x.com"] {
            assert!(matches!(
                s.sharing.cancel_share(intruder, "b@x.com", "img1"),
                Err(ServiceError::Forbidden(_))
            ));
        }
        assert_eq!(photo(&s).shared_to, vec!["b@x.com"]);

        s.sharing.cancel_share("a@x.com", "b@x.com", "img1").unwrap();
        let p = photo(&s);
        assert!(!p.shared);
        assert!(p.shared_by.is_none());

        // cancelling again, or a share that never existed, is fine
        s.sharing.cancel_share("a@x.com", "b@x.com", "img1").unwrap();
        s.sharing.cancel_share("c@x.com", "b@x.com", "img1").unwrap();
        assert!(matches!(
            s.sharing.cancel_share("a@x.com", "b@x.com", "nope"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn unfriend_only_revokes_that_pairs_shares() {
        let s = setup();
        s.friends.add_friend("a@x.com", "c@x.com").unwrap();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();
        s.sharing.share_image("a@x.com", "c@x.com", "img1").unwrap();

        let removal = s.friends.remove_friend("b@x.com", "a@x.com").unwrap();
        assert_eq!(removal.shares_revoked, 1);

        let p = photo(&s);
        assert_eq!(p.shared_to, vec!["c@x.com"]);
        assert!(p.shared);
        assert_eq!(p.shared_by.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn recipient_sees_shared_photos() {
        let s = setup();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();

        let shared = s.sharing.shared_with("b@x.com").unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].owner_email, "a@x.com");
        assert_eq!(shared[0].marker_title, "Beach");
        assert_eq!(shared[0].photo.file_name, "img1");
        assert!(s.sharing.shared_with("c@x.com").unwrap().is_empty());
        assert!(matches!(
            s.sharing.shared_with("ghost@x.com"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn no_stale_shares_after_normal_unfriend() {
        let s = setup();
        s.sharing.share_image("a@x.com", "b@x.com", "img1").unwrap();
        s.friends.remove_friend("a@x.com", "b@x.com").unwrap();
        assert!(s.sharing.stale_shares().unwrap().is_empty());
    }
}
