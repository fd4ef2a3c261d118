use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use tracing::{debug, info};

use photomap_db::Database;
use photomap_db::friends::FriendshipChange;
use photomap_types::api::{FriendRequest, MessageResponse};

use crate::error::ServiceError;
use crate::sharing::SharingService;
use crate::state::{AppState, blocking};
use crate::users::normalize_email;

/// What `remove_friend` changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FriendRemoval {
    pub edge_removed: bool,
    pub shares_revoked: usize,
}

/// The symmetric friend relation. Each friendship is one stored edge, so both
/// sides always change together.
#[derive(Clone)]
pub struct FriendGraph {
    db: Arc<Database>,
    sharing: SharingService,
}

impl FriendGraph {
    pub fn new(db: Arc<Database>, sharing: SharingService) -> Self {
        Self { db, sharing }
    }

    pub fn add_friend(&self, owner: &str, friend: &str) -> Result<(), ServiceError> {
        let owner = normalize_email(owner)?;
        let friend = normalize_email(friend)?;
        if owner == friend {
            return Err(ServiceError::InvalidOperation(
                "Cannot add yourself as a friend".into(),
            ));
        }

        match self.db.add_friendship(&owner, &friend, Utc::now())? {
            FriendshipChange::Added => {
                info!("{} and {} are now friends", owner, friend);
                Ok(())
            }
            FriendshipChange::AlreadyFriends => {
                debug!("{} and {} were already friends", owner, friend);
                Ok(())
            }
            FriendshipChange::MissingUser(email) => {
                Err(ServiceError::NotFound(format!("User not found: {}", email)))
            }
        }
    }

    /// Remove the friendship, then revoke every share the pair granted each
    /// other. The revocation runs even when there was no edge to remove, so
    /// calling this again after a `PartialCascade` finishes the job.
    pub fn remove_friend(&self, owner: &str, friend: &str) -> Result<FriendRemoval, ServiceError> {
        let owner = normalize_email(owner)?;
        let friend = normalize_email(friend)?;

        let edge_removed = self.db.remove_friendship(&owner, &friend)?;
        if edge_removed {
            info!("{} and {} are no longer friends", owner, friend);
        }

        let shares_revoked = self
            .sharing
            .revoke_shares_for_pair(&owner, &friend)
            .map_err(|e| match e {
                ServiceError::Storage(source) => ServiceError::PartialCascade {
                    completed: "friend removal",
                    pending: "share revocation",
                    source,
                },
                other => other,
            })?;

        Ok(FriendRemoval {
            edge_removed,
            shares_revoked,
        })
    }

    pub fn list_friends(&self, owner: &str) -> Result<Vec<String>, ServiceError> {
        let owner = normalize_email(owner)?;
        self.db
            .list_friends(&owner)?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}", owner)))
    }
}

// -- Handlers --

/// POST /user/add-friend
pub async fn add_friend(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<FriendRequest>, ServiceError>,
) -> Result<Json<MessageResponse>, ServiceError> {
    blocking(&state, move |s| {
        s.friends.add_friend(&req.google_email, &req.friend_email)
    })
    .await?;
    Ok(Json(MessageResponse::new("Friend added")))
}

/// POST /user/delete-friend
pub async fn delete_friend(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<FriendRequest>, ServiceError>,
) -> Result<Json<MessageResponse>, ServiceError> {
    blocking(&state, move |s| {
        s.friends.remove_friend(&req.google_email, &req.friend_email)
    })
    .await?;
    Ok(Json(MessageResponse::new("Friend removed")))
}

/// GET /user/{email}/friends
pub async fn list_friends(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<String>>, ServiceError> {
    let friends = blocking(&state, move |s| s.friends.list_friends(&email)).await?;
    Ok(Json(friends))
}
