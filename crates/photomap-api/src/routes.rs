use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

use crate::state::AppState;
use crate::{friends, markers, sharing, users};

/// Every public route, bound to `state`. Cross-cutting layers (CORS, tracing)
/// are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        // users
        .route("/user", post(users::create_user))
        .route("/users", get(users::list_users))
        .route(
            "/user/{email}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        // friends
        .route("/user/add-friend", post(friends::add_friend))
        .route("/user/delete-friend", post(friends::delete_friend))
        .route("/user/{email}/friends", get(friends::list_friends))
        // markers and photos
        .route("/user/{email}/location", post(markers::create_location))
        .route("/user/{email}/locations", get(markers::list_locations))
        .route("/user/{email}/location/{marker_id}", delete(markers::delete_location))
        .route("/user/{email}/location/{marker_id}/photos", post(markers::add_photo))
        .route(
            "/user/{email}/location/{marker_id}/photos/{file_name}",
            delete(markers::delete_photo),
        )
        // sharing
        .route("/image/share", post(sharing::share_image))
        .route("/image/cancel-share", post(sharing::cancel_share))
        .route("/image/shared/{email}", get(sharing::shared_with))
        .route("/image/stale-shares", get(sharing::stale_shares))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
