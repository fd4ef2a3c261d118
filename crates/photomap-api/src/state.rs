use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use photomap_db::Database;

use crate::error::ServiceError;
use crate::friends::FriendGraph;
use crate::markers::MarkerService;
use crate::sharing::SharingService;
use crate::users::UserService;

pub type AppState = Arc<AppStateInner>;

/// Services wired to one injected store handle.
pub struct AppStateInner {
    pub users: UserService,
    pub friends: FriendGraph,
    pub sharing: SharingService,
    pub markers: MarkerService,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>) -> Self {
        let sharing = SharingService::new(db.clone());
        Self {
            users: UserService::new(db.clone()),
            friends: FriendGraph::new(db.clone(), sharing.clone()),
            markers: MarkerService::new(db),
            sharing,
        }
    }
}

/// Run blocking service work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ServiceError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ServiceError::Storage(anyhow!("blocking task failed: {}", e))
        })?
}
