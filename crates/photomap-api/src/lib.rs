pub mod error;
pub mod friends;
pub mod markers;
pub mod routes;
pub mod sharing;
pub mod state;
pub mod users;

pub use error::ServiceError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
