pub mod handlers;
pub mod server;

pub use handlers::{AdminService, ApiError, AppState, ErrorResponse};
pub use server::{AdminServer, build_router};
