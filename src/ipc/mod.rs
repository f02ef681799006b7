mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use router::{handle_request, route};
pub use types::{AppState, Request};
