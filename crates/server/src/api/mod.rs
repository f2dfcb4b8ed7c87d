pub mod error;
pub mod grab;
pub mod handlers;
pub mod indexers;
pub mod middleware;
pub mod routes;
pub mod search;

pub use routes::create_router;
