pub mod context;
pub mod error;
pub mod handlers;
pub mod invalidator;
pub mod resolvers;
pub mod router;
pub mod routes;
pub mod state;

pub use context::RequestContext;
pub use invalidator::{EventInvalidator, InvalidatorState};
pub use router::{Operation, OperationRequest, QueryRouter};
pub use state::AppState;
