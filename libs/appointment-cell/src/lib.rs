pub mod models;
pub mod services;
pub mod context;
pub mod handlers;
pub mod router;

pub use models::*;
pub use services::*;
pub use context::{ContextError, SchedulingContext, SchedulingContextBuilder, SchedulingSettings};
pub use router::appointment_routes;
