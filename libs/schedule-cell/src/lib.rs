pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::*;
pub use services::{SlotProjector, TemplateService, TemplateStore, InMemoryTemplateStore, SupabaseTemplateStore};
pub use state::ScheduleState;
pub use router::schedule_routes;
