pub mod projector;
pub mod supabase;
pub mod template;

pub use projector::SlotProjector;
pub use supabase::SupabaseTemplateStore;
pub use template::{InMemoryTemplateStore, TemplateService, TemplateStore};
