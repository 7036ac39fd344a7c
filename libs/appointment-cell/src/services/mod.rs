pub mod availability;
pub mod booking;
pub mod ledger;
pub mod lifecycle;
pub mod supabase;

pub use availability::AvailabilityService;
pub use booking::AppointmentScheduler;
pub use ledger::{AppointmentStore, BookingLedger, InMemoryAppointmentStore, SlotClaim};
pub use lifecycle::AppointmentLifecycle;
pub use supabase::SupabaseAppointmentStore;
