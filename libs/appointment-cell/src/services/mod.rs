pub mod availability;
pub mod booking;
pub mod lifecycle;
pub mod locking;
pub mod schedule;
pub mod slots;
pub mod store;
pub mod supabase_store;

pub use availability::{Availability, AvailabilityChecker, UnavailableReason};
pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use schedule::AppointmentQueryService;
pub use slots::{SlotCursor, SlotEnumerator};
pub use store::{AppointmentStore, InMemoryAppointmentStore, StoreError};
pub use supabase_store::SupabaseAppointmentStore;
