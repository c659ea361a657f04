pub mod clock;
pub mod entry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entry::{EntryId, EntryState, SeenEntry, TrackedEntry};
