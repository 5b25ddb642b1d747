pub mod clock;
pub mod keys;
pub mod sweeper;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use keys::CacheKey;
pub use ttl::{Lookup, TtlCache};
