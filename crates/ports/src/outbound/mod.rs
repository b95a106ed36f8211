pub mod account_repository;
pub mod clock;
pub mod random;
pub mod session;
pub mod world_store;

pub use account_repository::AccountRepositoryPort;
pub use clock::{ClockPort, SystemClock};
pub use random::{RandomPort, SystemRandom};
pub use session::{SessionError, SessionPort};
pub use world_store::{StoreError, WorldStorePort};

#[cfg(feature = "testing")]
pub use account_repository::MockAccountRepositoryPort;
#[cfg(feature = "testing")]
pub use clock::MockClockPort;
#[cfg(feature = "testing")]
pub use random::MockRandomPort;
#[cfg(feature = "testing")]
pub use session::MockSessionPort;
#[cfg(feature = "testing")]
pub use world_store::MockWorldStorePort;
