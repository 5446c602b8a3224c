mod queue;
mod rwlock;
mod semaphore;

pub use queue::LockFreeQueue;
pub use rwlock::{DEFAULT_READER_CAP, LockState, RawRwLock, ReadGuard, RwLock, WriteGuard};
pub use semaphore::Semaphore;
