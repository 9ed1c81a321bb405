pub mod avatar;
pub mod loader;
pub mod saver;
pub mod workflow;

pub use avatar::{AvatarTracker, AvatarUploader};
pub use loader::ProfileLoader;
pub use saver::ProfileSaver;
pub use workflow::OnboardingWorkflow;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Form state is plain data, so a poisoned lock is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
