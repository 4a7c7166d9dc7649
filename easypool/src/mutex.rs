// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// A mutex that ignores poisoning.
///
/// A panicking [`Poolable`](crate::Poolable) part is allowed to unwind through pool code; the
/// pool state stays usable afterwards.
pub(crate) struct Mutex<T: ?Sized>(std::sync::Mutex<T>);

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> Mutex<T> {
    pub(crate) const fn new(t: T) -> Self {
        Self(std::sync::Mutex::new(t))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with the lock held and returns its result.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::PoolingSettings;

    #[test]
    fn test_lock_survives_panicking_writer() {
        let settings = Arc::new(Mutex::new(PoolingSettings::default()));
        let s = settings.clone();
        let handle = std::thread::spawn(move || {
            s.with(|s| {
                s.max_thin_per_tick = 1;
                panic!("poison");
            })
        });
        let _ = handle.join();
        assert_eq!(settings.with(|s| s.max_thin_per_tick), 1);
        assert_eq!(settings.lock().default_pool_size, 10);
    }
}
