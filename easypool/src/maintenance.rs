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

//! Background maintenance on a tokio runtime.
//!
//! Pools do no work on their own: paced fill and thinning run when the host calls
//! [`Pool::tick`] or [`Registry::tick`]. A host with its own frame loop calls them there. A host
//! running on tokio can let [`spawn`] call them at a fixed period instead.
//!
//! The task holds a [`Weak`](std::sync::Weak) reference and terminates once the pool or registry
//! is dropped.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use easypool::ManageObject;
//! use easypool::PoolingSettings;
//! use easypool::Registry;
//!
//! #[derive(Clone, PartialEq, Eq, Hash)]
//! struct Buffer;
//!
//! impl ManageObject for Buffer {
//!     type Object = Vec<u8>;
//!     type Error = std::convert::Infallible;
//!
//!     fn create(&self) -> Result<Self::Object, Self::Error> {
//!         Ok(Vec::with_capacity(1024))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let registry = Arc::new(Registry::new(PoolingSettings::default()));
//! let handle = easypool::maintenance::spawn(&registry, Duration::from_millis(16));
//!
//! let buf = registry.acquire_for(&Buffer, Some(4)).unwrap();
//! assert_eq!(buf.capacity(), 1024);
//!
//! drop(registry);
//! handle.await.unwrap();
//! # }
//! ```

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ManageObject;
use crate::Pool;
use crate::Registry;

/// Something driven by periodic ticks.
pub trait Maintain: Send + Sync + 'static {
    /// Performs the work due at `now`.
    fn maintain(&self, now: Instant);
}

impl<M: ManageObject> Maintain for Pool<M> {
    fn maintain(&self, now: Instant) {
        self.tick(now);
    }
}

impl<M> Maintain for Registry<M>
where
    M: ManageObject + Clone + Eq + Hash,
{
    fn maintain(&self, now: Instant) {
        self.tick(now);
    }
}

/// Spawns a task that maintains `target` every `period`.
///
/// Ticks missed because the runtime was busy are not caught up with a burst.
///
/// # Panics
///
/// Panics if called outside a tokio runtime, or if `period` is zero.
pub fn spawn<T: Maintain>(target: &Arc<T>, period: Duration) -> JoinHandle<()> {
    let target = Arc::downgrade(target);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::spawn(async move {
        loop {
            let now = interval.tick().await;
            match target.upgrade() {
                Some(target) => target.maintain(now.into_std()),
                None => break,
            }
        }
        tracing::debug!("maintenance target dropped, stopping");
    })
}
