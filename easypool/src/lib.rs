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

//! Template-keyed object pools for heavyweight, reusable resources.
//!
//! A [`Pool`] hands out resources built by a template ([`ManageObject`]) and takes them back
//! when their [`Pooled`] handle is dropped. It grows by one instead of failing when empty, fills
//! itself up to a target size ahead of demand, and thins out surplus idle resources in small,
//! rate-limited batches. A [`Registry`] keeps one pool per template.
//!
//! Resources take part in the pooling lifecycle through their [`Poolable`] parts, which are
//! initialized when the resource is handed out and recycled when it comes back.
//!
//! # Example
//!
//! ```
//! use std::convert::Infallible;
//! use std::time::Instant;
//!
//! use easypool::Compose;
//! use easypool::ManageObject;
//! use easypool::Poolable;
//! use easypool::PoolingSettings;
//! use easypool::Registry;
//!
//! struct Trail {
//!     points: Vec<(f32, f32)>,
//! }
//!
//! impl Poolable for Trail {
//!     fn initialize(&mut self) {}
//!
//!     fn recycle(&mut self) {
//!         self.points.clear();
//!     }
//! }
//!
//! struct Bullet {
//!     trail: Trail,
//! }
//!
//! impl Compose for Bullet {
//!     fn for_each_part(&mut self, visit: &mut dyn FnMut(&mut dyn Poolable)) {
//!         visit(&mut self.trail);
//!     }
//! }
//!
//! #[derive(Clone, PartialEq, Eq, Hash)]
//! struct BulletTemplate;
//!
//! impl ManageObject for BulletTemplate {
//!     type Object = Bullet;
//!     type Error = Infallible;
//!
//!     fn create(&self) -> Result<Self::Object, Self::Error> {
//!         Ok(Bullet {
//!             trail: Trail { points: vec![] },
//!         })
//!     }
//! }
//!
//! let registry = Registry::new(PoolingSettings::default());
//!
//! let mut bullet = registry.acquire_for(&BulletTemplate, None).unwrap();
//! bullet.trail.points.push((0.0, 1.0));
//! registry.release(bullet);
//!
//! let pool = registry.pool(&BulletTemplate).unwrap();
//! assert_eq!(pool.status().idle_count, 1);
//!
//! // paced fill: one more resource per tick until the default size of 10 is reached
//! registry.tick(Instant::now());
//! assert_eq!(pool.status().idle_count, 2);
//!
//! let bullet = pool.get().unwrap();
//! assert!(bullet.trail.points.is_empty());
//! ```

mod entry;
mod manage;
mod mutex;
mod pool;
mod registry;
mod settings;

#[cfg(feature = "tokio")]
pub mod maintenance;

pub use entry::Entry;
pub use entry::EntryStatus;
pub use manage::Compose;
pub use manage::ManageObject;
pub use manage::Poolable;
pub use pool::Pool;
pub use pool::PoolStatus;
pub use pool::Pooled;
pub use pool::RetainResult;
pub use registry::Registry;
pub use settings::PoolingSettings;
pub use settings::SettingsError;
