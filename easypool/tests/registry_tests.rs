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

use std::convert::Infallible;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

use easypool::ManageObject;
use easypool::Pool;
use easypool::PoolingSettings;
use easypool::Registry;

/// A template identified by its name.
#[derive(Clone)]
struct Prefab {
    name: &'static str,
    destroyed: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl Prefab {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            destroyed: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl PartialEq for Prefab {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Prefab {}

impl Hash for Prefab {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl ManageObject for Prefab {
    type Object = String;
    type Error = Infallible;

    fn create(&self) -> Result<Self::Object, Self::Error> {
        Ok(self.name.to_string())
    }

    fn on_released(&self, o: &mut Self::Object) {
        assert_eq!(o.as_str(), self.name);
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn on_destroyed(&self, _o: &mut Self::Object) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_acquire_for_creates_pool_lazily() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");
    assert!(registry.is_empty());
    assert!(!registry.has_pool(&bullet));

    let o = registry.acquire_for(&bullet, None).unwrap();
    assert_eq!(*o, "bullet");
    assert!(registry.has_pool(&bullet));
    assert_eq!(registry.len(), 1);

    let status = registry.pool(&bullet).unwrap().status();
    assert_eq!(status.target_count, 10);
    assert_eq!(status.current_size, 1);
    assert_eq!(status.in_use, 1);
}

#[test]
fn test_create_pool_is_idempotent() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");

    let first = registry.create_pool(&bullet, Some(3), true).unwrap();
    assert_eq!(first.status().current_size, 3);

    let second = registry.create_pool(&bullet, Some(7), true).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    assert_eq!(second.target_count(), 7);
    assert_eq!(second.status().current_size, 3);

    registry.create_pool(&bullet, None, false).unwrap();
    assert_eq!(first.target_count(), 10);
}

#[test]
fn test_acquire_for_updates_target_of_existing_pool() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");

    let o = registry.acquire_for(&bullet, Some(2)).unwrap();
    let pool = registry.pool(&bullet).unwrap();
    assert_eq!(pool.target_count(), 2);

    let p = registry.acquire_for(&bullet, None).unwrap();
    assert_eq!(pool.target_count(), 2);

    let q = registry.acquire_for(&bullet, Some(6)).unwrap();
    assert_eq!(pool.target_count(), 6);
    drop((o, p, q));
}

#[test]
fn test_set_target_count_creates_pool() {
    let registry = Registry::default();
    let shell = Prefab::new("shell");

    let pool = registry.set_target_count(&shell, 5).unwrap();
    assert!(registry.has_pool(&shell));
    assert_eq!(pool.target_count(), 5);
    assert_eq!(pool.status().current_size, 1);
}

#[test]
fn test_release_returns_to_pool() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");

    let o = registry.acquire_for(&bullet, None).unwrap();
    let pool = registry.pool(&bullet).unwrap();
    assert_eq!(pool.status().idle_count, 0);

    registry.release(o);
    assert_eq!(bullet.released(), 1);
    assert_eq!(pool.status().idle_count, 1);
    assert_eq!(pool.status().current_size, 1);
    assert_eq!(bullet.destroyed(), 0);

    // dropping a handle is not a release through the registry
    drop(pool.get().unwrap());
    assert_eq!(bullet.released(), 1);
}

#[test]
fn test_release_after_reset_destroys() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");

    let o = registry.acquire_for(&bullet, None).unwrap();
    let detached_pool = registry.pool(&bullet).unwrap();

    registry.reset();
    assert!(registry.is_empty());
    assert!(!registry.has_pool(&bullet));

    registry.release(o);
    assert_eq!(bullet.released(), 1);
    assert_eq!(bullet.destroyed(), 1);
    assert_eq!(detached_pool.status().current_size, 0);
    assert_eq!(detached_pool.status().idle_count, 0);

    // a new session starts from scratch
    let o = registry.acquire_for(&bullet, None).unwrap();
    let pool = registry.pool(&bullet).unwrap();
    assert!(!Arc::ptr_eq(&pool, &detached_pool));
    drop(o);
}

#[test]
fn test_handle_of_dropped_pool_is_dropped() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");

    let o = registry.acquire_for(&bullet, None).unwrap();
    registry.reset();
    assert!(o.pool().is_none());
    registry.release(o);
    assert_eq!(bullet.destroyed(), 0);
}

#[test]
fn test_release_of_unregistered_pool_handle_destroys() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");
    registry.create_pool(&bullet, Some(1), true).unwrap();

    let standalone = Pool::new(bullet.clone(), PoolingSettings::default());
    let o = standalone.get().unwrap();
    assert_eq!(standalone.status().current_size, 1);

    registry.release(o);
    assert_eq!(standalone.status().current_size, 0);
    assert_eq!(bullet.destroyed(), 1);
    assert_eq!(registry.pool(&bullet).unwrap().status().idle_count, 1);
}

#[test]
fn test_tick_fills_every_pool() {
    let registry = Registry::default();
    let bullet = Prefab::new("bullet");
    let shell = Prefab::new("shell");
    registry.create_pool(&bullet, Some(4), false).unwrap();
    registry.create_pool(&shell, Some(3), false).unwrap();

    let now = Instant::now();
    for _ in 0..5 {
        registry.tick(now);
    }

    assert_eq!(registry.pool(&bullet).unwrap().status().current_size, 4);
    assert_eq!(registry.pool(&shell).unwrap().status().current_size, 3);
}

#[test]
fn test_settings_are_live() {
    let registry = Registry::new(PoolingSettings::default().with_default_pool_size(4));
    let bullet = Prefab::new("bullet");
    let pool = registry.create_pool(&bullet, None, true).unwrap();
    assert_eq!(pool.status().current_size, 4);

    registry.update_settings(|s| {
        s.default_pool_size = 6;
        s.max_thin_per_tick = 1;
    });
    assert_eq!(registry.settings().max_thin_per_tick, 1);
    assert_eq!(pool.settings().default_pool_size, 6);

    let shell = Prefab::new("shell");
    let other = registry.create_pool(&shell, None, true).unwrap();
    assert_eq!(other.status().current_size, 6);

    pool.set_target_count(0);
    assert_eq!(pool.thin(), 1);
    assert_eq!(pool.status().current_size, 3);
}

#[test]
fn test_failed_creation_does_not_register_pool() {
    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Missing;

    impl ManageObject for Missing {
        type Object = Vec<u8>;
        type Error = String;

        fn create(&self) -> Result<Self::Object, Self::Error> {
            Err("missing asset".to_string())
        }
    }

    let registry = Registry::default();
    let err = registry.acquire_for(&Missing, None).unwrap_err();
    assert_eq!(err, "missing asset");
    assert!(!registry.has_pool(&Missing));
}
