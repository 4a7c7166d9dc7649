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

//! Pools keyed by template.
//!
//! A [`Registry`] owns one [`Pool`] per distinct template and creates it the first time the
//! template is asked for. It is an ordinary value: create one per session, share it by reference
//! (or in an [`Arc`] to drive it from a [maintenance task](crate::maintenance)), and call
//! [`Registry::reset`] at session boundaries.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;

use crate::ManageObject;
use crate::Pool;
use crate::Pooled;
use crate::PoolingSettings;
use crate::mutex::Mutex;
use crate::settings::SharedSettings;
use crate::settings::shared;

/// A set of pools, one per template, sharing one [`PoolingSettings`].
pub struct Registry<M>
where
    M: ManageObject + Clone + Eq + Hash,
{
    settings: SharedSettings,
    pools: Mutex<HashMap<M, Arc<Pool<M>>>>,
}

impl<M> std::fmt::Debug for Registry<M>
where
    M: ManageObject + Clone + Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("settings", &self.settings)
            .field("pools", &self.len())
            .finish()
    }
}

impl<M> Default for Registry<M>
where
    M: ManageObject + Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new(PoolingSettings::default())
    }
}

impl<M> Registry<M>
where
    M: ManageObject + Clone + Eq + Hash,
{
    /// Creates a new, empty [`Registry`].
    pub fn new(settings: PoolingSettings) -> Self {
        Self {
            settings: shared(settings),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a snapshot of the current settings.
    pub fn settings(&self) -> PoolingSettings {
        self.settings.with(|s| s.clone())
    }

    /// Updates the settings of every pool of this registry, present and future.
    pub fn update_settings(&self, f: impl FnOnce(&mut PoolingSettings)) {
        self.settings.with(f);
    }

    /// Returns the pool of `template`, or creates and [initializes](Pool::initialize) it.
    ///
    /// If a pool already exists, its target count is set to `init_count`, or to the default pool
    /// size if `init_count` is `None`.
    pub fn create_pool(
        &self,
        template: &M,
        init_count: Option<usize>,
        instant: bool,
    ) -> Result<Arc<Pool<M>>, M::Error> {
        let pool = {
            let mut pools = self.pools.lock();
            if let Some(pool) = pools.get(template) {
                let target_count = init_count
                    .unwrap_or_else(|| self.settings.with(|s| s.default_pool_size));
                pool.set_target_count(target_count);
                return Ok(pool.clone());
            }

            let pool = Pool::with_settings(template.clone(), self.settings.clone());
            pools.insert(template.clone(), pool.clone());
            pool
        };

        tracing::debug!(pool = pool.id(), "created pool");
        if let Err(err) = pool.initialize(init_count, instant) {
            let mut pools = self.pools.lock();
            if pools.get(template).is_some_and(|p| Arc::ptr_eq(p, &pool)) {
                pools.remove(template);
            }
            return Err(err);
        }
        Ok(pool)
    }

    /// Retrieves a resource of `template`, creating its pool first if needed.
    ///
    /// `target_count` becomes the target count of the pool: the initial one if the pool is
    /// created, or the updated one if it already exists.
    pub fn acquire_for(
        &self,
        template: &M,
        target_count: Option<usize>,
    ) -> Result<Pooled<M>, M::Error> {
        let pool = match self.pool(template) {
            Some(pool) => {
                if let Some(target_count) = target_count {
                    pool.set_target_count(target_count);
                }
                pool
            }
            None => self.create_pool(template, target_count, false)?,
        };
        pool.get()
    }

    /// Returns a resource to its pool.
    ///
    /// The template is notified through [`ManageObject::on_released`] first. If the pool of the
    /// resource is no longer part of this registry, e.g. after a [`Registry::reset`], the
    /// resource is destroyed instead.
    pub fn release(&self, mut o: Pooled<M>) {
        o.notify_released();
        let owner = o.pool().filter(|pool| {
            let pools = self.pools.lock();
            pools.values().any(|p| Arc::ptr_eq(p, pool))
        });

        match owner {
            Some(pool) => pool.release(o),
            None => {
                tracing::debug!("destroying a resource without a registered pool");
                o.destroy();
            }
        }
    }

    /// Sets the target count of the pool of `template`, creating the pool if needed.
    pub fn set_target_count(
        &self,
        template: &M,
        target_count: usize,
    ) -> Result<Arc<Pool<M>>, M::Error> {
        self.create_pool(template, Some(target_count), false)
    }

    /// Returns the pool of `template`, if any.
    pub fn pool(&self, template: &M) -> Option<Arc<Pool<M>>> {
        self.pools.lock().get(template).cloned()
    }

    /// Whether a pool exists for `template`.
    pub fn has_pool(&self, template: &M) -> bool {
        self.pools.lock().contains_key(template)
    }

    /// Returns the number of pools.
    pub fn len(&self) -> usize {
        self.pools.lock().len()
    }

    /// Whether the registry holds no pool.
    pub fn is_empty(&self) -> bool {
        self.pools.lock().is_empty()
    }

    /// Drops every pool at once.
    ///
    /// Idle resources are dropped with their pool. Resources still handed out are destroyed when
    /// they are returned.
    pub fn reset(&self) {
        let pools = std::mem::take(&mut *self.pools.lock());
        tracing::debug!(pools = pools.len(), "resetting pool registry");
        drop(pools);
    }

    /// [Ticks](Pool::tick) every pool.
    pub fn tick(&self, now: Instant) {
        let pools: Vec<_> = self.pools.lock().values().cloned().collect();
        for pool in pools {
            pool.tick(now);
        }
    }
}
