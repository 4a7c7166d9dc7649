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

//! A pool of entries for one template.
//!
//! A [`Pool`] never blocks and never runs out: [`Pool::get`] creates a resource synchronously
//! whenever no idle entry is left. Growth to the target size happens ahead of demand, either at
//! once or paced across [`Pool::tick`] calls, and surplus idle entries are thinned out in small
//! batches once demand drops.
//!
//! Typically, a pool is used wrapped in an [`Arc`] in order to call [`Pool::get`]. Handles keep
//! a [`Weak`] reference to their pool, so a handle outliving its pool simply drops its resource.

use std::collections::VecDeque;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crate::Entry;
use crate::EntryStatus;
use crate::ManageObject;
use crate::PoolingSettings;
use crate::mutex::Mutex;
use crate::settings::SharedSettings;
use crate::settings::shared;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// The current pool status.
///
/// See [`Pool::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolStatus {
    /// The desired steady-state size of the pool.
    pub target_count: usize,

    /// The number of entries created and not destroyed, idle or in use.
    pub current_size: usize,

    /// The number of idle entries in the pool.
    pub idle_count: usize,

    /// The number of entries currently handed out.
    pub in_use: usize,

    /// The smoothed in-use estimate of the last thinning check.
    pub average_in_use: usize,
}

/// The result returned by [`Pool::retain`].
#[derive(Debug)]
#[non_exhaustive]
pub struct RetainResult<T> {
    /// The number of retained idle entries.
    pub retained: usize,
    /// The resources removed from the pool.
    pub removed: Vec<T>,
}

/// An object pool for a single template.
///
/// See the [module level documentation](self) for more.
pub struct Pool<M: ManageObject> {
    id: u64,
    settings: SharedSettings,
    slots: Mutex<PoolState<M>>,
}

struct PoolState<M: ManageObject> {
    template: Arc<M>,
    /// Idle entries, oldest recycled first.
    deque: VecDeque<Entry<M::Object>>,
    current_size: usize,
    target_count: usize,
    average_in_use: usize,
    /// Bumped by every (re)initialization. Entries built or handed out under an older epoch are
    /// destroyed instead of queued.
    epoch: u64,
    /// Whether a paced fill is pending for the current epoch.
    filling: bool,
    next_thinning: Option<Instant>,
}

impl<M: ManageObject> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("settings", &self.settings)
            .finish()
    }
}

impl<M: ManageObject> Pool<M> {
    /// Creates a new, empty [`Pool`] bound to `template`.
    ///
    /// The pool holds no entry until [`Pool::initialize`] is called or a resource is requested.
    pub fn new(template: M, settings: PoolingSettings) -> Arc<Self> {
        Self::with_settings(template, shared(settings))
    }

    pub(crate) fn with_settings(template: M, settings: SharedSettings) -> Arc<Self> {
        let target_count = settings.with(|s| s.default_pool_size);
        let slots = Mutex::new(PoolState {
            template: Arc::new(template),
            deque: VecDeque::with_capacity(target_count),
            current_size: 0,
            target_count,
            average_in_use: 0,
            epoch: 0,
            filling: false,
            next_thinning: None,
        });

        Arc::new(Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            settings,
            slots,
        })
    }

    /// Returns a process-unique identifier of this pool, used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the template this pool is bound to.
    pub fn template(&self) -> Arc<M> {
        self.slots.lock().template.clone()
    }

    /// Returns a snapshot of the settings this pool reads.
    pub fn settings(&self) -> PoolingSettings {
        self.settings.with(|s| s.clone())
    }

    /// (Re)initializes the pool:
    ///
    /// 1. Sets the target count to `init_count`, or to the configured default pool size.
    /// 2. Destroys every idle entry. Entries handed out before this call are destroyed when they
    ///    are returned.
    /// 3. Creates one entry immediately.
    /// 4. Fills the rest up to the target count, either right away if `instant` is `true`, or one
    ///    entry per [`Pool::tick`] otherwise.
    ///
    /// A paced fill started by a previous call is abandoned, so overlapping calls never overshoot
    /// the target count.
    pub fn initialize(&self, init_count: Option<usize>, instant: bool) -> Result<(), M::Error> {
        let default_pool_size = self.settings.with(|s| s.default_pool_size);

        let mut slots = self.slots.lock();
        slots.target_count = init_count.unwrap_or(default_pool_size);
        slots.epoch += 1;
        slots.filling = false;
        let epoch = slots.epoch;
        let target_count = slots.target_count;
        let template = slots.template.clone();
        let cleared = take_idle(&mut *slots);
        drop(slots);

        let cleared = destroy(&template, cleared);
        tracing::debug!(
            pool = self.id,
            epoch,
            target_count,
            cleared,
            instant,
            "initializing pool"
        );

        self.grow(epoch, false)?;
        if instant {
            while self.grow(epoch, true)? {}
        } else {
            let mut slots = self.slots.lock();
            if slots.epoch == epoch {
                slots.filling = slots.current_size < slots.target_count;
            }
        }
        Ok(())
    }

    /// Binds the pool to another template, then [initializes](Pool::initialize) it.
    pub fn rebind(
        &self,
        template: M,
        init_count: Option<usize>,
        instant: bool,
    ) -> Result<(), M::Error> {
        let (previous, cleared) = {
            let mut slots = self.slots.lock();
            let cleared = take_idle(&mut *slots);
            let previous = std::mem::replace(&mut slots.template, Arc::new(template));
            (previous, cleared)
        };
        // Idle entries were built by the previous template; destroy them with it.
        destroy(&previous, cleared);
        self.initialize(init_count, instant)
    }

    /// Retrieves a resource from this [`Pool`].
    ///
    /// The oldest idle entry is handed out first. If no entry is idle, exactly one resource is
    /// created synchronously. Errors of [`ManageObject::create`] are returned as is.
    ///
    /// This method should be called with a pool wrapped in an [`Arc`].
    pub fn get(self: &Arc<Self>) -> Result<Pooled<M>, M::Error> {
        let (existing, template, epoch) = {
            let mut slots = self.slots.lock();
            (
                slots.deque.pop_front(),
                slots.template.clone(),
                slots.epoch,
            )
        };

        let mut entry = match existing {
            Some(entry) => entry,
            None => {
                let mut entry = Entry::new(template.create()?);
                entry.recycle();
                self.slots.lock().current_size += 1;
                tracing::trace!(pool = self.id, "created a resource on demand");
                entry
            }
        };

        // A panicking part loses the entry; keep the size accounting right while unwinding.
        let guard = scopeguard::guard((), |()| {
            self.slots.lock().current_size -= 1;
        });
        entry.initialize();
        scopeguard::ScopeGuard::into_inner(guard);

        Ok(Pooled {
            entry: Some(entry),
            epoch,
            template,
            pool: Arc::downgrade(self),
        })
    }

    /// Returns a resource to its pool.
    ///
    /// This is equivalent to dropping the handle. A handle of another pool is returned to the pool
    /// it belongs to.
    pub fn release(&self, o: Pooled<M>) {
        if !o.belongs_to(self) {
            tracing::debug!(pool = self.id, "released a handle of another pool");
        }
        drop(o);
    }

    /// Updates the target count.
    ///
    /// The pool does not grow or shrink right away: a larger target is filled by subsequent
    /// [`Pool::tick`] calls and a smaller one is reached by thinning.
    pub fn set_target_count(&self, target_count: usize) {
        let mut slots = self.slots.lock();
        slots.target_count = target_count;
        if slots.current_size < target_count {
            slots.filling = true;
        }
    }

    /// Returns the target count.
    pub fn target_count(&self) -> usize {
        self.slots.lock().target_count
    }

    /// Performs one step of a pending paced fill.
    ///
    /// Returns `Ok(true)` if an entry was created, and `Ok(false)` if no fill is pending or the
    /// pool has reached its target count.
    pub fn fill_step(&self) -> Result<bool, M::Error> {
        let epoch = {
            let mut slots = self.slots.lock();
            if !slots.filling {
                return Ok(false);
            }
            if slots.current_size >= slots.target_count {
                slots.filling = false;
                tracing::debug!(
                    pool = self.id,
                    current_size = slots.current_size,
                    "pool filled"
                );
                return Ok(false);
            }
            slots.epoch
        };

        self.grow(epoch, true)
    }

    /// Runs one thinning check and returns the number of destroyed entries.
    ///
    /// The check updates the in-use estimate as `(average + in_use) / 2`, then destroys up to
    /// `min(max_thin_per_tick, (current_size - average) / 2)` of the oldest idle entries, but only
    /// if the idle entries exceed both the target count and twice the in-use estimate. A single
    /// check never takes the idle entries below the target count.
    pub fn thin(&self) -> usize {
        let max_thin_per_tick = self.settings.with(|s| s.max_thin_per_tick);

        let mut slots = self.slots.lock();
        let idle = slots.deque.len();
        let in_use = slots.current_size.saturating_sub(idle);
        slots.average_in_use = (slots.average_in_use + in_use) / 2;
        let average_in_use = slots.average_in_use;

        if idle <= slots.target_count || idle <= 2 * average_in_use {
            return 0;
        }

        let n = (slots.current_size.saturating_sub(average_in_use) / 2)
            .min(max_thin_per_tick)
            .min(idle - slots.target_count);
        let thinned: Vec<_> = slots.deque.drain(..n).collect();
        slots.current_size -= thinned.len();
        let template = slots.template.clone();
        drop(slots);

        if n > 0 {
            tracing::debug!(pool = self.id, thinned = n, average_in_use, "thinned pool");
        }
        destroy(&template, thinned);
        n
    }

    /// Drives the pool: performs one paced fill step, and a thinning check if one is due.
    ///
    /// The first thinning check of a pool is staggered by less than a second after its first
    /// tick; later checks follow every [`PoolingSettings::thinning_check_interval`].
    pub fn tick(&self, now: Instant) {
        if let Err(err) = self.fill_step() {
            tracing::warn!(pool = self.id, ?err, "failed to create a resource while filling");
        }

        let interval = self.settings.with(|s| s.thinning_check_interval());
        let due = {
            let mut slots = self.slots.lock();
            match slots.next_thinning {
                None => {
                    slots.next_thinning = Some(now + self.stagger());
                    false
                }
                Some(at) if now >= at => {
                    slots.next_thinning = Some(now + interval);
                    true
                }
                Some(_) => false,
            }
        };

        if due {
            self.thin();
        }
    }

    /// Retains only the idle entries whose resource passes the given predicate.
    ///
    /// This function blocks the entire pool. Therefore, the given function should not block.
    /// Removed resources are detached from the pool and handed to the caller.
    pub fn retain(
        &self,
        mut f: impl FnMut(&mut M::Object, EntryStatus) -> bool,
    ) -> RetainResult<M::Object> {
        let mut slots = self.slots.lock();
        let mut retained = VecDeque::with_capacity(slots.deque.len());
        let mut removed = Vec::new();
        for mut entry in slots.deque.drain(..) {
            let status = entry.status();
            if f(entry.get_mut(), status) {
                retained.push_back(entry);
            } else {
                removed.push(entry.into_inner());
            }
        }
        let retained_count = retained.len();
        slots.deque = retained;
        slots.current_size -= removed.len();
        let template = slots.template.clone();
        drop(slots);

        for o in removed.iter_mut() {
            template.on_detached(o);
        }
        RetainResult {
            retained: retained_count,
            removed,
        }
    }

    /// Destroys every idle entry and returns how many were destroyed.
    pub fn clear(&self) -> usize {
        let (template, cleared) = {
            let mut slots = self.slots.lock();
            (slots.template.clone(), take_idle(&mut *slots))
        };
        destroy(&template, cleared)
    }

    /// Returns the current status of the pool.
    pub fn status(&self) -> PoolStatus {
        let slots = self.slots.lock();
        let idle_count = slots.deque.len();
        PoolStatus {
            target_count: slots.target_count,
            current_size: slots.current_size,
            idle_count,
            in_use: slots.current_size - idle_count,
            average_in_use: slots.average_in_use,
        }
    }

    /// Creates one idle entry for `epoch`. With `until_target`, nothing is created once the pool
    /// has reached its target count.
    fn grow(&self, epoch: u64, until_target: bool) -> Result<bool, M::Error> {
        let template = {
            let slots = self.slots.lock();
            if slots.epoch != epoch
                || (until_target && slots.current_size >= slots.target_count)
            {
                return Ok(false);
            }
            slots.template.clone()
        };

        let mut entry = Entry::new(template.create()?);
        entry.recycle();

        let mut slots = self.slots.lock();
        if slots.epoch != epoch {
            drop(slots);
            destroy(&template, Some(entry));
            return Ok(false);
        }
        slots.current_size += 1;
        slots.deque.push_back(entry);
        tracing::trace!(pool = self.id, current_size = slots.current_size, "created a resource");
        Ok(true)
    }

    /// Spreads the first thinning checks of pools over one second, deterministically by pool id,
    /// so pools created together do not thin on the same tick.
    fn stagger(&self) -> Duration {
        Duration::from_millis(self.id.wrapping_mul(619) % 1000)
    }

    fn push_back(&self, mut entry: Entry<M::Object>, epoch: u64, template: &Arc<M>) {
        entry.recycle();

        let mut slots = self.slots.lock();
        if slots.epoch != epoch {
            shrink(&mut *slots);
            drop(slots);
            tracing::trace!(pool = self.id, "destroyed a resource of a previous epoch");
            destroy(template, Some(entry));
            return;
        }

        slots.deque.push_back(entry);
        assert!(
            slots.deque.len() <= slots.current_size,
            "invariant broken: idle_count <= current_size (actual: {} <= {})",
            slots.deque.len(),
            slots.current_size,
        );
    }

    fn destroy_object(&self, entry: Entry<M::Object>, template: &Arc<M>) {
        shrink(&mut *self.slots.lock());
        destroy(template, Some(entry));
    }

    fn detach_object(&self, o: &mut M::Object, template: &Arc<M>) {
        shrink(&mut *self.slots.lock());
        template.on_detached(o);
    }
}

/// Forgets one handed out entry and resumes the fill if the pool fell below its target.
fn shrink<M: ManageObject>(slots: &mut PoolState<M>) {
    slots.current_size -= 1;
    if slots.current_size < slots.target_count {
        slots.filling = true;
    }
}

fn take_idle<M: ManageObject>(slots: &mut PoolState<M>) -> Vec<Entry<M::Object>> {
    let idle: Vec<_> = slots.deque.drain(..).collect();
    slots.current_size -= idle.len();
    idle
}

fn destroy<M: ManageObject>(
    template: &Arc<M>,
    entries: impl IntoIterator<Item = Entry<M::Object>>,
) -> usize {
    let mut n = 0;
    for entry in entries {
        let mut o = entry.into_inner();
        template.on_destroyed(&mut o);
        n += 1;
    }
    n
}

/// A handle to a live pooled resource.
///
/// This handle implements [`Deref`] and [`DerefMut`]. You can use it as if it was of type
/// `M::Object`.
///
/// This handle implements [`Drop`] that recycles the resource and returns it to the pool. You may
/// call [`Pooled::detach`] to detach the resource from the pool before dropping it.
pub struct Pooled<M: ManageObject> {
    entry: Option<Entry<M::Object>>,
    epoch: u64,
    /// The template that created the resource, which may differ from the pool's after a rebind.
    template: Arc<M>,
    pool: Weak<Pool<M>>,
}

impl<M> std::fmt::Debug for Pooled<M>
where
    M: ManageObject,
    M::Object: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled")
            .field("entry", &self.entry)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<M: ManageObject> Drop for Pooled<M> {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.push_back(entry, self.epoch, &self.template);
            }
        }
    }
}

impl<M: ManageObject> Deref for Pooled<M> {
    type Target = M::Object;
    fn deref(&self) -> &M::Object {
        // SAFETY: `entry` is always `Some` when `Pooled` is owned.
        self.entry.as_ref().unwrap().get()
    }
}

impl<M: ManageObject> DerefMut for Pooled<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: `entry` is always `Some` when `Pooled` is owned.
        self.entry.as_mut().unwrap().get_mut()
    }
}

impl<M: ManageObject> AsRef<M::Object> for Pooled<M> {
    fn as_ref(&self) -> &M::Object {
        self
    }
}

impl<M: ManageObject> AsMut<M::Object> for Pooled<M> {
    fn as_mut(&mut self) -> &mut M::Object {
        self
    }
}

impl<M: ManageObject> Pooled<M> {
    /// Recycles the resource and returns it to its pool.
    pub fn release(self) {
        drop(self);
    }

    /// Detaches the resource from the [`Pool`].
    ///
    /// This reduces the size of the pool by one.
    pub fn detach(mut self) -> M::Object {
        // SAFETY: `entry` is always `Some` when `Pooled` is owned.
        let mut o = self.entry.take().unwrap().into_inner();
        if let Some(pool) = self.pool.upgrade() {
            pool.detach_object(&mut o, &self.template);
        }
        o
    }

    /// Returns the status of the resource.
    pub fn status(&self) -> EntryStatus {
        // SAFETY: `entry` is always `Some` when `Pooled` is owned.
        self.entry.as_ref().unwrap().status()
    }

    /// Returns the pool this handle belongs to, if it still exists.
    pub fn pool(&self) -> Option<Arc<Pool<M>>> {
        self.pool.upgrade()
    }

    /// Whether this handle was handed out by `pool`.
    pub fn belongs_to(&self, pool: &Pool<M>) -> bool {
        std::ptr::eq(self.pool.as_ptr(), pool)
    }

    /// Notifies the template that the resource is about to be released through a registry.
    pub(crate) fn notify_released(&mut self) {
        if let Some(entry) = self.entry.as_mut() {
            self.template.on_released(entry.get_mut());
        }
    }

    /// Destroys the resource instead of returning it to its pool.
    pub(crate) fn destroy(mut self) {
        if let Some(entry) = self.entry.take() {
            match self.pool.upgrade() {
                Some(pool) => pool.destroy_object(entry, &self.template),
                None => drop(entry),
            }
        }
    }
}
