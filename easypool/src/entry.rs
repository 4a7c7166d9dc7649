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

use std::time::Instant;

use crate::Compose;
use crate::Poolable;

/// Statistics regarding a pooled resource.
#[derive(Debug, Clone, Copy)]
pub struct EntryStatus {
    created: Instant,
    pub(crate) recycled: Option<Instant>,
    pub(crate) use_count: usize,
}

impl Default for EntryStatus {
    fn default() -> Self {
        Self {
            created: Instant::now(),
            recycled: None,
            use_count: 0,
        }
    }
}

impl EntryStatus {
    /// Returns the instant when this resource was created.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// Returns the instant when this resource was last recycled, or its creation instant.
    pub fn last_used(&self) -> Instant {
        self.recycled.unwrap_or(self.created)
    }

    /// Returns the number of times the resource has been initialized.
    pub fn use_count(&self) -> usize {
        self.use_count
    }
}

/// One resource instance together with its live/idle state.
///
/// An entry is live between [`Entry::initialize`] and [`Entry::recycle`], and idle otherwise.
/// Both calls fan out to every [`Poolable`] part of the resource, in the order the resource
/// visits them.
#[derive(Debug)]
pub struct Entry<T> {
    o: T,
    live: bool,
    parts: usize,
    status: EntryStatus,
}

impl<T: Compose> Entry<T> {
    /// Wraps a freshly created resource. The entry starts idle.
    pub fn new(mut o: T) -> Self {
        let mut parts = 0;
        o.for_each_part(&mut |_: &mut dyn Poolable| parts += 1);
        Self {
            o,
            live: false,
            parts,
            status: EntryStatus::default(),
        }
    }

    /// Initializes every part and marks the entry live.
    ///
    /// Returns `false` without touching any part if the entry is already live.
    pub fn initialize(&mut self) -> bool {
        if self.live {
            return false;
        }

        self.fan_out(|part| part.initialize());
        self.live = true;
        self.status.use_count += 1;
        true
    }

    /// Recycles every part and marks the entry idle.
    ///
    /// Recycling is unconditional: it also runs on an idle or never initialized entry.
    pub fn recycle(&mut self) {
        self.fan_out(|part| part.recycle());
        self.live = false;
        self.status.recycled = Some(Instant::now());
    }

    fn fan_out(&mut self, mut f: impl FnMut(&mut dyn Poolable)) {
        let mut visited = 0;
        self.o.for_each_part(&mut |part: &mut dyn Poolable| {
            visited += 1;
            f(part);
        });

        if visited != self.parts {
            tracing::warn!(
                expected = self.parts,
                actual = visited,
                "poolable parts changed after the resource entered the pool"
            );
        }
    }
}

impl<T> Entry<T> {
    /// Whether the entry is between initialize and recycle.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// The number of poolable parts found when the entry was created.
    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Returns the status of the entry.
    pub fn status(&self) -> EntryStatus {
        self.status
    }

    /// Returns a reference to the resource.
    pub fn get(&self) -> &T {
        &self.o
    }

    /// Returns a mutable reference to the resource.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.o
    }

    /// Unwraps the resource.
    pub fn into_inner(self) -> T {
        self.o
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        initialized: usize,
        recycled: usize,
    }

    impl Poolable for Counter {
        fn initialize(&mut self) {
            self.initialized += 1;
        }

        fn recycle(&mut self) {
            self.recycled += 1;
        }
    }

    struct Quiet;

    impl Poolable for Quiet {
        fn initialize(&mut self) {}
    }

    #[derive(Default)]
    struct Body {
        hull: Counter,
        engine: Counter,
    }

    impl Compose for Body {
        fn for_each_part(&mut self, visit: &mut dyn FnMut(&mut dyn Poolable)) {
            visit(&mut self.hull);
            visit(&mut self.engine);
        }
    }

    #[test]
    fn test_counts_parts_once() {
        let entry = Entry::new(Body::default());
        assert_eq!(entry.parts(), 2);
        assert!(!entry.is_live());
        assert_eq!(entry.get().hull.initialized, 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut entry = Entry::new(Body::default());
        assert!(entry.initialize());
        assert!(!entry.initialize());
        assert!(entry.is_live());
        assert_eq!(entry.get().hull.initialized, 1);
        assert_eq!(entry.get().engine.initialized, 1);
        assert_eq!(entry.status().use_count(), 1);

        entry.recycle();
        assert!(entry.initialize());
        assert_eq!(entry.get().hull.initialized, 2);
        assert_eq!(entry.status().use_count(), 2);
    }

    #[test]
    fn test_recycle_is_unconditional() {
        let mut entry = Entry::new(Body::default());
        entry.recycle();
        entry.recycle();
        assert!(!entry.is_live());
        assert_eq!(entry.get().hull.recycled, 2);
        assert_eq!(entry.get().hull.initialized, 0);
        assert!(entry.status().recycled.is_some());
    }

    #[test]
    fn test_default_recycle_does_nothing() {
        struct Single(Quiet);
        impl Compose for Single {
            fn for_each_part(&mut self, visit: &mut dyn FnMut(&mut dyn Poolable)) {
                visit(&mut self.0);
            }
        }

        let mut entry = Entry::new(Single(Quiet));
        assert!(entry.initialize());
        entry.recycle();
        assert!(!entry.is_live());
        assert_eq!(entry.parts(), 1);
    }

    #[test]
    fn test_resource_without_parts() {
        let mut entry = Entry::new(Vec::<u8>::with_capacity(64));
        assert_eq!(entry.parts(), 0);
        assert!(entry.initialize());
        entry.get_mut().push(1);
        entry.recycle();
        assert_eq!(entry.into_inner(), vec![1]);
    }
}
