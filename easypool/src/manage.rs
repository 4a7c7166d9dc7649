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

/// A part of a pooled resource that takes part in its pooling lifecycle.
pub trait Poolable {
    /// Resets the part to a ready state when its resource is handed out by the pool.
    fn initialize(&mut self);

    /// Releases transient state when its resource is returned to the pool.
    ///
    /// Parts without transient state can use the default implementation which does nothing.
    fn recycle(&mut self) {}
}

/// A resource that exposes its [`Poolable`] parts.
///
/// The parts are enumerated once when the resource enters a pool. A resource must visit the
/// same parts in the same order for its whole lifetime.
pub trait Compose {
    /// Calls `visit` on every poolable part of this resource.
    ///
    /// The default implementation visits nothing, for resources without poolable parts.
    fn for_each_part(&mut self, visit: &mut dyn FnMut(&mut dyn Poolable)) {
        let _ = visit;
    }
}

impl<T> Compose for Vec<T> {}

impl Compose for String {}

impl<T: Compose + ?Sized> Compose for Box<T> {
    fn for_each_part(&mut self, visit: &mut dyn FnMut(&mut dyn Poolable)) {
        (**self).for_each_part(visit);
    }
}

/// A template: the identity of a kind of resource and the factory producing it.
///
/// A [`Registry`](crate::Registry) additionally requires templates to be `Clone + Eq + Hash`
/// so that it can key its pools by them.
pub trait ManageObject: Send + Sync + 'static {
    /// The type of resources that this template creates.
    type Object: Compose + Send + 'static;

    /// The type of errors that this template can return from [`ManageObject::create`].
    type Error: std::fmt::Debug + Send;

    /// Creates a new resource.
    fn create(&self) -> Result<Self::Object, Self::Error>;

    /// A callback invoked when a resource is handed back through
    /// [`Registry::release`](crate::Registry::release), before it is recycled or destroyed.
    fn on_released(&self, _o: &mut Self::Object) {}

    /// A callback invoked when the pool destroys a resource it owns, e.g. while thinning.
    ///
    /// Resources still held by a pool that is dropped as a whole are dropped without this
    /// callback.
    fn on_destroyed(&self, _o: &mut Self::Object) {}

    /// A callback invoked when a resource is detached from the pool.
    ///
    /// If this template does not hold any references to the resource, then the default
    /// implementation can be used which does nothing.
    fn on_detached(&self, _o: &mut Self::Object) {}
}
