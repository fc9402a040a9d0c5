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

use std::future::Future;

/// A trait whose instance creates, destroys, and health-checks resources.
///
/// The pool never interprets a resource; every interaction with the underlying
/// connection (or whatever else is pooled) goes through an implementation of
/// this trait.
pub trait ManageResource: Send + Sync {
    /// The type of resources that this instance manages.
    type Resource: Send;

    /// The type of errors that this instance can return.
    type Error: Send;

    /// Creates a new resource.
    fn create(&self) -> impl Future<Output = Result<Self::Resource, Self::Error>> + Send;

    /// Destroys a resource.
    ///
    /// Called when a resource is evicted, explicitly discarded, or drained on
    /// shutdown. The pool forgets the resource regardless of the outcome.
    fn destroy(&self, resource: Self::Resource)
        -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Whether this instance can health-check resources.
    ///
    /// Implementations that override [`ManageResource::check`] should return
    /// `true` here; otherwise the pool treats every idle resource as healthy
    /// and [`Pool::ping`](crate::Pool::ping) is rejected.
    fn has_check(&self) -> bool {
        false
    }

    /// Whether the resource `r` is healthy.
    ///
    /// Returns `Ok(())` if the resource is healthy; otherwise, returns an
    /// error. The default implementation accepts everything.
    fn check(
        &self,
        r: &mut Self::Resource,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let _ = r;
        std::future::ready(Ok(()))
    }
}
