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

use std::time::Duration;

use thiserror::Error;

/// The errors returned by pool operations.
///
/// `E` is the error type of the [`ManageResource`](crate::ManageResource)
/// implementation backing the pool.
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The pool configuration is invalid.
    #[error("invalid pool configuration: {0}")]
    Config(&'static str),

    /// The manager failed to create a resource, during pre-fill or on demand.
    #[error("failed to create resource: {0}")]
    Factory(E),

    /// The pool has been shut down.
    #[error("the pool is closed")]
    Closed,

    /// No resource was released within the configured wait timeout.
    #[error("timed out after {0:?} waiting for a free resource")]
    WaitTimeout(Duration),

    /// [`Pool::ping`](crate::Pool::ping) was invoked but the manager has no
    /// health check.
    #[error("no health check is configured for this pool")]
    NoHealthCheck,

    /// The manager failed to close a resource.
    #[error("failed to close resource: {0}")]
    Close(E),

    /// A resource failed its health check.
    #[error("resource failed its health check: {0}")]
    Check(E),

    /// One or more close calls failed while draining the idle set on
    /// shutdown. Every idle resource is still passed to the manager; the
    /// failures are collected here instead of aborting the drain.
    #[error("failed to close {} resource(s) while draining the pool", .0.len())]
    Drain(Vec<E>),
}

impl<E> PoolError<E> {
    /// Whether this error reports an operation on a closed pool.
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed)
    }

    /// Whether this error reports an expired wait for a free resource.
    pub fn is_wait_timeout(&self) -> bool {
        matches!(self, PoolError::WaitTimeout(_))
    }
}
