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

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::oneshot;
use tracing::debug;
use tracing::trace;

use crate::mutex::Mutex;
use crate::ManageResource;
use crate::PoolError;

/// The configuration of [`Pool`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolConfig {
    /// The number of resources created up front. Also the least number of
    /// resources in a freshly built pool.
    pub initial_cap: usize,

    /// Maximum number of idle resources kept around for reuse. A released
    /// resource that does not fit is destroyed instead.
    pub max_idle: usize,

    /// Maximum number of live resources, idle and checked out combined.
    /// [`Pool::acquire`] calls beyond this bound queue up for a release.
    pub max_cap: usize,

    /// Maximum time a resource may sit idle before it is destroyed on the
    /// next acquire. `None` disables eviction by age.
    pub idle_timeout: Option<Duration>,

    /// Maximum time an [`Pool::acquire`] call waits for a released resource
    /// once capacity is exhausted.
    pub wait_timeout: Duration,
}

impl PoolConfig {
    /// The wait timeout applied when none is configured.
    pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3);

    /// Creates a new [`PoolConfig`].
    pub fn new(initial_cap: usize, max_idle: usize, max_cap: usize) -> Self {
        Self {
            initial_cap,
            max_idle,
            max_cap,
            idle_timeout: None,
            wait_timeout: Self::DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Returns a new [`PoolConfig`] with the specified idle timeout. A zero
    /// duration disables eviction by age.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = (!idle_timeout.is_zero()).then_some(idle_timeout);
        self
    }

    /// Returns a new [`PoolConfig`] with the specified wait timeout. A zero
    /// duration falls back to [`PoolConfig::DEFAULT_WAIT_TIMEOUT`].
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = if wait_timeout.is_zero() {
            Self::DEFAULT_WAIT_TIMEOUT
        } else {
            wait_timeout
        };
        self
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.initial_cap > self.max_idle {
            return Err("initial_cap must not exceed max_idle");
        }
        if self.max_idle > self.max_cap {
            return Err("max_idle must not exceed max_cap");
        }
        Ok(())
    }
}

/// The current pool status.
///
/// See [`Pool::status`].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolStatus {
    /// The maximum number of live resources.
    pub max_cap: usize,

    /// The number of resources currently created and not yet destroyed.
    pub open_count: usize,

    /// The number of idle resources in the pool.
    pub idle_count: usize,

    /// The number of acquire calls waiting for a released resource.
    pub wait_count: usize,
}

/// An idle resource paired with the instant it last entered the pool.
#[derive(Debug)]
struct ResourceEntry<R> {
    resource: R,
    returned_at: Instant,
}

impl<R> ResourceEntry<R> {
    fn new(resource: R) -> Self {
        Self {
            resource,
            returned_at: Instant::now(),
        }
    }
}

/// A parked acquire call. The sender is a single-use delivery slot; dropping
/// it resolves the corresponding receiver with a closed signal.
struct Waiter<R> {
    id: u64,
    tx: oneshot::Sender<ResourceEntry<R>>,
}

impl<R> fmt::Debug for Waiter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Waiter").field(&self.id).finish()
    }
}

/// All mutable pool state, guarded by a single lock.
#[derive(Debug)]
struct PoolState<R> {
    /// Resources created and not yet destroyed, idle and checked out alike.
    open_count: usize,
    idle: VecDeque<ResourceEntry<R>>,
    /// Served strictly in arrival order; non-empty only while capacity is
    /// exhausted.
    waiters: VecDeque<Waiter<R>>,
    /// Monotonic, terminal once `true`.
    closed: bool,
    next_waiter_id: u64,
}

/// Generic resource pool with a bounded idle set and FIFO backpressure.
///
/// See the [crate level documentation](crate) for more.
pub struct Pool<M: ManageResource> {
    config: PoolConfig,
    manager: M,

    state: Mutex<PoolState<M::Resource>>,
}

impl<M> fmt::Debug for Pool<M>
where
    M: ManageResource,
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

/// The action decided under the state lock, executed after it is released.
enum Step<R> {
    Validate(ResourceEntry<R>),
    Create,
    Wait(u64, oneshot::Receiver<ResourceEntry<R>>),
}

impl<M: ManageResource> Pool<M> {
    /// Creates a new [`Pool`], pre-filled with `initial_cap` resources.
    ///
    /// Fails with [`PoolError::Config`] if the capacity ordering
    /// `initial_cap <= max_idle <= max_cap` is violated, and with
    /// [`PoolError::Factory`] if any of the up-front creations fails. In the
    /// latter case the resources created so far are destroyed; a partially
    /// initialized pool is never returned.
    pub async fn new(
        config: PoolConfig,
        manager: M,
    ) -> Result<Arc<Self>, PoolError<M::Error>> {
        config.validate().map_err(PoolError::Config)?;

        let state = Mutex::new(PoolState {
            open_count: 0,
            idle: VecDeque::with_capacity(config.max_idle),
            waiters: VecDeque::new(),
            closed: false,
            next_waiter_id: 0,
        });

        let pool = Arc::new(Self {
            config,
            manager,
            state,
        });

        for _ in 0..config.initial_cap {
            match pool.manager.create().await {
                Ok(resource) => {
                    let mut state = pool.state.lock();
                    state.open_count += 1;
                    state.idle.push_back(ResourceEntry::new(resource));
                }
                Err(err) => {
                    if pool.shutdown().await.is_err() {
                        debug!("failed to drain the partially filled pool");
                    }
                    return Err(PoolError::Factory(err));
                }
            }
        }

        Ok(pool)
    }

    /// Retrieves a resource from this [`Pool`].
    ///
    /// Prefers idle resources, lazily evicting those that exceeded the idle
    /// timeout or fail the manager's health check. On an idle miss a new
    /// resource is created while capacity remains; past capacity the call
    /// parks behind earlier callers and waits for a release, up to
    /// `wait_timeout`.
    ///
    /// The returned resource is exclusively owned by the caller until it is
    /// handed back via [`Pool::release`] or [`Pool::destroy`].
    pub async fn acquire(&self) -> Result<M::Resource, PoolError<M::Error>> {
        loop {
            let step = {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                if let Some(entry) = state.idle.pop_front() {
                    Step::Validate(entry)
                } else if state.open_count < self.config.max_cap {
                    // Reserve the slot before creating so that concurrent
                    // acquires can never exceed max_cap.
                    state.open_count += 1;
                    Step::Create
                } else {
                    let (tx, rx) = oneshot::channel();
                    let id = state.next_waiter_id;
                    state.next_waiter_id += 1;
                    state.waiters.push_back(Waiter { id, tx });
                    Step::Wait(id, rx)
                }
            };

            match step {
                Step::Validate(entry) => {
                    if let Some(resource) = self.validate(entry, true).await {
                        return Ok(resource);
                    }
                }
                Step::Create => {
                    let rollback = scopeguard::guard((), |()| {
                        self.state.lock().open_count -= 1;
                    });
                    let resource = self.manager.create().await.map_err(PoolError::Factory)?;
                    scopeguard::ScopeGuard::into_inner(rollback);
                    return Ok(resource);
                }
                Step::Wait(id, mut rx) => {
                    trace!(id, "waiting for a released resource");
                    match tokio::time::timeout(self.config.wait_timeout, &mut rx).await {
                        Ok(Ok(entry)) => {
                            if let Some(resource) = self.validate(entry, false).await {
                                return Ok(resource);
                            }
                        }
                        // The delivery slot was dropped by shutdown.
                        Ok(Err(_)) => return Err(PoolError::Closed),
                        Err(_) => {
                            // Deregister before reporting the timeout; a slot
                            // must never outlive its listener, or a release
                            // could hand a resource to nobody.
                            let deregistered = {
                                let mut state = self.state.lock();
                                match state.waiters.iter().position(|w| w.id == id) {
                                    Some(at) => {
                                        state.waiters.remove(at);
                                        true
                                    }
                                    None => false,
                                }
                            };
                            if deregistered {
                                return Err(PoolError::WaitTimeout(self.config.wait_timeout));
                            }
                            // The slot is gone: a release won the race with
                            // the timeout, or shutdown dropped it.
                            match rx.try_recv() {
                                Ok(entry) => {
                                    if let Some(resource) = self.validate(entry, false).await {
                                        return Ok(resource);
                                    }
                                }
                                Err(_) => return Err(PoolError::Closed),
                            }
                        }
                    }
                }
            }
        }
    }

    /// Returns a resource to the pool.
    ///
    /// The oldest waiting [`Pool::acquire`] call, if any, receives the
    /// resource directly, bypassing the idle set. Otherwise the resource
    /// reenters the idle set, or is destroyed when the idle set is already
    /// holding `max_idle` entries. Releasing into a closed pool destroys the
    /// resource immediately.
    pub async fn release(&self, resource: M::Resource) -> Result<(), PoolError<M::Error>> {
        let mut entry = ResourceEntry::new(resource);

        // The guard must leave scope before the await below; an explicit
        // `drop` does not remove it from the future's captures.
        let entry = {
            let mut state = self.state.lock();
            if state.closed {
                drop(state);
                debug!("resource released into a closed pool; destroying it");
                entry
            } else {
                while let Some(waiter) = state.waiters.pop_front() {
                    match waiter.tx.send(entry) {
                        Ok(()) => {
                            trace!(id = waiter.id, "handed resource to the oldest waiter");
                            return Ok(());
                        }
                        // The waiter stopped listening; the entry comes back
                        // and the next waiter gets a chance.
                        Err(back) => entry = back,
                    }
                }

                if state.idle.len() < self.config.max_idle {
                    state.idle.push_back(entry);
                    assert!(
                        state.idle.len() <= state.open_count,
                        "invariant broken: idle <= open (actual: {} <= {})",
                        state.idle.len(),
                        state.open_count,
                    );
                    return Ok(());
                }

                // The idle set is full; destroy the surplus rather than block.
                state.open_count -= 1;
                drop(state);
                debug!("idle set full; destroying the released resource");
                entry
            }
        };

        self.manager.destroy(entry.resource).await.map_err(PoolError::Close)
    }

    /// Destroys a resource instead of returning it to the pool.
    ///
    /// For callers that detect a broken resource. The pool forgets the
    /// resource even when the manager's close fails; the close error is
    /// still reported.
    pub async fn destroy(&self, resource: M::Resource) -> Result<(), PoolError<M::Error>> {
        {
            let mut state = self.state.lock();
            if !state.closed {
                state.open_count -= 1;
            }
        }
        self.manager.destroy(resource).await.map_err(PoolError::Close)
    }

    /// Runs the manager's health check on a resource and returns its result.
    ///
    /// Fails with [`PoolError::NoHealthCheck`] if the manager does not
    /// support health checks.
    pub async fn ping(&self, resource: &mut M::Resource) -> Result<(), PoolError<M::Error>> {
        if !self.manager.has_check() {
            return Err(PoolError::NoHealthCheck);
        }
        self.manager.check(resource).await.map_err(PoolError::Check)
    }

    /// Closes the pool and destroys all idle resources.
    ///
    /// Waiting [`Pool::acquire`] calls resolve with [`PoolError::Closed`]
    /// right away instead of running into their wait timeout. Close failures
    /// during the drain are collected and returned as [`PoolError::Drain`];
    /// every idle resource is passed to the manager regardless.
    ///
    /// Shutting down an already closed pool is a no-op success.
    pub async fn shutdown(&self) -> Result<(), PoolError<M::Error>> {
        let (idle, waiters) = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            (
                std::mem::take(&mut state.idle),
                std::mem::take(&mut state.waiters),
            )
        };

        // Dropping the delivery slots resolves every parked acquire with a
        // closed signal.
        let parked = waiters.len();
        drop(waiters);
        if parked > 0 {
            debug!(parked, "cancelled waiters on shutdown");
        }

        let mut failures = Vec::new();
        for entry in idle {
            if let Err(err) = self.manager.destroy(entry.resource).await {
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Drain(failures))
        }
    }

    /// Returns the number of idle resources.
    ///
    /// This is a point-in-time snapshot, not synchronized with concurrent
    /// acquires and releases, and not the number of live resources overall.
    pub fn len(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Whether the idle set is empty. See [`Pool::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the current status of the pool.
    ///
    /// The numbers form a consistent snapshot but can be stale by the time
    /// the caller looks at them; they are meant for an overall insight.
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            max_cap: self.config.max_cap,
            open_count: state.open_count,
            idle_count: state.idle.len(),
            wait_count: state.waiters.len(),
        }
    }

    /// Destroys a dequeued entry unless it is still fresh and healthy.
    ///
    /// Entries delivered straight from a waiter skip the health check
    /// (`check_health = false`): they were in use moments ago. Close failures
    /// on this path are logged and swallowed so the acquire loop can move on
    /// to the next candidate.
    async fn validate(
        &self,
        entry: ResourceEntry<M::Resource>,
        check_health: bool,
    ) -> Option<M::Resource> {
        let ResourceEntry {
            mut resource,
            returned_at,
        } = entry;

        if let Some(max_age) = self.config.idle_timeout {
            if returned_at.elapsed() > max_age {
                debug!(?max_age, "evicting resource that sat idle for too long");
                self.discard(resource).await;
                return None;
            }
        }

        if check_health
            && self.manager.has_check()
            && self.manager.check(&mut resource).await.is_err()
        {
            debug!("evicting resource that failed its health check");
            self.discard(resource).await;
            return None;
        }

        Some(resource)
    }

    async fn discard(&self, resource: M::Resource) {
        {
            let mut state = self.state.lock();
            if !state.closed {
                state.open_count -= 1;
            }
        }
        if self.manager.destroy(resource).await.is_err() {
            debug!("close failed while discarding a resource");
        }
    }
}
