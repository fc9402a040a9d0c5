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

//! A generic resource pool with backpressure for Async Rust.
//!
//! The pool amortizes the cost of expensive-to-create resources
//! (prototypically network connections), bounds the total number of live
//! resources, and queues [`Pool::acquire`] calls in FIFO order once capacity
//! is exhausted. Idle resources are lazily evicted when they exceed the
//! configured idle timeout or fail the manager's health check; there is no
//! background sweeper.
//!
//! Resources are created, destroyed, and health-checked exclusively through
//! an implementation of [`ManageResource`]; the pool never inspects them.
//!
//! # Example
//!
//! ```
//! use std::future::Future;
//!
//! use respool::ManageResource;
//! use respool::Pool;
//! use respool::PoolConfig;
//!
//! struct Manager;
//!
//! impl ManageResource for Manager {
//!     type Resource = Vec<u8>;
//!     type Error = std::io::Error;
//!
//!     async fn create(&self) -> Result<Self::Resource, Self::Error> {
//!         Ok(Vec::with_capacity(1024))
//!     }
//!
//!     async fn destroy(&self, _buf: Vec<u8>) -> Result<(), Self::Error> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = Pool::new(PoolConfig::new(1, 4, 16), Manager).await.unwrap();
//! assert_eq!(pool.len(), 1);
//!
//! let buf = pool.acquire().await.unwrap();
//! assert_eq!(buf.capacity(), 1024);
//!
//! pool.release(buf).await.unwrap();
//! assert_eq!(pool.len(), 1);
//!
//! pool.shutdown().await.unwrap();
//! assert!(pool.is_empty());
//! # }
//! ```

mod error;
mod manage;
mod mutex;
mod pool;

pub use error::PoolError;
pub use manage::ManageResource;
pub use pool::Pool;
pub use pool::PoolConfig;
pub use pool::PoolStatus;
