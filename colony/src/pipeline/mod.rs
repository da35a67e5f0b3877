//! # Job Pipelines
//!
//! Typed front ends over the [`WorkerPool`](crate::engine::WorkerPool)
//! engine.
//!
//! - [`ManifoldFuncPool`]: one executive function per pool, typed results
//!   delivered through a bounded output channel with backpressure
//! - [`FuncPool`]: one executive function per pool, fire and forget
//! - [`TaskPool`]: arbitrary futures, fire and forget
//!
//! [`start_cancellation_monitor`] turns the cancel signal of a manifold pool
//! into cancellation of its owner. Helper tasks run on a [`WaitGroup`], either
//! a plain `TaskTracker` or a [`TrackableWaitGroup`].

/// Engine accessors shared by every pipeline. Expects a private
/// `fn engine(&self) -> &WorkerPool<_>` on the implementing type.
macro_rules! pool_introspection {
    () => {
        /// Live workers, idle or busy.
        pub fn running(&self) -> usize {
            self.engine().running()
        }

        /// Callers blocked waiting for a worker.
        pub fn waiting(&self) -> usize {
            self.engine().waiting()
        }

        /// Workers that could still be started, `-1` when unbounded.
        pub fn free(&self) -> i32 {
            self.engine().free()
        }

        pub fn cap(&self) -> i32 {
            self.engine().cap()
        }

        pub fn is_closed(&self) -> bool {
            self.engine().is_closed()
        }

        pub fn options(&self) -> &$crate::engine::Options {
            self.engine().options()
        }

        /// See [`WorkerPool::tune`](crate::engine::WorkerPool::tune).
        pub fn tune(&self, size: i32) {
            self.engine().tune(size)
        }

        /// See [`WorkerPool::release`](crate::engine::WorkerPool::release).
        pub fn release(&self) {
            self.engine().release()
        }

        /// See [`WorkerPool::release_timeout`](crate::engine::WorkerPool::release_timeout).
        pub async fn release_timeout(&self, timeout: std::time::Duration) -> Result<(), colony_api::PoolError> {
            self.engine().release_timeout(timeout).await
        }

        /// See [`WorkerPool::reboot`](crate::engine::WorkerPool::reboot).
        pub async fn reboot(&self) {
            self.engine().reboot().await
        }
    };
}
pub(crate) use pool_introspection;

mod cancel;
mod func;
mod manifold;
mod output;
mod stamp;
mod task;
mod wait_group;

pub use cancel::start_cancellation_monitor;
pub use func::FuncPool;
pub use manifold::ManifoldFuncPool;
pub use task::TaskPool;
pub use wait_group::{CountHook, TrackableWaitGroup, WaitGroup};
