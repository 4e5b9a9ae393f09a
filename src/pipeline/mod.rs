//! Fan-out / Fan-in Pipeline
//!
//! Wires the completion tree to the outside world.
//!
//! ## Data flow
//! 1. **Dispatch**: `Dispatcher` splits each document, registers its pages and
//!    publishes one work-item per page.
//! 2. **Process**: external workers (or the local `PageWorkerPool`) handle pages
//!    in any order, possibly more than once.
//! 3. **Receive**: `CompletionReceiver` marks pages finished and emits
//!    document/request completion events on false -> true transitions.
//! 4. **Observe**: `CompletionMonitor` answers status queries and awaits.
//!
//! ## Submodules
//! - **`dispatcher`**: registration-before-publish fan-out.
//! - **`receiver`**: idempotent completion handling.
//! - **`notify`**: events, status, await and eviction.
//! - **`worker`**: simulated in-process worker pool.
//! - **`sweeper`**: retention-based eviction.

pub mod dispatcher;
pub mod notify;
pub mod receiver;
pub mod sweeper;
pub mod worker;
