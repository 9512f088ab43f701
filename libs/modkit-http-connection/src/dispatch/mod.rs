//! Request orchestration for a single logical call.
//!
//! - [`RedirectCoordinator`] drives the hop loop and rewrites requests
//! - `RetryCoordinator` repeats an idempotent hop on transient failures
//! - `RequestExecutor` performs one attempt on a leased transport
//!
//! Hops and attempts run strictly in order; nothing here spawns.

mod executor;
mod redirect;
mod retry;

pub use redirect::{Dispatch, RedirectCoordinator};
