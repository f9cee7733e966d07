//! A multi-process, shared-memory ring buffer in the style of the LMAX
//! Disruptor.
//!
//! Producers and consumers are separate OS processes mapping a single
//! POSIX shared-memory object and coordinating through atomic sequence
//! counters living inside it — no locks, no syscalls on the hot path
//! beyond the CAS loop itself.
//!
//! ```no_run
//! use ring_disruptor::{Disruptor, DisruptorConfig};
//!
//! let cfg = DisruptorConfig::new("/example-ring", 1024, 64)
//!     .with_consumer(1, 0)
//!     .with_init(true);
//! let mut ring = Disruptor::new(cfg)?;
//!
//! let claimed = ring.produce_claim();
//! if let Some((start, end)) = claimed.seq {
//!     // write payload bytes into `claimed.slices`...
//!     ring.produce_commit(Some((start, end)));
//! }
//! # Ok::<(), ring_disruptor::RingError>(())
//! ```

mod affinity;
mod config;
mod constants;
mod error;
mod handle;
mod region;
mod slots;

pub use affinity::pin_current_thread;
pub use config::DisruptorConfig;
pub use error::{Result, RingError};
pub use handle::{ClaimResult, ClaimSlices, ConsumeSlices, Disruptor};
pub use slots::{SlotLayout, SlotRun};
