//! Lock-free latest-value exchange between one real-time producer and one
//! consumer.
//!
//! The core is a triple buffer ([`triple_buffer`]): the producer fills a
//! private slot and publishes it with one atomic swap, the consumer picks up
//! the newest published slot with one atomic load and, when there is something
//! new, one more swap. Neither side ever blocks, allocates, or sees a
//! half-written payload; the consumer may skip intermediate commits.
//!
//! [`locked`] holds a blocking double buffer for contexts that can afford to
//! wait. The `relay`, `config`, `stats` and `types` modules back the
//! `frame-relay` demo binary.

pub mod config;
pub mod error;
pub mod exchange_point;
pub mod locked;
pub mod relay;
pub mod stats;
mod sync;
pub mod triple;
pub mod types;

#[cfg(test)]
#[cfg_attr(feature = "loom", allow(dead_code))]
pub(crate) mod testutil;


pub use exchange_point::{ExchangePoint, Record, SlotId};
pub use locked::{LockedReader, LockedWriter, locked_double_buffer, locked_double_buffer_with};
pub use triple::{Consumer, Producer, triple_buffer, triple_buffer_with};
