//! # Hub Shared Memory
//!
//! Single-slot, last-write-wins byte slots used by the hub node for its
//! outbound telemetry buffer and its inbound command slot.
//!
//! ## Features
//!
//! - **Whole-record replacement**: every write replaces the full payload
//! - **Seqlock publication**: readers never observe a partial write
//! - **Optional file backing**: a memory-mapped file lets a host process
//!   read telemetry or drop in commands while the node runs
//!
//! ## Usage
//!
//! ```rust
//! use hub_shared_memory::SharedSlot;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut slot = SharedSlot::in_memory("telemetry", 10)?;
//! slot.write(&[0x11, 87])?;
//! slot.write(&[0x11, 86])?;
//! assert_eq!(slot.read()?, vec![0x11, 86]);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod slot;

pub use error::{ShmError, ShmResult};
pub use slot::{MAX_SLOT_CAPACITY, SLOT_HEADER_LEN, SharedSlot};
