#![cfg_attr(not(feature = "std"), no_std)]

//! Translation core of a simulated hierarchical virtual memory.
//!
//! A small physical RAM holds both client data pages and the multi-level
//! page table that maps virtual pages onto them; a backing store absorbs
//! whatever does not fit. Client code reads and writes virtual addresses
//! through [`VirtualMemory`]; missing page-table levels are installed on
//! demand and resident frames are evicted when physical memory runs out.
//!
//! The physical memory itself sits behind [`pvm_hal::MemoryDriver`], so the
//! core never touches a frame except through word reads and writes plus
//! frame-granular evict/restore.

pub mod geometry;
mod survey;
pub mod vm;

pub use geometry::{Geometry, GeometryError};
pub use vm::{ROOT_FRAME, VirtualMemory, VmError};

// The seam types, re-exported so users of the core need only one import.
pub use pvm_hal::{DriverError, MemoryDriver, Word};
