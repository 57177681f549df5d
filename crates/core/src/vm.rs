//! The virtual memory handle: multi-level walker, frame acquisition, and
//! the word-granular client API.

use pvm_hal::{DriverError, MemoryDriver, Word};

use crate::geometry::{Geometry, GeometryError};
use crate::survey::{self, Victim};

/// Frame 0 holds the root page table for the life of the VM. It is never
/// allocated, recycled, or evicted, which is what lets entry value 0 mean
/// "absent".
pub const ROOT_FRAME: usize = 0;

/// A hierarchical virtual memory over a [`MemoryDriver`].
///
/// Single-threaded by construction: every operation takes `&mut self` and
/// runs to completion before the next begins.
pub struct VirtualMemory<D: MemoryDriver> {
    geometry: Geometry,
    driver: D,
}

impl<D: MemoryDriver> VirtualMemory<D> {
    /// Validate the geometry and zero the root table.
    pub fn new(geometry: Geometry, driver: D) -> Result<Self, VmError> {
        geometry.validate()?;
        let mut vm = Self { geometry, driver };
        vm.clear_table(ROOT_FRAME)?;
        log::info!(
            "virtual memory online: {} frames of {} words, {} table levels",
            geometry.num_frames,
            geometry.page_size(),
            geometry.tables_depth,
        );
        Ok(vm)
    }

    /// Read the word at a virtual address.
    pub fn read(&mut self, address: u64) -> Result<Word, VmError> {
        self.check_range(address)?;
        let target = self.translate(address)?;
        Ok(self.driver.read(target)?)
    }

    /// Write a word at a virtual address.
    pub fn write(&mut self, address: u64, word: Word) -> Result<(), VmError> {
        self.check_range(address)?;
        let target = self.translate(address)?;
        self.driver.write(target, word)?;
        Ok(())
    }

    #[inline]
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn check_range(&self, address: u64) -> Result<(), VmError> {
        if address >= self.geometry.virtual_memory_size() {
            return Err(VmError::AddressOutOfRange);
        }
        Ok(())
    }

    /// Walk the tree for `address`, installing whatever is missing, and
    /// return the physical word address of the addressed word.
    ///
    /// On return the whole chain for the page is non-zero and the leaf
    /// frame holds the page's current contents.
    fn translate(&mut self, address: u64) -> Result<usize, VmError> {
        let geometry = self.geometry;
        let mut frame = ROOT_FRAME;
        for level in 0..geometry.tables_depth {
            let entry = frame * geometry.page_size() + geometry.table_index(address, level);
            let child = self.driver.read(entry)? as usize;
            if child != 0 {
                log::trace!("walk level {level}: frame {frame} entry {entry} -> {child}");
                frame = child;
                continue;
            }
            // Miss: acquire a frame, wire it in, and make it presentable.
            // The frame holding `entry` must not be handed back to us.
            let leaf = level + 1 == geometry.tables_depth;
            let acquired = self.acquire_frame(frame)?;
            self.link_and_prepare(entry, acquired, leaf, geometry.page_number(address))?;
            log::trace!("walk level {level}: frame {frame} entry {entry} => installed {acquired}");
            frame = acquired;
        }
        Ok(frame * geometry.page_size() + geometry.page_offset(address))
    }

    /// Pick a frame for reuse: an untouched one past the high-water mark if
    /// any, else a recyclable empty table, else the eviction victim.
    fn acquire_frame(&mut self, avoid: usize) -> Result<usize, VmError> {
        let survey = survey::survey(&self.driver, &self.geometry, avoid)?;

        let next = survey.max_used + 1;
        if next < self.geometry.num_frames {
            log::debug!("frame {next} taken fresh (high-water mark {})", survey.max_used);
            return Ok(next);
        }

        if let Some(slot) = survey.empty {
            self.detach(slot.parent_entry)?;
            log::debug!("frame {} recycled from an empty table", slot.frame);
            return Ok(slot.frame);
        }

        // A full tree with no recyclable table must hold a data page.
        let victim = survey
            .victim
            .expect("physical memory exhausted with no resident data page");
        log::debug!(
            "frame {} evicted (page {:#x}, high-water mark {})",
            victim.frame,
            victim.page,
            survey.max_used,
        );
        self.evict_leaf(&victim)?;
        Ok(victim.frame)
    }

    /// Unwire a resident data page and persist it to the backing store.
    fn evict_leaf(&mut self, victim: &Victim) -> Result<(), VmError> {
        self.detach(victim.parent_entry)?;
        self.driver.evict(victim.frame, victim.page)?;
        Ok(())
    }

    /// Wire `frame` into the parent entry, then either restore the page
    /// into it (leaf level) or zero it (table level). Covers stale contents
    /// left behind by an earlier life of the frame.
    fn link_and_prepare(
        &mut self,
        parent_entry: usize,
        frame: usize,
        leaf: bool,
        page: u64,
    ) -> Result<(), VmError> {
        self.driver.write(parent_entry, frame as Word)?;
        if leaf {
            self.driver.restore(frame, page)?;
        } else {
            self.clear_table(frame)?;
        }
        Ok(())
    }

    /// Zero every entry of a table frame.
    fn clear_table(&mut self, frame: usize) -> Result<(), VmError> {
        let base = frame * self.geometry.page_size();
        for index in 0..self.geometry.page_size() {
            self.driver.write(base + index, 0)?;
        }
        Ok(())
    }

    /// Zero the parent entry pointing at a frame, detaching it from the
    /// tree.
    fn detach(&mut self, parent_entry: usize) -> Result<(), VmError> {
        self.driver.write(parent_entry, 0)?;
        Ok(())
    }
}

/// Translation error type (0x03xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// Virtual address beyond the addressable range
    AddressOutOfRange,
    /// The physical memory driver failed
    Driver(DriverError),
    /// The geometry cannot support translation
    Geometry(GeometryError),
}

impl VmError {
    /// Subsystem identifier for this error type.
    pub const SUBSYSTEM: u8 = 0x03;

    /// Get numeric error code for debugging.
    pub const fn code(&self) -> u16 {
        let low: u16 = match self {
            Self::AddressOutOfRange => 0x01,
            Self::Driver(_) => 0x02,
            Self::Geometry(_) => 0x03,
        };
        ((Self::SUBSYSTEM as u16) << 8) | low
    }
}

impl From<DriverError> for VmError {
    fn from(inner: DriverError) -> Self {
        Self::Driver(inner)
    }
}

impl From<GeometryError> for VmError {
    fn from(inner: GeometryError) -> Self {
        Self::Geometry(inner)
    }
}

impl core::fmt::Display for VmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AddressOutOfRange => {
                write!(f, "E{:04X}: Virtual address out of range", self.code())
            }
            Self::Driver(inner) => {
                write!(f, "E{:04X}: Driver failure ({inner})", self.code())
            }
            Self::Geometry(inner) => {
                write!(f, "E{:04X}: Bad geometry ({inner})", self.code())
            }
        }
    }
}

impl core::error::Error for VmError {}
