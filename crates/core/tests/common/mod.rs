//! Shared fixtures: a call-recording driver and page-table tree probes.

#![allow(dead_code)]

use std::cell::RefCell;

use pvm_core::{Geometry, MemoryDriver, ROOT_FRAME, VirtualMemory, Word};
use pvm_hal::{DriverError, Machine};

/// One driver invocation, as seen from the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Read(usize),
    Write(usize, Word),
    Evict { frame: usize, page: u64 },
    Restore { frame: usize, page: u64 },
}

/// A [`Machine`] that logs every call the translation core makes.
pub struct RecordingDriver {
    machine: Machine,
    calls: RefCell<Vec<Call>>,
}

impl RecordingDriver {
    pub fn new(geometry: &Geometry) -> Self {
        Self {
            machine: Machine::new(geometry.num_frames, geometry.page_size()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Direct view of the underlying machine, bypassing the log.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn reset_log(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn evictions(&self) -> Vec<(usize, u64)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Evict { frame, page } => Some((*frame, *page)),
                _ => None,
            })
            .collect()
    }

    pub fn restores(&self) -> Vec<(usize, u64)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Restore { frame, page } => Some((*frame, *page)),
                _ => None,
            })
            .collect()
    }
}

impl MemoryDriver for RecordingDriver {
    fn read(&self, addr: usize) -> Result<Word, DriverError> {
        self.calls.borrow_mut().push(Call::Read(addr));
        self.machine.read(addr)
    }

    fn write(&mut self, addr: usize, word: Word) -> Result<(), DriverError> {
        self.calls.borrow_mut().push(Call::Write(addr, word));
        self.machine.write(addr, word)
    }

    fn evict(&mut self, frame: usize, page: u64) -> Result<(), DriverError> {
        self.calls.borrow_mut().push(Call::Evict { frame, page });
        self.machine.evict(frame, page)
    }

    fn restore(&mut self, frame: usize, page: u64) -> Result<(), DriverError> {
        self.calls.borrow_mut().push(Call::Restore { frame, page });
        self.machine.restore(frame, page)
    }
}

/// VM over the reference geometry with a recording driver.
pub fn reference_vm() -> VirtualMemory<RecordingDriver> {
    vm_with(Geometry::default())
}

pub fn vm_with(geometry: Geometry) -> VirtualMemory<RecordingDriver> {
    let driver = RecordingDriver::new(&geometry);
    VirtualMemory::new(geometry, driver).expect("valid geometry")
}

/// Every live mapping: (parent entry address, child frame, child is a data
/// page). Read straight from the machine so the probe leaves no trace in
/// the call log.
pub fn mappings(vm: &VirtualMemory<RecordingDriver>) -> Vec<(usize, usize, bool)> {
    let g = *vm.geometry();
    let m = vm.driver().machine();
    let mut out = Vec::new();
    let mut tables = vec![ROOT_FRAME];
    for depth in 0..g.tables_depth {
        let mut next = Vec::new();
        for table in tables {
            for index in 0..g.page_size() {
                let entry = table * g.page_size() + index;
                let child = m.read(entry).unwrap() as usize;
                if child == 0 {
                    continue;
                }
                let is_leaf = depth + 1 == g.tables_depth;
                out.push((entry, child, is_leaf));
                if !is_leaf {
                    next.push(child);
                }
            }
        }
        tables = next;
    }
    out
}

/// Structural invariants that must hold at every observable moment:
/// no frame referenced twice, the root never referenced, every referenced
/// frame in range.
pub fn assert_tree_invariants(vm: &VirtualMemory<RecordingDriver>) {
    let g = vm.geometry();
    let mut seen = std::collections::HashSet::new();
    for (entry, child, _) in mappings(vm) {
        assert_ne!(child, ROOT_FRAME, "entry {entry} references the root");
        assert!(child < g.num_frames, "entry {entry} references frame {child} out of range");
        assert!(seen.insert(child), "frame {child} is referenced more than once");
    }
}

/// Assert the whole chain for `address` is installed, returning the chain's
/// frames from the first table below the root down to the data page.
pub fn assert_resident(vm: &VirtualMemory<RecordingDriver>, address: u64) -> Vec<usize> {
    let g = *vm.geometry();
    let m = vm.driver().machine();
    let mut chain = Vec::new();
    let mut frame = ROOT_FRAME;
    for level in 0..g.tables_depth {
        let entry = frame * g.page_size() + g.table_index(address, level);
        let child = m.read(entry).unwrap() as usize;
        assert_ne!(child, 0, "chain for {address:#x} broken at level {level}");
        chain.push(child);
        frame = child;
    }
    chain
}
