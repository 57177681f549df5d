//! Geometry edge cases: depth extremes and misconfiguration rejection.

use anyhow::{Result, bail, ensure};
use pvm_core::{Geometry, GeometryError, VirtualMemory, VmError};
use pvm_hal::Machine;

use super::{Lcg, RunConfig, Workload, WorkloadResult, fresh_vm, workload_result};

pub fn workloads() -> Vec<Box<dyn Workload>> {
    vec![
        Box::new(DepthSweep),
        Box::new(RejectsMisconfiguration),
    ]
}

/// The same scattered workload across one-, two-, and four-level trees.
struct DepthSweep;

impl Workload for DepthSweep {
    fn name(&self) -> &str {
        "tree depth sweep"
    }
    fn category(&self) -> &str {
        "geometry"
    }
    fn ensures(&self) -> &str {
        "Translation is depth-agnostic: 1 to 4 table levels all hold words"
    }

    fn run(&self, config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let cases = [
                Geometry { offset_width: 6, tables_depth: 1, num_frames: 4, weight_even: 2, weight_odd: 3 },
                Geometry { offset_width: 4, tables_depth: 2, num_frames: 4, weight_even: 2, weight_odd: 3 },
                Geometry { offset_width: 3, tables_depth: 4, num_frames: 7, weight_even: 2, weight_odd: 3 },
            ];

            for geometry in cases {
                exercise(geometry, config)?;
            }
            Ok(format!("{} geometries", cases.len()))
        })
    }
}

fn exercise(geometry: Geometry, config: &RunConfig) -> Result<()> {
    let mut vm = fresh_vm(geometry)?;
    let size = vm.geometry().virtual_memory_size();
    let mut rng = Lcg::new(config.seed ^ u64::from(geometry.tables_depth));

    let mut history = Vec::new();
    for _ in 0..config.ops.min(4_000) {
        let address = rng.next_u64() % size;
        let word = rng.next_u64() | 1;
        vm.write(address, word)?;
        history.push((address, word));
    }
    // Replay newest-first so stale writes to the same address don't count.
    let mut checked = std::collections::HashSet::new();
    for &(address, word) in history.iter().rev() {
        if !checked.insert(address) {
            continue;
        }
        let got = vm.read(address)?;
        ensure!(
            got == word,
            "depth {}: address {address:#x} read {got:#x}, expected {word:#x}",
            geometry.tables_depth,
        );
    }
    Ok(())
}

/// Geometries that cannot support a single translation are refused up
/// front.
struct RejectsMisconfiguration;

impl Workload for RejectsMisconfiguration {
    fn name(&self) -> &str {
        "misconfiguration rejection"
    }
    fn category(&self) -> &str {
        "geometry"
    }
    fn ensures(&self) -> &str {
        "A VM that could never complete a translation refuses to start"
    }

    fn run(&self, _config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let starved = Geometry {
                num_frames: 2,
                ..Geometry::default()
            };
            let machine = Machine::new(starved.num_frames, starved.page_size());
            match VirtualMemory::new(starved, machine).err() {
                Some(VmError::Geometry(GeometryError::NotEnoughFrames)) => {}
                other => bail!("starved geometry was accepted: {other:?}"),
            }

            let flat = Geometry {
                tables_depth: 0,
                ..Geometry::default()
            };
            let machine = Machine::new(flat.num_frames, flat.page_size());
            match VirtualMemory::new(flat, machine).err() {
                Some(VmError::Geometry(GeometryError::ZeroDepth)) => {}
                other => bail!("zero-depth geometry was accepted: {other:?}"),
            }

            Ok("misconfigurations refused".to_string())
        })
    }
}
