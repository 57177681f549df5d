//! Shadow-model consistency: the VM must agree with a plain map of what
//! was written, no matter how the history interleaves pages.

use std::collections::HashMap;

use anyhow::{bail, ensure};
use pvm_core::{Geometry, VmError};

use super::{Lcg, RunConfig, Workload, WorkloadResult, fresh_vm, workload_result};

pub fn workloads() -> Vec<Box<dyn Workload>> {
    vec![
        Box::new(RandomHistory),
        Box::new(WriteReadPairs),
        Box::new(RangeBoundary),
    ]
}

/// Random writes and reads checked against a shadow map.
struct RandomHistory;

impl Workload for RandomHistory {
    fn name(&self) -> &str {
        "random history vs shadow model"
    }
    fn category(&self) -> &str {
        "consistency"
    }
    fn ensures(&self) -> &str {
        "Any interleaving of reads and writes behaves like a flat array"
    }

    fn run(&self, config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let mut vm = fresh_vm(Geometry::default())?;
            let size = vm.geometry().virtual_memory_size();
            let mut rng = Lcg::new(config.seed);
            let mut shadow: HashMap<u64, u64> = HashMap::new();

            let mut reads = 0u64;
            for _ in 0..config.ops {
                let address = rng.next_u64() % size;
                if rng.next_u64() & 1 == 0 {
                    let word = rng.next_u64();
                    vm.write(address, word)?;
                    shadow.insert(address, word);
                } else {
                    reads += 1;
                    let expected = shadow.get(&address).copied().unwrap_or(0);
                    let got = vm.read(address)?;
                    ensure!(
                        got == expected,
                        "address {address:#x}: read {got:#x}, expected {expected:#x}"
                    );
                }
            }

            // Final audit of everything ever written.
            for (&address, &word) in &shadow {
                let got = vm.read(address)?;
                ensure!(
                    got == word,
                    "final audit at {address:#x}: read {got:#x}, expected {word:#x}"
                );
            }

            Ok(format!(
                "{} ops ({} reads), {} pages audited, {} pages in swap",
                config.ops,
                reads,
                shadow.len(),
                vm.driver().swapped_pages(),
            ))
        })
    }
}

/// write(v, x) immediately followed by read(v) returns x, everywhere.
struct WriteReadPairs;

impl Workload for WriteReadPairs {
    fn name(&self) -> &str {
        "write-read pairs"
    }
    fn category(&self) -> &str {
        "consistency"
    }
    fn ensures(&self) -> &str {
        "A read directly after a write always returns the written word"
    }

    fn run(&self, config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let mut vm = fresh_vm(Geometry::default())?;
            let size = vm.geometry().virtual_memory_size();
            let mut rng = Lcg::new(config.seed ^ 0xC0FFEE);

            for _ in 0..config.ops {
                let address = rng.next_u64() % size;
                let word = rng.next_u64();
                vm.write(address, word)?;
                let got = vm.read(address)?;
                ensure!(
                    got == word,
                    "address {address:#x}: read back {got:#x}, wrote {word:#x}"
                );
            }
            Ok(format!("{} pairs", config.ops))
        })
    }
}

/// The last in-range address works; the first out-of-range one is refused.
struct RangeBoundary;

impl Workload for RangeBoundary {
    fn name(&self) -> &str {
        "range boundary"
    }
    fn category(&self) -> &str {
        "consistency"
    }
    fn ensures(&self) -> &str {
        "The address range edge is exact: last word usable, one past refused"
    }

    fn run(&self, _config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let mut vm = fresh_vm(Geometry::default())?;
            let size = vm.geometry().virtual_memory_size();

            vm.write(size - 1, 42)?;
            ensure!(vm.read(size - 1)? == 42, "top word lost");

            match vm.read(size) {
                Err(VmError::AddressOutOfRange) => {}
                other => bail!("read past the end returned {other:?}"),
            }
            match vm.write(size, 1) {
                Err(VmError::AddressOutOfRange) => {}
                other => bail!("write past the end returned {other:?}"),
            }

            ensure!(vm.read(size - 1)? == 42, "rejected access disturbed memory");
            Ok("boundary exact".to_string())
        })
    }
}
