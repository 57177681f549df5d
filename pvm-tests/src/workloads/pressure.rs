//! Frame-pool pressure: workloads sized so nearly every access evicts.

use anyhow::ensure;
use pvm_core::Geometry;

use super::{Lcg, RunConfig, Workload, WorkloadResult, fresh_vm, workload_result};

pub fn workloads() -> Vec<Box<dyn Workload>> {
    vec![
        Box::new(FullSweep),
        Box::new(PingPong),
        Box::new(HotColdMix),
    ]
}

/// Write the whole address space, then read it all back.
struct FullSweep;

impl Workload for FullSweep {
    fn name(&self) -> &str {
        "full address-space sweep"
    }
    fn category(&self) -> &str {
        "pressure"
    }
    fn ensures(&self) -> &str {
        "Every word survives when the working set is the whole address space"
    }

    fn run(&self, _config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let mut vm = fresh_vm(Geometry::default())?;
            let size = vm.geometry().virtual_memory_size();

            for address in 0..size {
                vm.write(address, address.wrapping_mul(0x2545F491) | 1)?;
            }
            for address in 0..size {
                let expected = address.wrapping_mul(0x2545F491) | 1;
                let got = vm.read(address)?;
                ensure!(
                    got == expected,
                    "address {address:#x}: read {got:#x}, expected {expected:#x}"
                );
            }
            Ok(format!(
                "{} words, {} pages in swap at the end",
                size,
                vm.driver().swapped_pages(),
            ))
        })
    }
}

/// Alternate between two pages that cannot both stay resident alongside
/// their tables.
struct PingPong;

impl Workload for PingPong {
    fn name(&self) -> &str {
        "two-page ping-pong"
    }
    fn category(&self) -> &str {
        "pressure"
    }
    fn ensures(&self) -> &str {
        "Pages that evict each other keep their contents through every swap"
    }

    fn run(&self, config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            // Three frames: root, one table, one data page. Every page
            // access beyond the resident one must evict.
            let mut vm = fresh_vm(Geometry {
                num_frames: 3,
                ..Geometry::default()
            })?;

            let a = 0u64;
            let b = 16u64;
            vm.write(a, 100)?;
            vm.write(b, 200)?;
            for round in 0..config.ops.min(2_000) {
                ensure!(vm.read(a)? == 100 + round, "page A lost its word");
                vm.write(a, 100 + round + 1)?;
                ensure!(vm.read(b)? == 200 + round, "page B lost its word");
                vm.write(b, 200 + round + 1)?;
            }
            Ok(format!("{} swap rounds", config.ops.min(2_000)))
        })
    }
}

/// A hot page hammered between scattered cold accesses.
struct HotColdMix;

impl Workload for HotColdMix {
    fn name(&self) -> &str {
        "hot page under cold scatter"
    }
    fn category(&self) -> &str {
        "pressure"
    }
    fn ensures(&self) -> &str {
        "A frequently revisited page stays correct while cold pages churn"
    }

    fn run(&self, config: &RunConfig) -> WorkloadResult {
        workload_result(self.name(), self.ensures(), || {
            let mut vm = fresh_vm(Geometry::default())?;
            let size = vm.geometry().virtual_memory_size();
            let mut rng = Lcg::new(config.seed ^ 0x407);

            let hot = 5u64;
            let mut hot_word = 1u64;
            vm.write(hot, hot_word)?;

            for _ in 0..config.ops {
                let cold = rng.next_u64() % size;
                vm.write(cold, cold ^ 0xFFFF)?;
                if cold != hot {
                    ensure!(vm.read(hot)? == hot_word, "hot word lost under churn");
                }
                hot_word = hot_word.wrapping_add(1);
                vm.write(hot, hot_word)?;
            }
            Ok(format!("{} churn ops", config.ops))
        })
    }
}
