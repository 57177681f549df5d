//! Workload modules and the runner plumbing they share.

pub mod consistency;
pub mod geometry;
pub mod pressure;

use anyhow::Result;
use pvm_core::{Geometry, VirtualMemory};
use pvm_hal::Machine;

/// Knobs shared by every workload run.
pub struct RunConfig {
    pub seed: u64,
    pub ops: u64,
}

/// Outcome of a single workload.
pub struct WorkloadResult {
    pub name: String,
    pub ensures: String,
    pub passed: bool,
    pub output: String,
}

/// A workload that can be run against a fresh VM.
pub trait Workload {
    /// Short workload name.
    fn name(&self) -> &str;

    /// What this workload ensures about the core.
    fn ensures(&self) -> &str;

    /// Category for grouping.
    fn category(&self) -> &str;

    /// Run the workload.
    fn run(&self, config: &RunConfig) -> WorkloadResult;
}

/// Helper to turn a fallible body into a [`WorkloadResult`].
pub fn workload_result(
    name: &str,
    ensures: &str,
    body: impl FnOnce() -> Result<String>,
) -> WorkloadResult {
    match body() {
        Ok(output) => WorkloadResult {
            name: name.to_string(),
            ensures: ensures.to_string(),
            passed: true,
            output,
        },
        Err(e) => WorkloadResult {
            name: name.to_string(),
            ensures: ensures.to_string(),
            passed: false,
            output: format!("{e:#}"),
        },
    }
}

/// Collect all workloads.
pub fn all_workloads() -> Vec<Box<dyn Workload>> {
    let mut workloads: Vec<Box<dyn Workload>> = Vec::new();
    workloads.extend(consistency::workloads());
    workloads.extend(pressure::workloads());
    workloads.extend(geometry::workloads());
    workloads
}

/// Build a VM over a fresh simulated machine.
pub fn fresh_vm(geometry: Geometry) -> Result<VirtualMemory<Machine>> {
    let machine = Machine::new(geometry.num_frames, geometry.page_size());
    Ok(VirtualMemory::new(geometry, machine)?)
}

/// Deterministic 64-bit LCG. Reproducible workloads without pulling a
/// dependency in for three lines of arithmetic.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }
}
