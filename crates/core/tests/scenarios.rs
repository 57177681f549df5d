//! End-to-end scenarios on the reference geometry: 16-word pages, two
//! table levels, four frames.

mod common;

use common::{assert_resident, assert_tree_invariants, reference_vm};
use pvm_core::VmError;

/// A single write is immediately readable.
#[test]
fn single_write_reads_back() {
    let mut vm = reference_vm();
    vm.write(13, 7).unwrap();
    assert_eq!(vm.read(13).unwrap(), 7);
    assert_resident(&vm, 13);
    assert_tree_invariants(&vm);
}

/// Two distinct leaves of the same table coexist.
#[test]
fn two_leaves_coexist() {
    let mut vm = reference_vm();
    vm.write(13, 3).unwrap();
    vm.write(31, 5).unwrap();
    assert_eq!(vm.read(13).unwrap(), 3);
    assert_eq!(vm.read(31).unwrap(), 5);
    assert_tree_invariants(&vm);
}

/// A sweep over many more pages than physical memory holds keeps every
/// word intact through the backing store.
#[test]
fn sweep_survives_constant_eviction() {
    let mut vm = reference_vm();
    for address in 0..256u64 {
        vm.write(address, address).unwrap();
    }
    assert_eq!(vm.read(0).unwrap(), 0);
    assert!(
        !vm.driver().evictions().is_empty(),
        "a 16-page sweep through 4 frames must evict"
    );
    assert_tree_invariants(&vm);
}

/// The top of the addressable range translates like any other address.
#[test]
fn top_address_round_trips() {
    let mut vm = reference_vm();
    vm.write(4095, 42).unwrap();
    assert_eq!(vm.read(4095).unwrap(), 42);
}

/// The first address past the range is rejected before the driver is
/// touched.
#[test]
fn out_of_range_has_no_side_effects() {
    let mut vm = reference_vm();
    vm.driver().reset_log();

    assert_eq!(vm.read(4096), Err(VmError::AddressOutOfRange));
    assert_eq!(vm.write(4096, 1), Err(VmError::AddressOutOfRange));
    assert_eq!(vm.read(u64::MAX), Err(VmError::AddressOutOfRange));

    assert!(vm.driver().calls().is_empty(), "rejected addresses must not reach the driver");
}

/// Filling more data pages than the frames left over for data forces
/// evictions, and the surviving mapping still reads back.
#[test]
fn refill_evicts_and_first_page_survives() {
    let mut vm = reference_vm();
    vm.write(0, 1).unwrap();
    vm.write(16, 2).unwrap();
    vm.write(32, 3).unwrap();
    vm.write(48, 4).unwrap();

    assert_eq!(vm.read(0).unwrap(), 1);
    assert_eq!(vm.driver().evictions().len(), 2);
    assert_tree_invariants(&vm);
}
