//! One-pass depth-first survey of the live page-table tree.
//!
//! Every allocation decision needs three facts about the tree at once: the
//! high-water mark of referenced frames, some recyclable all-zero
//! intermediate table, and the best eviction victim among the resident data
//! pages. A single traversal gathers all three into a [`Survey`] record so
//! the allocator pays for exactly one walk per decision.

use pvm_hal::{DriverError, MemoryDriver};

use crate::geometry::Geometry;
use crate::vm::ROOT_FRAME;

/// Everything one traversal learns about the tree.
pub(crate) struct Survey {
    /// Greatest frame index reached via a non-zero entry. Zero when the
    /// tree is bare.
    pub max_used: usize,
    /// An all-zero intermediate table eligible for recycling, if any.
    pub empty: Option<EmptySlot>,
    /// The resident data page with the maximal eviction score, if any.
    pub victim: Option<Victim>,
}

/// A recyclable table and the entry that points at it.
pub(crate) struct EmptySlot {
    pub frame: usize,
    /// Physical word address of the parent entry naming `frame`.
    pub parent_entry: usize,
}

/// The eviction candidate chosen by the score metric.
pub(crate) struct Victim {
    pub frame: usize,
    /// Physical word address of the parent entry naming `frame`.
    pub parent_entry: usize,
    /// Virtual page number resident in `frame`.
    pub page: u64,
    score: u64,
}

/// Survey the tree rooted at frame 0.
///
/// `avoid` is the frame currently holding the entry the caller wants to
/// fill; it is descended into but never offered for recycling, since
/// handing it out would wire a frame to itself.
pub(crate) fn survey<D: MemoryDriver>(
    driver: &D,
    geometry: &Geometry,
    avoid: usize,
) -> Result<Survey, DriverError> {
    let mut out = Survey {
        max_used: 0,
        empty: None,
        victim: None,
    };
    visit(driver, geometry, avoid, ROOT_FRAME, 0, 0, 0, 0, &mut out)?;
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn visit<D: MemoryDriver>(
    driver: &D,
    geometry: &Geometry,
    avoid: usize,
    frame: usize,
    parent_entry: usize,
    depth: u32,
    score_above: u64,
    page_prefix: u64,
    out: &mut Survey,
) -> Result<(), DriverError> {
    let score_here = score_above + parity_weight(geometry, frame as u64);

    if depth == geometry.tables_depth {
        // Data page. Its score adds one more weight picked by the parity of
        // its virtual page number; ties go to the smaller page number.
        let score = score_here + parity_weight(geometry, page_prefix);
        let better = match &out.victim {
            None => true,
            Some(v) => score > v.score || (score == v.score && page_prefix < v.page),
        };
        if better {
            out.victim = Some(Victim {
                frame,
                parent_entry,
                page: page_prefix,
                score,
            });
        }
        return Ok(());
    }

    let mut is_empty = true;
    for index in 0..geometry.page_size() {
        let entry = frame * geometry.page_size() + index;
        let child = driver.read(entry)? as usize;
        if child == 0 {
            continue;
        }
        is_empty = false;
        if child > out.max_used {
            out.max_used = child;
        }
        visit(
            driver,
            geometry,
            avoid,
            child,
            entry,
            depth + 1,
            score_here,
            (page_prefix << geometry.offset_width) | index as u64,
            out,
        )?;
    }

    // Later finds overwrite earlier ones; the last empty table visited wins.
    // The root is never recyclable, and neither is the avoided frame.
    if is_empty && frame != avoid && frame != ROOT_FRAME {
        out.empty = Some(EmptySlot {
            frame,
            parent_entry,
        });
    }

    Ok(())
}

#[inline]
fn parity_weight(geometry: &Geometry, n: u64) -> u64 {
    if n & 1 == 1 {
        geometry.weight_odd
    } else {
        geometry.weight_even
    }
}
