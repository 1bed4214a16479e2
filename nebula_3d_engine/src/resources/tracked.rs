/// Per-subresource resource state tracking
///
/// The authoritative current-state map of every resource. States are stored
/// as a set of disjoint subresource rectangles (mips x slices); setting a
/// range splits overlapping rectangles so queries always see exact
/// per-range states. The render graph reads this at compile time and writes
/// it back when a frame's transitions are final.

use std::sync::Mutex;

use crate::rhi::{ResourceState, SubresourceRange};

/// Tracked state of one resource, split by subresource range.
///
/// Ranges handed in must already be normalized (no `ALL_REMAINING`
/// sentinels).
pub struct TrackedState {
    /// Disjoint rectangles covering the whole resource
    ranges: Mutex<Vec<(SubresourceRange, ResourceState)>>,
    /// Range covering the entire resource
    whole: SubresourceRange,
    /// State the resource was created in (loop-back target)
    initial: ResourceState,
}

impl TrackedState {
    /// Create tracking for a resource with the given full range and state
    pub fn new(whole: SubresourceRange, initial: ResourceState) -> Self {
        Self {
            ranges: Mutex::new(vec![(whole, initial)]),
            whole,
            initial,
        }
    }

    /// The state the resource was created in
    pub fn initial_state(&self) -> ResourceState {
        self.initial
    }

    /// The full subresource range of the resource
    pub fn whole_range(&self) -> SubresourceRange {
        self.whole
    }

    /// Current states intersecting `range`, clipped to it.
    ///
    /// Returns one (sub-range, state) pair per overlapped rectangle piece.
    pub fn query(&self, range: &SubresourceRange) -> Vec<(SubresourceRange, ResourceState)> {
        let ranges = self.ranges.lock().unwrap_or_else(|p| p.into_inner());
        let mut out = Vec::new();
        for (piece, state) in ranges.iter() {
            if let Some(clipped) = intersect(piece, range) {
                out.push((clipped, *state));
            }
        }
        out
    }

    /// The single state of `range`, if the whole range is in one state
    pub fn uniform_state(&self, range: &SubresourceRange) -> Option<ResourceState> {
        let pieces = self.query(range);
        let first = pieces.first()?.1;
        if pieces.iter().all(|(_, s)| *s == first) {
            Some(first)
        } else {
            None
        }
    }

    /// Set the state of a range, splitting overlapping rectangles
    pub fn set(&self, range: &SubresourceRange, state: ResourceState) {
        let mut ranges = self.ranges.lock().unwrap_or_else(|p| p.into_inner());
        let mut next = Vec::with_capacity(ranges.len() + 4);
        for (piece, piece_state) in ranges.drain(..) {
            if piece.overlaps(range) {
                // Keep the parts of the old rectangle outside the new range
                for remainder in subtract(&piece, range) {
                    next.push((remainder, piece_state));
                }
            } else {
                next.push((piece, piece_state));
            }
        }
        next.push((*range, state));
        *ranges = next;
    }

    /// Reset the whole resource to one state (collapses all splits)
    pub fn reset(&self, state: ResourceState) {
        let mut ranges = self.ranges.lock().unwrap_or_else(|p| p.into_inner());
        ranges.clear();
        ranges.push((self.whole, state));
    }
}

/// Intersection of two concrete ranges, if any
pub(crate) fn intersect(a: &SubresourceRange, b: &SubresourceRange) -> Option<SubresourceRange> {
    let first_mip = a.first_mip.max(b.first_mip);
    let end_mip = (a.first_mip + a.mip_count).min(b.first_mip + b.mip_count);
    let first_slice = a.first_slice.max(b.first_slice);
    let end_slice = (a.first_slice + a.slice_count).min(b.first_slice + b.slice_count);
    if first_mip >= end_mip || first_slice >= end_slice {
        return None;
    }
    Some(SubresourceRange {
        first_mip,
        mip_count: end_mip - first_mip,
        first_slice,
        slice_count: end_slice - first_slice,
    })
}

/// `a` minus `b`, as up to four disjoint rectangles
pub(crate) fn subtract(a: &SubresourceRange, b: &SubresourceRange) -> Vec<SubresourceRange> {
    let Some(overlap) = intersect(a, b) else {
        return vec![*a];
    };
    let mut out = Vec::new();
    // Mip band above the overlap (full slice width of a)
    if overlap.first_mip > a.first_mip {
        out.push(SubresourceRange {
            first_mip: a.first_mip,
            mip_count: overlap.first_mip - a.first_mip,
            first_slice: a.first_slice,
            slice_count: a.slice_count,
        });
    }
    // Mip band below the overlap
    let a_end_mip = a.first_mip + a.mip_count;
    let overlap_end_mip = overlap.first_mip + overlap.mip_count;
    if overlap_end_mip < a_end_mip {
        out.push(SubresourceRange {
            first_mip: overlap_end_mip,
            mip_count: a_end_mip - overlap_end_mip,
            first_slice: a.first_slice,
            slice_count: a.slice_count,
        });
    }
    // Slice bands left/right of the overlap, restricted to the overlap's mips
    if overlap.first_slice > a.first_slice {
        out.push(SubresourceRange {
            first_mip: overlap.first_mip,
            mip_count: overlap.mip_count,
            first_slice: a.first_slice,
            slice_count: overlap.first_slice - a.first_slice,
        });
    }
    let a_end_slice = a.first_slice + a.slice_count;
    let overlap_end_slice = overlap.first_slice + overlap.slice_count;
    if overlap_end_slice < a_end_slice {
        out.push(SubresourceRange {
            first_mip: overlap.first_mip,
            mip_count: overlap.mip_count,
            first_slice: overlap_end_slice,
            slice_count: a_end_slice - overlap_end_slice,
        });
    }
    out
}

#[cfg(test)]
#[path = "tracked_tests.rs"]
mod tests;
