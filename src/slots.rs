//! Slot buffer derivation (C3): mapping half-open/closed sequence ranges to
//! one or two contiguous slot-index runs over a ring of `num_elements` slots.
//!
//! Pure sequence arithmetic — no atomics, no unsafe, no shared memory. Kept
//! separate so the wrap-around logic can be exhaustively unit tested on its
//! own, independent of the mmap plumbing in `region`.

/// A contiguous run of slot indices `[index, index + count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRun {
    /// Index of the first slot in the run.
    pub index: u64,
    /// Number of slots in the run.
    pub count: u64,
}

/// Zero, one, or two contiguous slot-index runs describing a sequence range.
///
/// A range wraps the ring at most once (it can never span more than
/// `num_elements` slots), so two runs is always enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLayout {
    /// Nothing to do with — the sequence range was empty.
    Empty,
    /// The range sits entirely within one contiguous run.
    Single(SlotRun),
    /// The range wraps past the end of the ring: first run to the end,
    /// second run from the start.
    Wrapped(SlotRun, SlotRun),
}

impl SlotLayout {
    /// Total number of slots covered across all runs.
    pub fn total_count(&self) -> u64 {
        match self {
            SlotLayout::Empty => 0,
            SlotLayout::Single(r) => r.count,
            SlotLayout::Wrapped(a, b) => a.count + b.count,
        }
    }

    /// Iterate the runs in order.
    pub fn runs(&self) -> impl Iterator<Item = SlotRun> {
        match *self {
            SlotLayout::Empty => [None, None],
            SlotLayout::Single(r) => [Some(r), None],
            SlotLayout::Wrapped(a, b) => [Some(a), Some(b)],
        }
        .into_iter()
        .flatten()
    }
}

/// Derive the layout for a consumer's half-open observed range `[sc, cr)`
/// for a consumer.
///
/// `num_elements` must be nonzero; `cr` must be `>= sc`.
pub fn consume_layout(sc: u64, cr: u64, num_elements: u64) -> SlotLayout {
    debug_assert!(num_elements > 0);
    debug_assert!(cr >= sc);

    if cr == sc {
        return SlotLayout::Empty;
    }

    let pc = sc % num_elements;
    let pcr = cr % num_elements;

    if pcr > pc {
        SlotLayout::Single(SlotRun {
            index: pc,
            count: pcr - pc,
        })
    } else {
        // Wraps: first run to the end of the ring, second from the start.
        // `pcr == pc` here means the full ring was spanned (cr - sc ==
        // k * num_elements for some k >= 1), not an empty range (already
        // handled above), so the first run covers the whole ring and the
        // second run is only emitted when pcr > 0.
        let first = SlotRun {
            index: pc,
            count: num_elements - pc,
        };
        if pcr > 0 {
            SlotLayout::Wrapped(
                first,
                SlotRun {
                    index: 0,
                    count: pcr,
                },
            )
        } else {
            SlotLayout::Single(first)
        }
    }
}

/// Derive the layout for a producer's closed claimed range `[sn, se]`
/// for a producer.
///
/// `num_elements` must be nonzero; `se` must be `>= sn`.
pub fn claim_layout(sn: u64, se: u64, num_elements: u64) -> SlotLayout {
    debug_assert!(num_elements > 0);
    debug_assert!(se >= sn);

    let pn = sn % num_elements;
    let pe = se % num_elements;

    if pe < pn {
        SlotLayout::Wrapped(
            SlotRun {
                index: pn,
                count: num_elements - pn,
            },
            SlotRun {
                index: 0,
                count: pe + 1,
            },
        )
    } else {
        SlotLayout::Single(SlotRun {
            index: pn,
            count: pe - pn + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_consume_range_is_empty() {
        assert_eq!(consume_layout(5, 5, 4), SlotLayout::Empty);
    }

    #[test]
    fn non_wrapping_consume_range() {
        let layout = consume_layout(0, 3, 4);
        assert_eq!(layout.total_count(), 3);
        assert_eq!(
            layout,
            SlotLayout::Single(SlotRun { index: 0, count: 3 })
        );
    }

    #[test]
    fn wrapping_consume_range_splits_in_two() {
        // num_elements=4, sc=2, cr=5 -> pc=2, pcr=1 -> wraps
        let layout = consume_layout(2, 5, 4);
        assert_eq!(layout.total_count(), 3);
        assert_eq!(
            layout,
            SlotLayout::Wrapped(
                SlotRun { index: 2, count: 2 },
                SlotRun { index: 0, count: 1 }
            )
        );
    }

    #[test]
    fn wrapping_consume_range_exact_to_boundary_has_no_second_run() {
        // sc=2, cr=4, num_elements=4 -> pc=2, pcr=0 -> only first run
        let layout = consume_layout(2, 4, 4);
        assert_eq!(layout.total_count(), 2);
        assert_eq!(
            layout,
            SlotLayout::Single(SlotRun { index: 2, count: 2 })
        );
    }

    #[test]
    fn full_ring_consume_range_wraps_fully() {
        // sc=0, cr=4 (a full lap), num_elements=4 -> pc=0, pcr=0
        let layout = consume_layout(0, 4, 4);
        assert_eq!(layout.total_count(), 4);
        assert_eq!(
            layout,
            SlotLayout::Single(SlotRun { index: 0, count: 4 })
        );
    }

    #[test]
    fn non_wrapping_claim_range() {
        let layout = claim_layout(0, 2, 4);
        assert_eq!(layout.total_count(), 3);
        assert_eq!(
            layout,
            SlotLayout::Single(SlotRun { index: 0, count: 3 })
        );
    }

    #[test]
    fn wrapping_claim_range_splits_in_two() {
        // num_elements=4, sn=3, se=4 -> pn=3, pe=0 -> wraps
        let layout = claim_layout(3, 4, 4);
        assert_eq!(layout.total_count(), 2);
        assert_eq!(
            layout,
            SlotLayout::Wrapped(
                SlotRun { index: 3, count: 1 },
                SlotRun { index: 0, count: 1 }
            )
        );
    }

    #[test]
    fn single_slot_claim() {
        let layout = claim_layout(5, 5, 4);
        assert_eq!(layout.total_count(), 1);
        assert_eq!(
            layout,
            SlotLayout::Single(SlotRun { index: 1, count: 1 })
        );
    }

    #[test]
    fn runs_totaled_bytes_matches_range_length() {
        for num_elements in [1u64, 2, 4, 8, 16] {
            for sn in 0u64..20 {
                for len in 1u64..=num_elements {
                    let se = sn + len - 1;
                    let layout = claim_layout(sn, se, num_elements);
                    assert_eq!(layout.total_count(), len);
                    let mut seen = std::collections::HashSet::new();
                    for run in layout.runs() {
                        for i in 0..run.count {
                            assert!(seen.insert(run.index + i));
                        }
                    }
                }
            }
        }
    }
}
