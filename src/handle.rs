//! C2, C4, C5, C6, C7: the disruptor handle — sequence protocol, pending
//! transaction state, spin/non-spin retry, ignore/status, and lifecycle.

use std::sync::atomic::Ordering::SeqCst;

use crate::config::DisruptorConfig;
use crate::constants::SENTINEL_IGNORING;
use crate::error::{Result, RingError};
use crate::region::SharedRegion;
use crate::slots::{self, SlotLayout, SlotRun};

/// Zero, one, or two read-only byte views into the element area, returned
/// by `consume_new` and sized to the element width.
#[derive(Debug)]
pub enum ConsumeSlices<'h> {
    /// Nothing to consume.
    Empty,
    /// The observed range sat entirely in one run.
    One(&'h [u8]),
    /// The observed range wrapped the ring.
    Two(&'h [u8], &'h [u8]),
}

impl<'h> ConsumeSlices<'h> {
    /// Total bytes across all views.
    pub fn total_len(&self) -> usize {
        match self {
            ConsumeSlices::Empty => 0,
            ConsumeSlices::One(a) => a.len(),
            ConsumeSlices::Two(a, b) => a.len() + b.len(),
        }
    }

    /// Whether this result carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

/// Zero, one, or two writable byte views into the element area, returned by
/// `produce_claim*` and `produce_recover`.
#[derive(Debug)]
pub enum ClaimSlices<'h> {
    /// Nothing was claimed.
    Empty,
    /// The claimed range sat entirely in one run.
    One(&'h mut [u8]),
    /// The claimed range wrapped the ring.
    Two(&'h mut [u8], &'h mut [u8]),
}

impl<'h> ClaimSlices<'h> {
    /// Total bytes across all views.
    pub fn total_len(&self) -> usize {
        match self {
            ClaimSlices::Empty => 0,
            ClaimSlices::One(a) => a.len(),
            ClaimSlices::Two(a, b) => a.len() + b.len(),
        }
    }

    /// Whether this result carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

/// The result of a `produce_claim`/`produce_claim_many`/`produce_claim_avail`
/// call.
#[derive(Debug)]
pub struct ClaimResult<'h> {
    /// The claimed `(seq_start, seq_end)` range, or `None` if nothing was
    /// claimed.
    pub seq: Option<(u64, u64)>,
    /// Whether every consumer was observed ignoring on this attempt.
    pub all_ignored: bool,
    /// The byte views for the claimed range.
    pub slices: ClaimSlices<'h>,
}

enum ClaimOutcome {
    Range(u64, u64),
    Empty,
    AllIgnored,
}

/// A handle on a shared-memory disruptor ring: either the producer role,
/// the consumer role for one consumer index, or both (a process may hold
/// more than one handle, one per role, over the same mapping).
///
/// A single handle is **not** internally synchronized: calls on one
/// handle must be externally serialized by the host. Multiple handles (in
/// this or other processes) coordinate purely through the atomics in the
/// shared region.
pub struct Disruptor {
    region: SharedRegion,
    cfg: DisruptorConfig,
    pending_consume: Option<(u64, u64)>,
    pending_claim: Option<(u64, u64)>,
    all_consumers_ignoring: bool,
}

impl Disruptor {
    /// Construct a handle: creates the region if `cfg.init`, else opens it
    /// without creating.
    pub fn new(cfg: DisruptorConfig) -> Result<Self> {
        cfg.validate()?;
        let region = if cfg.init {
            SharedRegion::create(&cfg)?
        } else {
            SharedRegion::open(&cfg)?
        };
        Ok(Self {
            region,
            cfg,
            pending_consume: None,
            pending_claim: None,
            all_consumers_ignoring: false,
        })
    }

    /// This handle's configured consumer index.
    pub fn consumer_index(&self) -> u32 {
        self.cfg.consumer_index
    }

    /// The range this handle last observed during `consume_new` but has not
    /// yet committed.
    pub fn pending_consume(&self) -> Option<(u64, u64)> {
        self.pending_consume
    }

    /// The range this handle last claimed but has not yet committed.
    pub fn pending_claim(&self) -> Option<(u64, u64)> {
        self.pending_claim
    }

    /// Whether the last claim attempt observed every consumer ignoring.
    pub fn all_ignored(&self) -> bool {
        self.all_consumers_ignoring
    }

    /// Load the application-defined status word.
    pub fn status(&self) -> u32 {
        self.region.status().load(SeqCst)
    }

    /// Store the application-defined status word.
    pub fn set_status(&self, value: u32) {
        self.region.status().store(value, SeqCst);
    }

    /// Current value of the shared `cursor` counter. Exposed for hosts and
    /// tests that need to observe the counter invariants directly, rather
    /// than inferring them from claim/consume results.
    pub fn cursor(&self) -> u64 {
        self.region.cursor().load(SeqCst)
    }

    /// Current value of the shared `next` counter.
    pub fn next(&self) -> u64 {
        self.region.next().load(SeqCst)
    }

    /// Current value of `consumers[index]`.
    pub fn consumer_sequence(&self, index: u32) -> u64 {
        self.region.consumer_seq(index).load(SeqCst)
    }

    #[inline]
    fn num_elements(&self) -> u64 {
        self.region.num_elements()
    }

    #[inline]
    fn element_size(&self) -> usize {
        self.region.element_size() as usize
    }

    fn slice(&self, run: SlotRun) -> &[u8] {
        let width = self.element_size();
        unsafe {
            let ptr = self.region.slot_ptr(run.index);
            std::slice::from_raw_parts(ptr, run.count as usize * width)
        }
    }

    fn slice_mut(&self, run: SlotRun) -> &mut [u8] {
        let width = self.element_size();
        unsafe {
            let ptr = self.region.slot_ptr(run.index);
            std::slice::from_raw_parts_mut(ptr, run.count as usize * width)
        }
    }

    fn consume_slices(&self, layout: SlotLayout) -> ConsumeSlices<'_> {
        match layout {
            SlotLayout::Empty => ConsumeSlices::Empty,
            SlotLayout::Single(r) => ConsumeSlices::One(self.slice(r)),
            SlotLayout::Wrapped(a, b) => ConsumeSlices::Two(self.slice(a), self.slice(b)),
        }
    }

    fn claim_slices(&self, layout: SlotLayout) -> ClaimSlices<'_> {
        match layout {
            SlotLayout::Empty => ClaimSlices::Empty,
            SlotLayout::Single(r) => ClaimSlices::One(self.slice_mut(r)),
            // SAFETY: `a` and `b` are disjoint ring-index runs (one ends at
            // the ring boundary, the other starts at zero), so the two
            // `&mut [u8]` slices never alias even though both are derived
            // from the same base pointer.
            SlotLayout::Wrapped(a, b) => ClaimSlices::Two(self.slice_mut(a), self.slice_mut(b)),
        }
    }

    /// **Consume-new**. Implicitly commits any pending consume,
    /// then observes `[consumers[c], cursor)`. Returns the observed start
    /// sequence plus the byte views.
    pub fn consume_new(&mut self) -> (u64, ConsumeSlices<'_>) {
        self.consume_commit();

        let c = self.cfg.consumer_index;
        loop {
            let sc = self.region.consumer_seq(c).load(SeqCst);
            let cr = self.region.cursor().load(SeqCst);
            if cr == sc {
                if self.cfg.spin {
                    continue;
                }
                self.pending_consume = None;
                return (sc, ConsumeSlices::Empty);
            }
            self.pending_consume = Some((sc, cr));
            let layout = slots::consume_layout(sc, cr, self.num_elements());
            return (sc, self.consume_slices(layout));
        }
    }

    /// **Consume-commit**. CASes `consumers[c]` from the pending
    /// consume's start to its end. Clears pending regardless of outcome.
    pub fn consume_commit(&mut self) -> bool {
        let Some((start, end)) = self.pending_consume.take() else {
            return false;
        };
        self.region
            .consumer_seq(self.cfg.consumer_index)
            .compare_exchange(start, end, SeqCst, SeqCst)
            .is_ok()
    }

    fn claim_range(&mut self, requested: u64, tighten: bool) -> ClaimOutcome {
        let num_elements = self.num_elements();
        loop {
            let sn = self.region.next().load(SeqCst);
            let mut n = requested.min(num_elements);
            let mut se = sn + n - 1;

            let mut any_active = false;
            let mut reject = false;
            for i in 0..self.cfg.num_consumers {
                let ci = self.region.consumer_seq(i).load(SeqCst);
                if ci == SENTINEL_IGNORING {
                    continue;
                }
                any_active = true;
                if tighten {
                    let headroom = num_elements.saturating_sub(sn.saturating_sub(ci));
                    n = n.min(headroom);
                } else if se.saturating_sub(ci) >= num_elements {
                    reject = true;
                }
            }

            if !any_active {
                self.all_consumers_ignoring = true;
                self.pending_claim = None;
                return ClaimOutcome::AllIgnored;
            }
            self.all_consumers_ignoring = false;

            if tighten {
                if n == 0 {
                    if self.cfg.spin {
                        continue;
                    }
                    self.pending_claim = None;
                    return ClaimOutcome::Empty;
                }
                se = sn + n - 1;
            } else if reject {
                if self.cfg.spin {
                    continue;
                }
                self.pending_claim = None;
                return ClaimOutcome::Empty;
            }

            match self
                .region
                .next()
                .compare_exchange(sn, se + 1, SeqCst, SeqCst)
            {
                Ok(_) => {
                    self.pending_claim = Some((sn, se));
                    return ClaimOutcome::Range(sn, se);
                }
                Err(_) => {
                    if self.cfg.spin {
                        continue;
                    }
                    self.pending_claim = None;
                    return ClaimOutcome::Empty;
                }
            }
        }
    }

    fn claim_result(&mut self, requested: u64, tighten: bool) -> ClaimResult<'_> {
        match self.claim_range(requested, tighten) {
            ClaimOutcome::AllIgnored => ClaimResult {
                seq: None,
                all_ignored: true,
                slices: ClaimSlices::Empty,
            },
            ClaimOutcome::Empty => ClaimResult {
                seq: None,
                all_ignored: false,
                slices: ClaimSlices::Empty,
            },
            ClaimOutcome::Range(sn, se) => {
                let layout = slots::claim_layout(sn, se, self.num_elements());
                ClaimResult {
                    seq: Some((sn, se)),
                    all_ignored: false,
                    slices: self.claim_slices(layout),
                }
            }
        }
    }

    /// **Produce-claim**, single slot.
    pub fn produce_claim(&mut self) -> ClaimResult<'_> {
        self.claim_result(1, false)
    }

    /// **Produce-claim-many**: reserve exactly `n` slots, or none.
    ///
    /// `n` must be at least 1; a request larger than the ring's element
    /// count is clamped to the ring size (it can never succeed regardless,
    /// since it would always lap some consumer).
    pub fn produce_claim_many(&mut self, n: u64) -> Result<ClaimResult<'_>> {
        if n == 0 {
            return Err(RingError::config("produce_claim_many: n must be at least 1"));
        }
        Ok(self.claim_result(n, false))
    }

    /// **Produce-claim-avail**: reserve up to `max` slots, tightened down to
    /// whatever headroom is currently available across active consumers.
    pub fn produce_claim_avail(&mut self, max: u64) -> Result<ClaimResult<'_>> {
        if max == 0 {
            return Err(RingError::config("produce_claim_avail: max must be at least 1"));
        }
        Ok(self.claim_result(max, true))
    }

    /// **Produce-commit**. With `range = None`, commits the
    /// pending claim. CASes `cursor` from `sn` to `se + 1`.
    pub fn produce_commit(&mut self, range: Option<(u64, u64)>) -> bool {
        let Some((sn, se)) = range.or(self.pending_claim) else {
            return false;
        };
        if sn > se {
            return false;
        }
        loop {
            match self.region.cursor().compare_exchange(sn, se + 1, SeqCst, SeqCst) {
                Ok(_) => return true,
                Err(_) => {
                    if self.cfg.spin {
                        continue;
                    }
                    return false;
                }
            }
        }
    }

    /// **Produce-recover**. Re-derives views for a caller-known
    /// range if it is still validly claimed-but-uncommitted.
    pub fn produce_recover(&mut self, sn: u64, se: u64) -> ClaimSlices<'_> {
        if sn > se {
            return ClaimSlices::Empty;
        }
        let cursor = self.region.cursor().load(SeqCst);
        let next = self.region.next().load(SeqCst);
        if cursor <= sn && next > se {
            self.pending_claim = Some((sn, se));
            let layout = slots::claim_layout(sn, se, self.num_elements());
            self.claim_slices(layout)
        } else {
            ClaimSlices::Empty
        }
    }

    /// **Release**: optionally mark this handle's consumer
    /// slot as ignoring, then unmap. Consumes the handle.
    pub fn release(self, ignore: bool) {
        if ignore {
            self.region
                .consumer_seq(self.cfg.consumer_index)
                .store(SENTINEL_IGNORING, SeqCst);
            tracing::debug!(
                consumer_index = self.cfg.consumer_index,
                "marked consumer as ignoring"
            );
        }
        // `self.region`'s `Drop` unmaps on the way out.
    }
}
