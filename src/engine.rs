//! Visibility-activation engine.
//!
//! Owns the per-entity reveal and navigation state for a document view:
//! - [`HeroSequencer`] — staggered one-time reveals shortly after startup
//! - [`RevealObserver`] — one-shot reveals driven by viewport intersection
//! - [`ScrollSpy`] — re-enterable section activation for the sidebar
//!
//! The engine is host-agnostic: it never queries a viewport itself. Hosts
//! (the TUI loop via `viewport`, or tests) deliver ordered batches of
//! [`IntersectionUpdate`]s and read the resulting state back. Delivery order
//! across the two watches and the sequencer is not guaranteed; each behavior
//! is independent and tolerates interleaving.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Shared types
// ---------------------------------------------------------------------------

/// A single intersection observation for one target.
///
/// Hosts deliver these in document order within a batch. Targets are dense
/// indices assigned by the host (block index for reveals, section index for
/// the scroll-spy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionUpdate {
    pub target: usize,
    pub intersecting: bool,
}

/// Visibility state of a reveal target. One-way: once revealed a target
/// never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Revealed,
}

// ---------------------------------------------------------------------------
// Hero reveal sequencer
// ---------------------------------------------------------------------------

/// Timing configuration for the hero sequence.
#[derive(Debug, Clone, Copy)]
pub struct HeroConfig {
    /// Delay before the first target fires.
    pub base_delay: Duration,
    /// Additional delay per target position.
    pub step_delay: Duration,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            step_delay: Duration::from_millis(150),
        }
    }
}

/// Schedules the lead section's targets to fire once each, staggered from
/// startup. Target at position `i` fires at `base_delay + i * step_delay`.
///
/// The sequencer is poll-driven: the host asks for [`next_deadline`] to size
/// its sleep, then calls [`due`] with the elapsed time since startup. Each
/// target is returned exactly once, in schedule order.
///
/// [`next_deadline`]: HeroSequencer::next_deadline
/// [`due`]: HeroSequencer::due
pub struct HeroSequencer {
    /// `(fire_at, target)` pairs in schedule order.
    schedule: Vec<(Duration, usize)>,
    /// Index of the first entry that has not fired yet.
    next: usize,
}

impl HeroSequencer {
    /// Build the fire schedule for `targets` in the given order.
    ///
    /// An empty target set produces an already-finished sequencer.
    pub fn new(targets: &[usize], config: HeroConfig) -> Self {
        let schedule = targets
            .iter()
            .enumerate()
            .map(|(i, &target)| (config.base_delay + config.step_delay * i as u32, target))
            .collect();
        Self { schedule, next: 0 }
    }

    /// The fire time of the next pending target, or `None` when all have
    /// fired.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.schedule.get(self.next).map(|&(at, _)| at)
    }

    /// Return every target whose deadline is at or before `elapsed` and has
    /// not fired yet. Fire times are non-decreasing in target position, so
    /// this is a prefix of the remaining schedule.
    pub fn due(&mut self, elapsed: Duration) -> Vec<usize> {
        let mut fired = Vec::new();
        while let Some(&(at, target)) = self.schedule.get(self.next) {
            if at > elapsed {
                break;
            }
            fired.push(target);
            self.next += 1;
        }
        fired
    }

    /// True once every scheduled target has fired.
    pub fn is_done(&self) -> bool {
        self.next >= self.schedule.len()
    }
}

// ---------------------------------------------------------------------------
// Scroll reveal observer
// ---------------------------------------------------------------------------

/// One-shot reveal watch over a dense set of targets.
///
/// Every target starts `{hidden, watched}`. An intersecting update on a
/// watched target reveals it and releases the watch immediately, so no
/// further update can touch it — the core invariant distinguishing this
/// observer from the scroll-spy. Targets never re-hide.
pub struct RevealObserver {
    state: Vec<Visibility>,
    watched: Vec<bool>,
}

impl RevealObserver {
    /// All `count` targets start hidden and watched.
    pub fn new(count: usize) -> Self {
        Self {
            state: vec![Visibility::Hidden; count],
            watched: vec![true; count],
        }
    }

    /// Process one batch of updates in order. Returns the targets newly
    /// revealed by this batch, in batch order. Non-intersecting updates and
    /// updates for released or out-of-range targets are ignored.
    pub fn apply(&mut self, batch: &[IntersectionUpdate]) -> Vec<usize> {
        let mut revealed = Vec::new();
        for update in batch {
            if !update.intersecting {
                continue;
            }
            if self.reveal(update.target) {
                revealed.push(update.target);
            }
        }
        revealed
    }

    /// Directly reveal `target`, releasing its watch. Idempotent: returns
    /// `true` only on the hidden→revealed transition. This is the entry the
    /// hero path uses; a target fired by both the sequencer and the scroll
    /// watch flips once and the second flip is a no-op.
    pub fn reveal(&mut self, target: usize) -> bool {
        match self.watched.get_mut(target) {
            Some(watched) if *watched => {
                *watched = false;
                self.state[target] = Visibility::Revealed;
                true
            }
            _ => false,
        }
    }

    /// Current visibility of `target`. Out-of-range targets read as hidden.
    pub fn visibility(&self, target: usize) -> Visibility {
        self.state
            .get(target)
            .copied()
            .unwrap_or(Visibility::Hidden)
    }

    pub fn is_revealed(&self, target: usize) -> bool {
        self.visibility(target) == Visibility::Revealed
    }

    /// Number of targets still under watch.
    pub fn watched_count(&self) -> usize {
        self.watched.iter().filter(|&&w| w).count()
    }

    /// Reveal everything at once (the `--no-animate` path).
    pub fn reveal_all(&mut self) {
        for target in 0..self.state.len() {
            self.reveal(target);
        }
    }
}

// ---------------------------------------------------------------------------
// Section scroll-spy
// ---------------------------------------------------------------------------

/// Re-enterable section watch keeping at most one nav link active.
///
/// Sections are dense indices; `nav_links[i]` says whether section `i` has a
/// sidebar entry. A section with no entry deactivates the current link when
/// it enters the band but activates nothing; an unresolvable navigation
/// target is silently ignored.
///
/// Tie-break: updates are processed in batch order and the last matching
/// section processed wins. Hosts deliver batches in document order, so when
/// several sections enter the band at once the bottommost one ends active.
pub struct ScrollSpy {
    intersecting: Vec<bool>,
    nav_links: Vec<bool>,
    active: Option<usize>,
}

impl ScrollSpy {
    pub fn new(section_count: usize, nav_links: Vec<bool>) -> Self {
        debug_assert_eq!(section_count, nav_links.len());
        Self {
            intersecting: vec![false; section_count],
            nav_links,
            active: None,
        }
    }

    /// Convenience constructor for hosts where every section has a link.
    pub fn with_full_nav(section_count: usize) -> Self {
        Self::new(section_count, vec![true; section_count])
    }

    /// Process one batch of updates in order. For every section whose
    /// intersecting state is newly true: clear the active link, then set the
    /// section's own link active if it has one. Returns `true` when the
    /// active link changed. Watching never stops — sections re-enter and
    /// re-trigger as the user scrolls up and down.
    pub fn apply(&mut self, batch: &[IntersectionUpdate]) -> bool {
        let before = self.active;
        for update in batch {
            let Some(was) = self.intersecting.get_mut(update.target) else {
                continue;
            };
            let newly_intersecting = update.intersecting && !*was;
            *was = update.intersecting;
            if newly_intersecting {
                self.active = None;
                if self.nav_links.get(update.target).copied().unwrap_or(false) {
                    self.active = Some(update.target);
                }
            }
        }
        self.active != before
    }

    /// Index of the section whose nav link is active, if any. At most one
    /// link is active after any fully-processed batch.
    pub fn active(&self) -> Option<usize> {
        self.active
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
