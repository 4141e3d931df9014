//! # Session Aggregation
//!
//! [`SkiData`] collects classified elements into a hierarchy:
//!
//! - **runs**: contiguous stretches of one mode, closed as soon as the mode changes
//! - **blocks** ([`TrackBlock`]): one ride each, a new block starting whenever a
//!   LIFT run closes after the current block already holds runs
//! - **views**: the whole session and one track per mode
//!
//! The structure is built incrementally with [`SkiData::add_element`] and
//! sealed with [`SkiData::close_all`], which closes the open run, files the
//! last block and computes the aggregates of every view. After sealing the
//! data is read-only.
//!
//! ## Example
//!
//! ```rust
//! use skidata::{Datum, MeasuredElement, Mode, SkiData};
//!
//! let modes = [Mode::Stop, Mode::Lift, Mode::Lift, Mode::Ski, Mode::Lift];
//! let mut data = SkiData::new();
//! for (t, mode) in modes.into_iter().enumerate() {
//!     let datum = Datum::new(t as i64, 45.9, 6.8, 340_000, 5_084_000, 2000, 0.0);
//!     data.add_element(MeasuredElement::new(datum, None).classify(mode));
//! }
//! data.close_all();
//!
//! assert_eq!(data.track_count(), 4);
//! assert_eq!(data.block_count(), 3);
//! ```

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};

use crate::track::{Track, TrackElement};
use crate::Mode;

// ============================================================================
// Blocks
// ============================================================================

/// One ride: a set of runs ordered by time, usually opening with a lift.
#[derive(Debug, Clone, Default)]
pub struct TrackBlock {
    runs: Vec<Track>,
    elements: Track,
    modes: HashMap<Mode, Track>,
}

impl TrackBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a run. Runs must arrive in time order.
    pub fn add(&mut self, run: Track) {
        let mode = run.mode();
        for element in run.iter() {
            self.elements.push(*element);
        }
        if let Some(mode) = mode {
            self.modes.entry(mode).or_default().extend(run.iter().copied());
        }
        self.runs.push(run);
    }

    /// Compute aggregates of the flattened and per-mode tracks.
    pub fn close(&mut self) {
        self.elements.close();
        for track in self.modes.values_mut() {
            track.close();
        }
    }

    /// The run the block is keyed by (its first run).
    pub fn key(&self) -> Option<&Track> {
        self.runs.first()
    }

    fn key_time(&self) -> Option<i64> {
        self.key().and_then(Track::first).map(TrackElement::time)
    }

    pub fn runs(&self) -> &[Track] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Every element of every run, in order.
    pub fn elements(&self) -> &Track {
        &self.elements
    }

    pub fn elements_in(&self, mode: Mode) -> Option<&Track> {
        self.modes.get(&mode)
    }

    /// Share of the block's elements in `mode`, 0 for an empty block.
    pub fn ratio(&self, mode: Mode) -> f64 {
        if self.elements.is_empty() {
            return 0.0;
        }
        let in_mode = self.modes.get(&mode).map_or(0, Track::len);
        in_mode as f64 / self.elements.len() as f64
    }

    pub fn start_time(&self) -> i64 {
        self.elements.start_time()
    }

    pub fn end_time(&self) -> i64 {
        self.elements.end_time()
    }
}

// ============================================================================
// Session
// ============================================================================

/// The classified, aggregated session.
#[derive(Debug, Clone, Default)]
pub struct SkiData {
    elements: Track,
    modes: HashMap<Mode, Track>,
    open_run: Track,
    current_block: TrackBlock,
    blocks: Vec<TrackBlock>,
    run_count: usize,
    /// First element time of each run -> (block index, run index)
    run_index: BTreeMap<i64, (usize, usize)>,
    /// First element time of each block's key run -> block index
    block_index: BTreeMap<i64, usize>,
    sealed: bool,
}

impl SkiData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next classified element. A change of mode closes the open run.
    pub fn add_element(&mut self, element: TrackElement) {
        if self.sealed {
            warn!("[SkiData] Ignoring element at {} added after close_all", element.time());
            return;
        }

        self.elements.push(element);
        self.modes.entry(element.mode()).or_default().push(element);

        if self.open_run.mode().is_some_and(|mode| mode != element.mode()) {
            self.close_run();
        }
        self.open_run.push(element);
    }

    fn close_run(&mut self) {
        if self.open_run.is_empty() {
            return;
        }
        let mut run = std::mem::take(&mut self.open_run);
        run.close();

        if run.mode() == Some(Mode::Lift) && !self.current_block.is_empty() {
            self.file_block();
        }

        if let Some(first) = run.first() {
            self.run_index
                .entry(first.time())
                .or_insert((self.blocks.len(), self.current_block.run_count()));
        }
        self.run_count += 1;
        debug!(
            "[SkiData] Closed {} run: {} elements, {:.0}m, {:+}m",
            run.mode().unwrap_or_default(),
            run.len(),
            run.distance(),
            run.altitude_delta()
        );
        self.current_block.add(run);
    }

    fn file_block(&mut self) {
        let mut block = std::mem::take(&mut self.current_block);
        block.close();
        if let Some(key) = block.key_time() {
            self.block_index.insert(key, self.blocks.len());
        }
        debug!(
            "[SkiData] Filed block {} with {} runs",
            self.blocks.len(),
            block.run_count()
        );
        self.blocks.push(block);
    }

    /// Close the open run, file the last block and compute every aggregate.
    pub fn close_all(&mut self) {
        if self.sealed {
            return;
        }
        self.close_run();
        if !self.current_block.is_empty() {
            self.file_block();
        }
        self.elements.close();
        for track in self.modes.values_mut() {
            track.close();
        }
        self.sealed = true;

        info!(
            "[SkiData] Sealed: {} elements, {} runs, {} blocks",
            self.len(),
            self.track_count(),
            self.block_count()
        );
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of closed runs.
    pub fn track_count(&self) -> usize {
        self.run_count
    }

    /// Number of filed blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Every element in session order.
    pub fn all_elements(&self) -> &Track {
        &self.elements
    }

    /// Every element classified as `mode`, `None` if there are none.
    pub fn elements_in(&self, mode: Mode) -> Option<&Track> {
        self.modes.get(&mode)
    }

    /// Closed runs in session order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.blocks
            .iter()
            .chain(std::iter::once(&self.current_block))
            .flat_map(|block| block.runs().iter())
    }

    /// The run starting with `element`.
    pub fn track_from(&self, element: &TrackElement) -> Option<&Track> {
        let &(block, run) = self.run_index.get(&element.time())?;
        let block = if block == self.blocks.len() {
            &self.current_block
        } else {
            self.blocks.get(block)?
        };
        block.runs().get(run)
    }

    pub fn blocks(&self) -> &[TrackBlock] {
        &self.blocks
    }

    /// The block keyed by run `key`.
    pub fn block(&self, key: &Track) -> Option<&TrackBlock> {
        let time = key.first()?.time();
        let &index = self.block_index.get(&time)?;
        self.blocks.get(index)
    }

    /// Runs of the block keyed by `key`.
    pub fn block_tracks(&self, key: &Track) -> Option<&[Track]> {
        self.block(key).map(TrackBlock::runs)
    }

    /// All elements of the block keyed by `key`.
    pub fn block_elements(&self, key: &Track) -> Option<&Track> {
        self.block(key).map(TrackBlock::elements)
    }

    /// Key runs of every block, in time order.
    pub fn block_keys(&self) -> Vec<&Track> {
        self.blocks.iter().filter_map(TrackBlock::key).collect()
    }
}
