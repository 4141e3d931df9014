//! # Load Orchestrator
//!
//! Drives one session through the full pipeline:
//!
//! ```text
//! Idle -> Loading -> Processing -> Complete
//!            |           |
//!            +-----------+--> Cancelled | Error
//! ```
//!
//! 1. **Loading** - skip `start` records, then read until the input ends, the
//!    run is cancelled, or `max` records have been read. An I/O failure is
//!    fatal.
//! 2. **Processing** - fill time gaps, then walk the lookahead window, ask the
//!    [`Processor`] for each element's mode and build a [`SkiData`]. A panic in
//!    this phase is caught; whatever was classified is still sealed and kept
//!    as partial data.
//!
//! Progress is reported through a [`DataLoaderListener`], called synchronously
//! from whichever thread runs the loader. [`DataLoader::spawn`] runs it on a
//! dedicated worker and returns a [`LoadHandle`]. Cancellation is cooperative:
//! the flag is checked once per record and once per element.

use std::any::Any;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::classifier::Processor;
use crate::error::{ConfigError, LoadError};
use crate::interpolate::interpolate;
use crate::parser::DataParser;
use crate::ski_data::SkiData;
use crate::window::{ElemWindow, DEFAULT_WINDOW_CAPACITY};
use crate::{Datum, Mode};

// ============================================================================
// Configuration
// ============================================================================

/// Loader options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoaderConfig {
    /// Records to skip before loading.
    /// Default: 0
    pub start: usize,

    /// Maximum number of records to load, `None` for all.
    /// Default: None
    pub max: Option<usize>,

    /// Number of elements in the lookahead window.
    /// Default: 20
    pub window_capacity: usize,

    /// Drop samples whose time does not advance.
    /// Default: false
    pub remove_duplicates: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            start: 0,
            max: None,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            remove_duplicates: false,
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_capacity == 0 {
            return Err(ConfigError::InvalidWindowCapacity);
        }
        if self.max == Some(0) {
            return Err(ConfigError::InvalidLimit);
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

/// Lifecycle of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoaderState {
    Idle = 0,
    Loading = 1,
    Processing = 2,
    Complete = 8,
    Cancelled = 0xFE,
    Error = 0xFF,
}

impl LoaderState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoaderState::Idle,
            1 => LoaderState::Loading,
            2 => LoaderState::Processing,
            8 => LoaderState::Complete,
            0xFE => LoaderState::Cancelled,
            _ => LoaderState::Error,
        }
    }

    /// No further transitions will happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoaderState::Complete | LoaderState::Cancelled | LoaderState::Error
        )
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoaderState::Idle => "IDLE",
            LoaderState::Loading => "LOADING",
            LoaderState::Processing => "PROCESSING",
            LoaderState::Complete => "COMPLETE",
            LoaderState::Cancelled => "CANCELLED",
            LoaderState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    running: AtomicBool,
    data: Mutex<Option<Arc<SkiData>>>,
}

/// Cloneable handle onto a loader's state, usable from any thread.
#[derive(Debug, Clone)]
pub struct LoaderControl {
    shared: Arc<Shared>,
}

impl LoaderControl {
    fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(LoaderState::Idle as u8),
                running: AtomicBool::new(true),
                data: Mutex::new(None),
            }),
        }
    }

    /// Ask the loader to stop at its next check. A finished load keeps its state.
    pub fn cancel(&self) {
        // Cancelled is visible before the flag drops
        let _ = self
            .shared
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |raw| {
                match LoaderState::from_u8(raw) {
                    LoaderState::Complete | LoaderState::Error => None,
                    _ => Some(LoaderState::Cancelled as u8),
                }
            });
        self.shared.running.store(false, Ordering::SeqCst);
    }

    pub fn state(&self) -> LoaderState {
        LoaderState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The sealed session, only once the load is complete.
    pub fn data(&self) -> Option<Arc<SkiData>> {
        if self.state() != LoaderState::Complete {
            return None;
        }
        self.partial_data()
    }

    /// Whatever was sealed at the end of processing, including after a
    /// cancel or fault.
    pub fn partial_data(&self) -> Option<Arc<SkiData>> {
        self.shared
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn transition(&self, from: LoaderState, to: LoaderState) -> bool {
        self.shared
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn fail(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.state.store(LoaderState::Error as u8, Ordering::SeqCst);
    }

    fn store_data(&self, data: SkiData) {
        *self.shared.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(data));
    }
}

// ============================================================================
// Listener
// ============================================================================

/// Progress callbacks. Every method defaults to doing nothing.
pub trait DataLoaderListener: Send {
    /// The run was cancelled.
    fn aborted(&mut self) {}

    /// Processing finished with `total` elements.
    fn completed(&mut self, _total: usize) {}

    /// Loading finished without reading a record.
    fn empty_data(&mut self) {}

    /// The run failed.
    fn error(&mut self, _error: &LoadError) {}

    /// Loading finished with `count` records.
    fn loading_complete(&mut self, _count: usize) {}

    /// Element `count` of `total` was classified.
    fn processed_element(&mut self, _count: usize, _total: usize) {}
}

struct NoopListener;

impl DataLoaderListener for NoopListener {}

/// Reports progress through the `log` facade.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    interval: usize,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self { interval: 200 }
    }

    /// Log every `interval` processed elements.
    pub fn with_interval(interval: usize) -> Self {
        Self { interval: interval.max(1) }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoaderListener for LoggingListener {
    fn aborted(&mut self) {
        warn!("[DataLoader] Aborted");
    }

    fn completed(&mut self, total: usize) {
        info!("[DataLoader] Completed: {} elements", total);
    }

    fn empty_data(&mut self) {
        warn!("[DataLoader] No records loaded");
    }

    fn error(&mut self, error: &LoadError) {
        error!("[DataLoader] {}", error);
    }

    fn loading_complete(&mut self, count: usize) {
        info!("[DataLoader] Loaded {} records", count);
    }

    fn processed_element(&mut self, count: usize, total: usize) {
        if count % self.interval == 0 || count == total {
            info!("[DataLoader] Processed {}/{}", count, total);
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Single-use pipeline from a [`DataParser`] to a sealed [`SkiData`].
pub struct DataLoader {
    parser: Box<dyn DataParser + Send>,
    processor: Box<dyn Processor + Send>,
    listener: Box<dyn DataLoaderListener>,
    config: LoaderConfig,
    control: LoaderControl,
}

impl DataLoader {
    /// Create a loader with no listener.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid.
    pub fn new<P, C>(parser: P, processor: C, config: LoaderConfig) -> Result<Self, ConfigError>
    where
        P: DataParser + Send + 'static,
        C: Processor + Send + 'static,
    {
        Self::builder()
            .parser(parser)
            .processor(processor)
            .config(config)
            .build()
    }

    pub fn builder() -> DataLoaderBuilder {
        DataLoaderBuilder::default()
    }

    pub fn set_listener<L: DataLoaderListener + 'static>(&mut self, listener: L) {
        self.listener = Box::new(listener);
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// A handle for cancelling or polling the load from another thread.
    pub fn control(&self) -> LoaderControl {
        self.control.clone()
    }

    pub fn state(&self) -> LoaderState {
        self.control.state()
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// The sealed session once the load is complete.
    pub fn get_data(&self) -> Option<Arc<SkiData>> {
        self.control.data()
    }

    /// Data sealed after a cancel or fault.
    pub fn partial_data(&self) -> Option<Arc<SkiData>> {
        self.control.partial_data()
    }

    /// Run the pipeline on the current thread and return the final state.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] if the input fails while loading and
    /// [`LoadError::Fault`] if processing panics. The listener's `error`
    /// callback sees the same error first.
    pub fn run(&mut self) -> Result<LoaderState, LoadError> {
        if !self.control.transition(LoaderState::Idle, LoaderState::Loading) {
            let state = self.control.state();
            if state == LoaderState::Cancelled {
                info!("[DataLoader] Cancelled before start");
                self.listener.aborted();
                self.listener.loading_complete(0);
            } else {
                warn!("[DataLoader] Already run, state {}", state);
            }
            return Ok(state);
        }

        let mut data = match self.load() {
            Ok(data) => data,
            Err(e) => return Err(self.fail(LoadError::Io(e))),
        };

        let cancelled = !self.control.is_running();
        if cancelled {
            self.listener.aborted();
        } else if data.is_empty() {
            self.listener.empty_data();
        }
        self.listener.loading_complete(data.len());
        if cancelled {
            info!("[DataLoader] Cancelled while loading");
            return Ok(LoaderState::Cancelled);
        }

        let loaded = data.len();
        let total = interpolate(&mut data, self.config.remove_duplicates);
        if total != loaded {
            info!("[DataLoader] Interpolated {} records to {}", loaded, total);
        }
        if !self.control.transition(LoaderState::Loading, LoaderState::Processing) {
            self.listener.aborted();
            return Ok(LoaderState::Cancelled);
        }

        let mut ski = SkiData::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(data, total, &mut ski)));
        ski.close_all();
        self.control.store_data(ski);

        if let Err(payload) = outcome {
            return Err(self.fail(LoadError::Fault(panic_message(payload.as_ref()))));
        }

        if !self.control.is_running()
            || !self.control.transition(LoaderState::Processing, LoaderState::Complete)
        {
            info!("[DataLoader] Cancelled while processing");
            self.listener.aborted();
            return Ok(LoaderState::Cancelled);
        }

        info!("[DataLoader] Complete: {} elements", total);
        self.listener.completed(total);
        Ok(LoaderState::Complete)
    }

    fn load(&mut self) -> io::Result<Vec<Datum>> {
        for skipped in 0..self.config.start {
            if !self.parser.skip()? {
                debug!("[DataLoader] Input ended after skipping {} records", skipped);
                return Ok(Vec::new());
            }
        }

        let mut data = Vec::new();
        while self.control.is_running() && self.config.max.map_or(true, |max| data.len() < max) {
            match self.parser.read_next()? {
                Some(datum) => data.push(datum),
                None => break,
            }
        }
        debug!("[DataLoader] Read {} records", data.len());
        Ok(data)
    }

    fn process(&mut self, data: Vec<Datum>, total: usize, ski: &mut SkiData) {
        let mut window = ElemWindow::new(data, self.config.window_capacity);
        let mut mode = Mode::default();
        let mut count = 0;

        while let Some(element) = window.front().copied() {
            if !self.control.is_running() {
                break;
            }
            mode = self.processor.process_element(mode, &element, &window);
            window.next();
            ski.add_element(element.classify(mode));
            count += 1;
            self.listener.processed_element(count, total);
        }
    }

    fn fail(&mut self, err: LoadError) -> LoadError {
        error!("[DataLoader] {}", err);
        self.control.fail();
        self.listener.error(&err);
        err
    }

    /// Run the pipeline on a dedicated worker thread.
    pub fn spawn(self) -> io::Result<LoadHandle> {
        let control = self.control();
        let thread = thread::Builder::new()
            .name("DataLoader".into())
            .spawn(move || {
                let mut loader = self;
                loader.run()
            })?;
        Ok(LoadHandle { control, thread })
    }

    /// Run on a worker, wait for it, and return the data if the load completed.
    pub fn load_data(self) -> Result<Option<Arc<SkiData>>, LoadError> {
        let handle = self.spawn()?;
        let control = handle.control();
        handle.join()?;
        Ok(control.data())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A loader running on its worker thread.
pub struct LoadHandle {
    control: LoaderControl,
    thread: JoinHandle<Result<LoaderState, LoadError>>,
}

impl LoadHandle {
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn state(&self) -> LoaderState {
        self.control.state()
    }

    pub fn control(&self) -> LoaderControl {
        self.control.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker and return its final state.
    pub fn join(self) -> Result<LoaderState, LoadError> {
        self.thread
            .join()
            .map_err(|payload| LoadError::Fault(panic_message(payload.as_ref())))?
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`DataLoader`]. A parser and a processor are required.
pub struct DataLoaderBuilder {
    parser: Option<Box<dyn DataParser + Send>>,
    processor: Option<Box<dyn Processor + Send>>,
    listener: Box<dyn DataLoaderListener>,
    config: LoaderConfig,
}

impl Default for DataLoaderBuilder {
    fn default() -> Self {
        Self {
            parser: None,
            processor: None,
            listener: Box::new(NoopListener),
            config: LoaderConfig::default(),
        }
    }
}

impl DataLoaderBuilder {
    pub fn parser<P: DataParser + Send + 'static>(mut self, parser: P) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn processor<C: Processor + Send + 'static>(mut self, processor: C) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    pub fn listener<L: DataLoaderListener + 'static>(mut self, listener: L) -> Self {
        self.listener = Box::new(listener);
        self
    }

    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn start(mut self, start: usize) -> Self {
        self.config.start = start;
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.config.max = Some(max);
        self
    }

    pub fn window_capacity(mut self, capacity: usize) -> Self {
        self.config.window_capacity = capacity;
        self
    }

    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.config.remove_duplicates = remove;
        self
    }

    pub fn build(self) -> Result<DataLoader, ConfigError> {
        let parser = self.parser.ok_or(ConfigError::MissingParser)?;
        let processor = self.processor.ok_or(ConfigError::MissingProcessor)?;
        self.config.validate()?;
        Ok(DataLoader {
            parser,
            processor,
            listener: self.listener,
            config: self.config,
            control: LoaderControl::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SkiModeClassifier;
    use crate::parser::{CsvConfig, CsvParser};
    use crate::track::MeasuredElement;
    use crate::window::ElemWindow;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Aborted,
        Completed(usize),
        EmptyData,
        Error,
        LoadingComplete(usize),
        Processed(usize, usize),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<Event>>>,
        cancel_at: Option<(usize, LoaderControl)>,
    }

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        /// Events other than per-element progress.
        fn milestones(&self) -> Vec<Event> {
            self.events()
                .into_iter()
                .filter(|e| !matches!(e, Event::Processed(..)))
                .collect()
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl DataLoaderListener for Recorder {
        fn aborted(&mut self) {
            self.push(Event::Aborted);
        }
        fn completed(&mut self, total: usize) {
            self.push(Event::Completed(total));
        }
        fn empty_data(&mut self) {
            self.push(Event::EmptyData);
        }
        fn error(&mut self, _error: &LoadError) {
            self.push(Event::Error);
        }
        fn loading_complete(&mut self, count: usize) {
            self.push(Event::LoadingComplete(count));
        }
        fn processed_element(&mut self, count: usize, total: usize) {
            self.push(Event::Processed(count, total));
            if let Some((at, control)) = &self.cancel_at {
                if count == *at {
                    control.cancel();
                }
            }
        }
    }

    /// In-memory parser that can fail, or cancel its loader, after a
    /// number of records.
    struct VecParser {
        records: VecDeque<Datum>,
        fail_after: Option<usize>,
        cancel_after: Option<(usize, Arc<OnceLock<LoaderControl>>)>,
        read: usize,
    }

    impl VecParser {
        fn new(records: Vec<Datum>) -> Self {
            Self { records: records.into(), fail_after: None, cancel_after: None, read: 0 }
        }

        fn failing_after(records: Vec<Datum>, n: usize) -> Self {
            Self { fail_after: Some(n), ..Self::new(records) }
        }

        fn cancelling_after(records: Vec<Datum>, n: usize, control: Arc<OnceLock<LoaderControl>>) -> Self {
            Self { cancel_after: Some((n, control)), ..Self::new(records) }
        }
    }

    impl DataParser for VecParser {
        fn read_next(&mut self) -> io::Result<Option<Datum>> {
            if self.fail_after == Some(self.read) {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated log"));
            }
            self.read += 1;
            let datum = self.records.pop_front();
            if let Some((n, control)) = &self.cancel_after {
                if self.read == *n {
                    if let Some(control) = control.get() {
                        control.cancel();
                    }
                }
            }
            Ok(datum)
        }

        fn skip(&mut self) -> io::Result<bool> {
            Ok(self.records.pop_front().is_some())
        }
    }

    /// Panics when asked to classify the element at `time`.
    struct FaultyProcessor {
        time: i64,
    }

    impl Processor for FaultyProcessor {
        fn process_element(&self, current: Mode, element: &MeasuredElement, _window: &ElemWindow) -> Mode {
            if element.time() == self.time {
                panic!("sensor glitch at {}", self.time);
            }
            current
        }
    }

    /// 25 stationary samples followed by 25 climbing ones.
    fn stop_then_climb() -> Vec<Datum> {
        (0..50)
            .map(|i| {
                let k = (i - 24).max(0) as i32;
                Datum::new(i, 45.9, 6.8, 340_000 + 3 * k, 5_084_000, 2000 + 2 * k, 10.0)
            })
            .collect()
    }

    fn steady(n: i64) -> Vec<Datum> {
        (0..n)
            .map(|i| Datum::new(i, 45.9, 6.8, 340_000 + i as i32, 5_084_000, 2000, 3.0))
            .collect()
    }

    fn loader(parser: impl DataParser + Send + 'static, recorder: &Recorder) -> DataLoader {
        DataLoader::builder()
            .parser(parser)
            .processor(SkiModeClassifier)
            .listener(recorder.clone())
            .build()
            .unwrap()
    }

    const TWO_RECORDS: &str = "\
# id,date,time,-,-,-,lat,long,alt,speed,x,y
1,15-01-2024,09:30:00,,,,45.9,6.8,2100,0.0,340000,5084000
2,15-01-2024,09:30:01,,,,45.9,6.8,2100,0.0,340000,5084000
";

    #[test]
    fn test_csv_two_records() {
        let recorder = Recorder::default();
        let mut loader = loader(CsvParser::new(Cursor::new(TWO_RECORDS)), &recorder);

        assert_eq!(loader.run().unwrap(), LoaderState::Complete);
        assert_eq!(
            recorder.events(),
            vec![
                Event::LoadingComplete(2),
                Event::Processed(1, 2),
                Event::Processed(2, 2),
                Event::Completed(2),
            ]
        );
        let data = loader.get_data().unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.is_sealed());
    }

    #[test]
    fn test_csv_gap_is_interpolated() {
        let log = "\
1,15-01-2024,09:30:00,,,,45.9,6.8,2100,0.0,340000,5084000
2,15-01-2024,09:30:05,,,,45.9,6.8,2100,0.0,340000,5084000
";
        let recorder = Recorder::default();
        let mut loader = loader(CsvParser::new(Cursor::new(log)), &recorder);
        loader.run().unwrap();

        assert_eq!(
            recorder.milestones(),
            vec![Event::LoadingComplete(2), Event::Completed(6)]
        );
        let data = loader.get_data().unwrap();
        let times: Vec<i64> = data.all_elements().iter().map(|e| e.time()).collect();
        let start = times[0];
        assert_eq!(times, (start..start + 6).collect::<Vec<_>>());
    }

    #[test]
    fn test_undecodable_csv_line_does_not_abort() {
        let mut log = Vec::new();
        log.extend_from_slice(b"1,15-01-2024,09:30:00,,,,45.9,6.8,2100,0.0,340000,5084000\n");
        log.extend_from_slice(b"2,15-01-2024,09:30:01,,,,45.9,6.8,\xff\xfe,0.0,340000,5084000\n");
        log.extend_from_slice(b"3,15-01-2024,09:30:02,,,,45.9,6.8,2100,0.0,340000,5084000\n");
        let parser = CsvParser::with_config(Cursor::new(log), CsvConfig::default().with_bad_file(None));

        let recorder = Recorder::default();
        let mut loader = loader(parser, &recorder);
        assert_eq!(loader.run().unwrap(), LoaderState::Complete);
        // Two records survive; the gap left by the bad line is filled
        assert_eq!(
            recorder.milestones(),
            vec![Event::LoadingComplete(2), Event::Completed(3)]
        );
    }

    #[test]
    fn test_stationary_then_climbing_becomes_lift() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::new(stop_then_climb()), &recorder);
        assert_eq!(loader.run().unwrap(), LoaderState::Complete);

        let data = loader.get_data().unwrap();
        let modes: Vec<Mode> = data.all_elements().iter().map(|e| e.mode()).collect();
        assert_eq!(modes[0], Mode::Stop);
        assert!(modes[..24].iter().all(|&m| m == Mode::Stop));
        assert_eq!(modes[24], Mode::Lift);
        assert!(!modes.contains(&Mode::Ski));
        assert!(data.elements_in(Mode::Ski).is_none());
        assert_eq!(data.elements_in(Mode::Lift).unwrap().len(), 25);
    }

    #[test]
    fn test_cancel_before_run() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::new(steady(10)), &recorder);
        let control = loader.control();
        control.cancel();

        assert_eq!(loader.run().unwrap(), LoaderState::Cancelled);
        assert_eq!(recorder.events(), vec![Event::Aborted, Event::LoadingComplete(0)]);
        assert!(loader.get_data().is_none());
        assert!(loader.partial_data().is_none());
    }

    #[test]
    fn test_cancel_while_loading() {
        let slot = Arc::new(OnceLock::new());
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::cancelling_after(steady(20), 7, slot.clone()), &recorder);
        slot.set(loader.control()).unwrap();

        assert_eq!(loader.run().unwrap(), LoaderState::Cancelled);
        assert_eq!(recorder.events(), vec![Event::Aborted, Event::LoadingComplete(7)]);
        assert_eq!(loader.state(), LoaderState::Cancelled);
        assert!(loader.get_data().is_none());
        assert!(loader.partial_data().is_none());
    }

    #[test]
    fn test_cancel_marks_state_before_flag() {
        let recorder = Recorder::default();
        let loader = loader(VecParser::new(steady(3)), &recorder);
        let control = loader.control();
        control.cancel();
        assert!(!control.is_running());
        assert_eq!(control.state(), LoaderState::Cancelled);
    }

    #[test]
    fn test_cancel_while_processing_keeps_partial_data() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::new(steady(40)), &recorder);
        let cancelling = Recorder {
            cancel_at: Some((5, loader.control())),
            ..recorder.clone()
        };
        loader.set_listener(cancelling);

        assert_eq!(loader.run().unwrap(), LoaderState::Cancelled);
        assert_eq!(
            recorder.milestones(),
            vec![Event::LoadingComplete(40), Event::Aborted]
        );
        assert!(loader.get_data().is_none());
        let partial = loader.partial_data().unwrap();
        assert_eq!(partial.len(), 5);
        assert!(partial.is_sealed());
    }

    #[test]
    fn test_start_and_max() {
        let recorder = Recorder::default();
        let mut loader = DataLoader::builder()
            .parser(VecParser::new(steady(10)))
            .processor(SkiModeClassifier)
            .listener(recorder.clone())
            .start(2)
            .max(5)
            .build()
            .unwrap();
        loader.run().unwrap();

        assert_eq!(
            recorder.milestones(),
            vec![Event::LoadingComplete(5), Event::Completed(5)]
        );
        let data = loader.get_data().unwrap();
        assert_eq!(data.all_elements().first().unwrap().time(), 2);
        assert_eq!(data.all_elements().last().unwrap().time(), 6);
    }

    #[test]
    fn test_start_past_end_is_empty() {
        let recorder = Recorder::default();
        let mut loader = DataLoader::builder()
            .parser(VecParser::new(steady(3)))
            .processor(SkiModeClassifier)
            .listener(recorder.clone())
            .start(10)
            .build()
            .unwrap();
        assert_eq!(loader.run().unwrap(), LoaderState::Complete);
        assert_eq!(
            recorder.events(),
            vec![Event::EmptyData, Event::LoadingComplete(0), Event::Completed(0)]
        );
    }

    #[test]
    fn test_empty_input_completes() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::new(vec![]), &recorder);
        assert_eq!(loader.run().unwrap(), LoaderState::Complete);
        assert_eq!(
            recorder.events(),
            vec![Event::EmptyData, Event::LoadingComplete(0), Event::Completed(0)]
        );
        assert!(loader.get_data().unwrap().is_empty());
    }

    #[test]
    fn test_io_error_is_fatal() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::failing_after(steady(10), 3), &recorder);

        let err = loader.run().unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
        assert_eq!(recorder.events(), vec![Event::Error]);
        assert_eq!(loader.state(), LoaderState::Error);
        assert!(loader.partial_data().is_none());
    }

    #[test]
    fn test_processing_fault_keeps_partial_data() {
        let recorder = Recorder::default();
        let mut loader = DataLoader::builder()
            .parser(VecParser::new(steady(10)))
            .processor(FaultyProcessor { time: 4 })
            .listener(recorder.clone())
            .build()
            .unwrap();

        match loader.run() {
            Err(LoadError::Fault(msg)) => assert!(msg.contains("sensor glitch")),
            other => panic!("expected fault, got {:?}", other),
        }
        assert_eq!(loader.state(), LoaderState::Error);
        assert_eq!(recorder.milestones().last(), Some(&Event::Error));
        assert!(loader.get_data().is_none());

        let partial = loader.partial_data().unwrap();
        assert_eq!(partial.len(), 4);
        assert!(partial.is_sealed());
    }

    #[test]
    fn test_cancel_after_complete_keeps_state() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::new(steady(3)), &recorder);
        loader.run().unwrap();
        loader.cancel();
        assert_eq!(loader.state(), LoaderState::Complete);
        assert!(loader.get_data().is_some());
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let recorder = Recorder::default();
        let mut loader = loader(VecParser::new(steady(3)), &recorder);
        loader.run().unwrap();
        assert_eq!(loader.run().unwrap(), LoaderState::Complete);
        assert_eq!(recorder.milestones(), vec![Event::LoadingComplete(3), Event::Completed(3)]);
    }

    #[test]
    fn test_load_data_on_worker() {
        let loader = DataLoader::new(
            VecParser::new(stop_then_climb()),
            SkiModeClassifier,
            LoaderConfig::default(),
        )
        .unwrap();
        let data = loader.load_data().unwrap().unwrap();
        assert_eq!(data.len(), 50);
    }

    #[test]
    fn test_spawn_and_join() {
        let recorder = Recorder::default();
        let handle = loader(VecParser::new(steady(30)), &recorder).spawn().unwrap();
        let control = handle.control();
        assert_eq!(handle.join().unwrap(), LoaderState::Complete);
        assert_eq!(control.state(), LoaderState::Complete);
        assert_eq!(control.data().unwrap().len(), 30);
    }

    #[test]
    fn test_builder_validation() {
        assert_eq!(
            DataLoader::builder().processor(SkiModeClassifier).build().err(),
            Some(ConfigError::MissingParser)
        );
        assert_eq!(
            DataLoader::builder().parser(VecParser::new(vec![])).build().err(),
            Some(ConfigError::MissingProcessor)
        );
        let zero_window = DataLoader::builder()
            .parser(VecParser::new(vec![]))
            .processor(SkiModeClassifier)
            .window_capacity(0)
            .build();
        assert_eq!(zero_window.err(), Some(ConfigError::InvalidWindowCapacity));
        let zero_max = DataLoader::builder()
            .parser(VecParser::new(vec![]))
            .processor(SkiModeClassifier)
            .max(0)
            .build();
        assert_eq!(zero_max.err(), Some(ConfigError::InvalidLimit));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(LoaderState::Complete.to_string(), "COMPLETE");
        assert!(LoaderState::Cancelled.is_terminal());
        assert!(!LoaderState::Processing.is_terminal());
    }
}
