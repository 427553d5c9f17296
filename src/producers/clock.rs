use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone};
use serde_json::json;

use crate::config::{ClockConfig, ClockMode};
use crate::element::{FieldElement, TextBuffer};
use crate::error::Result;
use crate::field::ReceptiveField;
use crate::logging::{LogLevel, Logger, json_kv, json_str};

const CLOCK_TARGET: &str = "field::clock";
const MINUTES_FORMAT: &str = "%A, %B %d, %Y, %I:%M %p";
const SECONDS_FORMAT: &str = "%A, %B %d, %Y, %I:%M:%S %p";

/// Render `time` the way the clock window shows it, e.g.
/// `Sunday, January 17, 2021, 12:02 PM (UTC-07:00)`.
pub fn format_time(mode: ClockMode, time: &DateTime<FixedOffset>) -> String {
    let fmt = match mode {
        ClockMode::Minutes => MINUTES_FORMAT,
        ClockMode::Seconds => SECONDS_FORMAT,
    };
    format!("{} (UTC{})", time.format(fmt), time.format("%:z"))
}

fn interval_ms(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct ClockState {
    last_time: Option<DateTime<FixedOffset>>,
    time_str: Option<String>,
}

struct ClockShared {
    mode: ClockMode,
    state: Mutex<ClockState>,
    buffer: Arc<TextBuffer>,
    element: FieldElement,
    running: AtomicBool,
    logger: Option<Logger>,
}

impl ClockShared {
    fn record(&self, now: DateTime<FixedOffset>) -> bool {
        let rendered = format_time(self.mode, &now);
        let changed = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.last_time = Some(now);
            if state.time_str.as_deref() == Some(rendered.as_str()) {
                false
            } else {
                state.time_str = Some(rendered.clone());
                true
            }
        };

        if changed {
            self.buffer.set_text(&format!("The time is:  {rendered}"));
            self.element.refresh();
            if let Some(logger) = self.logger.as_ref() {
                logger.emit(
                    LogLevel::Trace,
                    CLOCK_TARGET,
                    "clock_updated",
                    [json_str("time", rendered)],
                );
            }
        }
        changed
    }
}

/// Clock window that keeps the current time on the field, driven by its own
/// ticker thread.
pub struct ClockProducer {
    shared: Arc<ClockShared>,
    interval: Duration,
    worker: Option<JoinHandle<()>>,
}

impl ClockProducer {
    /// Create the clock window and show the current time. The ticker is not
    /// running until [`ClockProducer::start`].
    pub fn new(
        field: &ReceptiveField,
        config: &ClockConfig,
        logger: Option<Logger>,
    ) -> Result<Self> {
        let buffer = Arc::new(TextBuffer::new());
        let element = FieldElement::from_arc(config.placement, buffer.clone(), Some(field))?;
        let producer = Self {
            shared: Arc::new(ClockShared {
                mode: config.mode,
                state: Mutex::new(ClockState::default()),
                buffer,
                element,
                running: AtomicBool::new(false),
                logger,
            }),
            interval: config.interval(),
            worker: None,
        };
        producer.tick();
        Ok(producer)
    }

    /// Record the current local time. Returns true when the display changed.
    pub fn tick(&self) -> bool {
        self.tick_at(Local::now())
    }

    pub fn tick_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> bool {
        let fixed = now.with_timezone(&now.offset().fix());
        self.shared.record(fixed)
    }

    pub fn time_string(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .time_str
            .clone()
    }

    pub fn last_time(&self) -> Option<DateTime<FixedOffset>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_time
    }

    pub fn element(&self) -> &FieldElement {
        &self.shared.element
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("field-clock".to_string())
            .spawn(move || {
                while shared.running.load(Ordering::SeqCst) {
                    thread::park_timeout(interval);
                    if !shared.running.load(Ordering::SeqCst) {
                        break;
                    }
                    let now = Local::now();
                    shared.record(now.with_timezone(&now.offset().fix()));
                }
            })?;
        self.worker = Some(handle);
        if let Some(logger) = self.shared.logger.as_ref() {
            logger.emit(
                LogLevel::Debug,
                CLOCK_TARGET,
                "clock_started",
                [json_kv("interval_ms", json!(interval_ms(interval)))],
            );
        }
        Ok(())
    }

    /// Stop the ticker and wait for it to exit.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        handle.thread().unpark();
        let _ = handle.join();
        if let Some(logger) = self.shared.logger.as_ref() {
            let _ = logger.log(LogLevel::Debug, CLOCK_TARGET, "clock_stopped");
        }
    }
}

impl Drop for ClockProducer {
    fn drop(&mut self) {
        self.stop();
    }
}
