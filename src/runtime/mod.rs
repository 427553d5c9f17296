//! Owner of one field and the fixed elements around it.
//!
//! Everything is built explicitly in [`FieldRuntime::new`] and handed to
//! whoever needs it; there is no process-wide state.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;

use crate::config::FieldConfig;
use crate::element::{Banner, FieldElement, TextBuffer};
use crate::error::Result;
use crate::field::ReceptiveField;
use crate::logging::{FileSink, LogLevel, Logger, json_kv, json_str};
use crate::metrics::MetricSnapshot;
use crate::placement::Placement;
use crate::producers::{ClockProducer, GoalsWindow};
use crate::render::TerminalPresenter;

const RUNTIME_TARGET: &str = "field::runtime";

pub struct FieldRuntime {
    config: FieldConfig,
    logger: Option<Logger>,
    field: ReceptiveField,
    presenter: TerminalPresenter,
    header: FieldElement,
    separator: FieldElement,
    input: Arc<TextBuffer>,
    prompt: FieldElement,
    clock: Option<ClockProducer>,
    goals: Option<GoalsWindow>,
}

impl FieldRuntime {
    /// Build the logger, the field, and the header, prompt and separator, in
    /// that order.
    pub fn new(config: FieldConfig) -> Result<Self> {
        config.validate()?;
        let logger = build_logger(&config)?;

        let mut builder = ReceptiveField::builder();
        if let Some(rows) = config.viewport_rows {
            builder = builder.viewport_rows(rows);
        }
        if let Some(logger) = logger.as_ref() {
            builder = builder.logger(logger.clone());
        }
        let field = builder.build();

        let width = config.nominal_width;
        let header = FieldElement::text(
            Placement::PinnedTop,
            Banner::header(&config.header.text, width, config.header.fill),
            Some(&field),
        )?;
        let input = Arc::new(TextBuffer::with_text(&config.prompt));
        let prompt = FieldElement::from_arc(Placement::PinnedBottom, input.clone(), Some(&field))?;
        let separator = FieldElement::text(
            Placement::AnchoredBottom,
            Banner::separator(&config.separator.text, width, config.separator.fill),
            Some(&field),
        )?;

        if let Some(logger) = logger.as_ref() {
            logger.emit(
                LogLevel::Info,
                RUNTIME_TARGET,
                "runtime_started",
                [
                    json_kv("viewport_rows", json!(config.viewport_rows)),
                    json_kv("nominal_width", json!(width)),
                ],
            );
        }

        Ok(Self {
            config,
            logger,
            field,
            presenter: TerminalPresenter::with_default(),
            header,
            separator,
            input,
            prompt,
            clock: None,
            goals: None,
        })
    }

    pub fn field(&self) -> &ReceptiveField {
        &self.field
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn presenter_mut(&mut self) -> &mut TerminalPresenter {
        &mut self.presenter
    }

    pub fn header(&self) -> &FieldElement {
        &self.header
    }

    pub fn separator(&self) -> &FieldElement {
        &self.separator
    }

    pub fn prompt(&self) -> &FieldElement {
        &self.prompt
    }

    pub fn clock(&self) -> Option<&ClockProducer> {
        self.clock.as_ref()
    }

    pub fn goals(&self) -> Option<&GoalsWindow> {
        self.goals.as_ref()
    }

    /// Show `text` after the prompt in the input area.
    pub fn set_input(&self, text: &str) {
        self.input.set_text(&format!("{}{}", self.config.prompt, text));
        self.prompt.refresh();
    }

    /// Open the clock window and start its ticker. Does nothing when the
    /// clock is disabled or already running.
    pub fn start_clock(&mut self) -> Result<()> {
        if !self.config.clock.enabled || self.clock.is_some() {
            return Ok(());
        }
        let mut clock = ClockProducer::new(&self.field, &self.config.clock, self.logger.clone())?;
        clock.start()?;
        self.clock = Some(clock);
        Ok(())
    }

    /// Open the goals window. It anchors above the separator, which stays
    /// next to the prompt.
    pub fn open_goals(&mut self) -> Result<()> {
        if self.goals.is_some() {
            return Ok(());
        }
        let Some(goals_config) = self.config.goals.as_ref() else {
            self.log(LogLevel::Warn, "goals_not_configured");
            return Ok(());
        };
        let window = GoalsWindow::open(&self.field, goals_config, self.logger.clone())?;
        self.goals = Some(window);
        Ok(())
    }

    /// Write the field to `writer` if it changed since the last call.
    /// Returns whether anything was written.
    pub fn present(&mut self, writer: &mut impl Write) -> Result<bool> {
        let Some(frame) = self.field.render_if_dirty()? else {
            return Ok(false);
        };
        self.presenter.present(writer, &frame)?;
        if let Some(logger) = self.logger.as_ref() {
            logger.emit(
                LogLevel::Trace,
                RUNTIME_TARGET,
                "frame_presented",
                [
                    json_kv("generation", json!(frame.generation)),
                    json_kv("rows", json!(frame.rows)),
                    json_str("hash", frame.hash.to_hex().to_string()),
                ],
            );
        }
        Ok(true)
    }

    /// Stop producers, take every element off the field and report the
    /// final metrics.
    pub fn shutdown(mut self) -> MetricSnapshot {
        if let Some(mut clock) = self.clock.take() {
            clock.stop();
        }
        self.goals = None;
        let field = self.field.clone();
        let logger = self.logger.clone();
        drop(self);

        let snapshot = field.metrics();
        if let Some(logger) = logger.as_ref() {
            let _ = logger.log_event(snapshot.to_log_event(RUNTIME_TARGET));
            let _ = logger.log(LogLevel::Info, RUNTIME_TARGET, "runtime_stopped");
        }
        snapshot
    }

    fn log(&self, level: LogLevel, message: &str) {
        if let Some(logger) = self.logger.as_ref() {
            let _ = logger.log(level, RUNTIME_TARGET, message);
        }
    }
}

fn build_logger(config: &FieldConfig) -> Result<Option<Logger>> {
    let Some(path) = config.log.path.as_ref() else {
        return Ok(None);
    };
    let sink = FileSink::new(path, config.log.max_bytes)?;
    Ok(Some(Logger::new(sink).with_min_level(config.log.level)))
}
