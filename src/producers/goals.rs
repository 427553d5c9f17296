use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::GoalsConfig;
use crate::element::{FieldElement, TextBuffer};
use crate::error::Result;
use crate::field::ReceptiveField;
use crate::logging::{LogLevel, Logger, json_kv, json_str};
use crate::placement::Placement;

const GOALS_TARGET: &str = "field::goals";

#[derive(Debug, Error)]
pub enum GoalsError {
    #[error("failed to read goals from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write goals to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed goals document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no goal #{num}; the list has {len}")]
    NoSuchGoal { num: usize, len: usize },
}

#[derive(Debug, Serialize, Deserialize)]
struct GoalRecord {
    #[serde(rename = "goal-text")]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GoalsDocument {
    #[serde(rename = "goal-list")]
    goals: Vec<GoalRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub num: usize,
    pub text: String,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.\t{}", self.num, self.text)
    }
}

/// Ordered goal list, numbered from 1. Every edit renumbers so numbers
/// always match positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalList {
    goals: Vec<Goal>,
}

impl GoalList {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self {
            goals: texts
                .into_iter()
                .map(|text| Goal {
                    num: 0,
                    text: text.into(),
                })
                .collect(),
        };
        list.renumber();
        list
    }

    /// Parse a `{"goal-list": [{"goal-text": ...}, ...]}` document.
    pub fn from_json_str(raw: &str) -> std::result::Result<Self, GoalsError> {
        let doc: GoalsDocument = serde_json::from_str(raw)?;
        Ok(Self::from_texts(doc.goals.into_iter().map(|g| g.text)))
    }

    pub fn load(path: impl AsRef<Path>) -> std::result::Result<Self, GoalsError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| GoalsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_string(&self) -> std::result::Result<String, GoalsError> {
        let doc = GoalsDocument {
            goals: self
                .goals
                .iter()
                .map(|g| GoalRecord {
                    text: g.text.clone(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::result::Result<(), GoalsError> {
        let path = path.as_ref();
        let raw = self.to_json_string()?;
        fs::write(path, raw).map_err(|source| GoalsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn get(&self, num: usize) -> Option<&Goal> {
        num.checked_sub(1).and_then(|i| self.goals.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter()
    }

    /// Tab-indented listing with a blank line after each goal.
    pub fn display(&self) -> String {
        self.goals
            .iter()
            .map(|goal| format!("\t{goal}\n\n"))
            .collect()
    }

    /// Append a goal and return its number.
    pub fn add(&mut self, text: impl Into<String>) -> usize {
        self.goals.push(Goal {
            num: self.goals.len() + 1,
            text: text.into(),
        });
        self.goals.len()
    }

    pub fn change(
        &mut self,
        num: usize,
        text: impl Into<String>,
    ) -> std::result::Result<(), GoalsError> {
        let idx = self.index(num)?;
        self.goals[idx].text = text.into();
        Ok(())
    }

    pub fn delete(&mut self, num: usize) -> std::result::Result<Goal, GoalsError> {
        let idx = self.index(num)?;
        let removed = self.goals.remove(idx);
        self.renumber();
        Ok(removed)
    }

    /// Insert so the new goal becomes `#num`; `len + 1` appends.
    pub fn insert(
        &mut self,
        num: usize,
        text: impl Into<String>,
    ) -> std::result::Result<(), GoalsError> {
        if num == 0 || num > self.goals.len() + 1 {
            return Err(self.no_such(num));
        }
        self.goals.insert(
            num - 1,
            Goal {
                num,
                text: text.into(),
            },
        );
        self.renumber();
        Ok(())
    }

    /// Move goal `#from` so it ends up as `#to`.
    pub fn move_goal(&mut self, from: usize, to: usize) -> std::result::Result<(), GoalsError> {
        let src = self.index(from)?;
        let dst = self.index(to)?;
        let goal = self.goals.remove(src);
        self.goals.insert(dst, goal);
        self.renumber();
        Ok(())
    }

    fn index(&self, num: usize) -> std::result::Result<usize, GoalsError> {
        if num == 0 || num > self.goals.len() {
            return Err(self.no_such(num));
        }
        Ok(num - 1)
    }

    fn no_such(&self, num: usize) -> GoalsError {
        GoalsError::NoSuchGoal {
            num,
            len: self.goals.len(),
        }
    }

    fn renumber(&mut self) {
        for (i, goal) in self.goals.iter_mut().enumerate() {
            goal.num = i + 1;
        }
    }
}

/// Load the primary goals file, falling back to the seed file when the
/// primary is missing or unreadable.
pub fn load_goals(
    config: &GoalsConfig,
    logger: Option<&Logger>,
) -> std::result::Result<GoalList, GoalsError> {
    let primary = config.primary_path();
    match GoalList::load(&primary) {
        Ok(list) => Ok(list),
        Err(err) => {
            let fallback = config.fallback_path();
            if let Some(logger) = logger {
                logger.emit(
                    LogLevel::Warn,
                    GOALS_TARGET,
                    "goals_fallback",
                    [
                        json_str("path", primary.display().to_string()),
                        json_str("fallback", fallback.display().to_string()),
                        json_str("error", err.to_string()),
                    ],
                );
            }
            GoalList::load(&fallback)
        }
    }
}

/// Window listing the current goals. Edits go through [`GoalsWindow::edit`]
/// so the shown text never drifts from the list.
pub struct GoalsWindow {
    goals: Mutex<GoalList>,
    buffer: Arc<TextBuffer>,
    element: FieldElement,
    logger: Option<Logger>,
}

impl GoalsWindow {
    pub fn open(
        field: &ReceptiveField,
        config: &GoalsConfig,
        logger: Option<Logger>,
    ) -> Result<Self> {
        let goals = load_goals(config, logger.as_ref())?;
        Self::with_goals(field, config.placement, goals, logger)
    }

    pub fn with_goals(
        field: &ReceptiveField,
        placement: Placement,
        goals: GoalList,
        logger: Option<Logger>,
    ) -> Result<Self> {
        let buffer = Arc::new(TextBuffer::with_text(&goals.display()));
        let element = FieldElement::from_arc(placement, buffer.clone(), Some(field))?;
        if let Some(logger) = logger.as_ref() {
            logger.emit(
                LogLevel::Info,
                GOALS_TARGET,
                "goals_loaded",
                [json_kv("count", json!(goals.len()))],
            );
        }
        Ok(Self {
            goals: Mutex::new(goals),
            buffer,
            element,
            logger,
        })
    }

    /// Apply an edit to the goal list and redraw the window. A failed edit
    /// leaves both the list and the window untouched.
    pub fn edit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut GoalList) -> std::result::Result<T, GoalsError>,
    {
        let (out, text, count) = {
            let mut goals = self.goals.lock().unwrap_or_else(PoisonError::into_inner);
            let mut draft = goals.clone();
            let out = f(&mut draft)?;
            *goals = draft;
            (out, goals.display(), goals.len())
        };
        self.buffer.set_text(&text);
        self.element.refresh();
        if let Some(logger) = self.logger.as_ref() {
            logger.emit(
                LogLevel::Debug,
                GOALS_TARGET,
                "goals_edited",
                [json_kv("count", json!(count))],
            );
        }
        Ok(out)
    }

    pub fn goals(&self) -> GoalList {
        self.goals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.goals().save(path)?;
        Ok(())
    }

    pub fn element(&self) -> &FieldElement {
        &self.element
    }
}
