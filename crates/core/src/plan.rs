//! Action plans and the canonical plan table (`plans.json`).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};
use crate::matcher::DEFAULT_CONFIDENCE;
use crate::templates::is_image_path;

pub const DEFAULT_WAIT_SECS: f64 = 1.0;
pub const DEFAULT_MAX_SCROLL_ATTEMPTS: u32 = 6;

/// Caller-supplied values for `{name}` placeholders.
pub type Params = HashMap<String, String>;

/// Replace every `{key}` with its value in one left-to-right pass. Inserted
/// values are not scanned again. Placeholders without a value stay as they
/// are; braces are never escaped.
pub fn substitute(text: &str, params: &Params) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let bound = after
            .find('}')
            .and_then(|close| params.get(&after[..close]).map(|value| (close, value)));
        match bound {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Entry of the named coordinate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateValue {
    Point([i32; 2]),
    Template(PathBuf),
}

/// How a click action names its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateRef {
    Point([i32; 2]),
    Named(String),
    /// Anything else; rejected when the step runs.
    Invalid(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    One(String),
    Many(Vec<String>),
}

impl Keywords {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Keywords::One(k) => vec![k.clone()],
            Keywords::Many(ks) => ks.clone(),
        }
    }
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

fn default_wait() -> f64 {
    DEFAULT_WAIT_SECS
}

fn default_max_scroll() -> u32 {
    DEFAULT_MAX_SCROLL_ATTEMPTS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarKeywordClick {
    pub keywords: Keywords,
    /// Empty means every template in the avatar directory.
    #[serde(default)]
    pub avatar_templates: Vec<PathBuf>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_max_scroll")]
    pub max_scroll_attempts: u32,
    #[serde(default)]
    pub return_coordinates: bool,
}

impl AvatarKeywordClick {
    pub fn new(keywords: Keywords) -> Self {
        Self {
            keywords,
            avatar_templates: Vec::new(),
            confidence: DEFAULT_CONFIDENCE,
            max_scroll_attempts: DEFAULT_MAX_SCROLL_ATTEMPTS,
            return_coordinates: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    Click {
        coordinate: CoordinateRef,
        #[serde(default = "default_confidence")]
        confidence: f32,
    },
    Wait {
        #[serde(default = "default_wait")]
        duration: f64,
    },
    OpenApp {
        app: String,
    },
    AvatarKeywordClick(AvatarKeywordClick),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, description: None }
    }

    pub fn click_named(name: &str) -> Self {
        Self::new(ActionKind::Click {
            coordinate: CoordinateRef::Named(name.into()),
            confidence: DEFAULT_CONFIDENCE,
        })
    }

    pub fn click_at(x: i32, y: i32) -> Self {
        Self::new(ActionKind::Click {
            coordinate: CoordinateRef::Point([x, y]),
            confidence: DEFAULT_CONFIDENCE,
        })
    }

    pub fn wait(duration: f64) -> Self {
        Self::new(ActionKind::Wait { duration })
    }

    pub fn open_app(app: &str) -> Self {
        Self::new(ActionKind::OpenApp { app: app.into() })
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("No description")
    }

    /// Copy with `{name}` placeholders in every string field replaced.
    pub fn instantiate(&self, params: &Params) -> Action {
        let s = |t: &str| substitute(t, params);
        let kind = match &self.kind {
            ActionKind::Click { coordinate, confidence } => ActionKind::Click {
                coordinate: match coordinate {
                    CoordinateRef::Named(n) => CoordinateRef::Named(s(n)),
                    other => other.clone(),
                },
                confidence: *confidence,
            },
            ActionKind::Wait { duration } => ActionKind::Wait { duration: *duration },
            ActionKind::OpenApp { app } => ActionKind::OpenApp { app: s(app) },
            ActionKind::AvatarKeywordClick(a) => ActionKind::AvatarKeywordClick(AvatarKeywordClick {
                keywords: match &a.keywords {
                    Keywords::One(k) => Keywords::One(s(k)),
                    Keywords::Many(ks) => Keywords::Many(ks.iter().map(|k| s(k)).collect()),
                },
                avatar_templates: a
                    .avatar_templates
                    .iter()
                    .map(|p| PathBuf::from(s(&p.to_string_lossy())))
                    .collect(),
                ..a.clone()
            }),
        };
        Action {
            kind,
            description: self.description.as_deref().map(s),
        }
    }

    /// One-line summary for plan listings.
    pub fn summary(&self) -> String {
        match &self.kind {
            ActionKind::Click { coordinate, .. } => match coordinate {
                CoordinateRef::Named(n) => format!("Click {}", n),
                CoordinateRef::Point([x, y]) => format!("Click ({}, {})", x, y),
                CoordinateRef::Invalid(v) => format!("Click {}", v),
            },
            ActionKind::Wait { duration } => format!("Wait {}s", duration),
            ActionKind::OpenApp { app } => format!("Open {}", app),
            ActionKind::AvatarKeywordClick(a) => {
                format!("Avatar keyword click [{}]", a.keywords.to_vec().join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Action>,
}

impl ActionPlan {
    pub fn new(name: &str, steps: Vec<Action>) -> Self {
        Self { name: name.into(), description: None, steps }
    }

    pub fn instantiate(&self, params: &Params) -> ActionPlan {
        ActionPlan {
            name: self.name.clone(),
            description: self.description.as_deref().map(|d| substitute(d, params)),
            steps: self.steps.iter().map(|a| a.instantiate(params)).collect(),
        }
    }
}

/// The canonical table: named coordinates, application paths, plans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanBook {
    pub coordinates: BTreeMap<String, CoordinateValue>,
    pub applications: BTreeMap<String, PathBuf>,
    pub plans: Vec<ActionPlan>,
}

impl PlanBook {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let book: PlanBook = serde_json::from_str(text).context("invalid plan table")?;
        let mut seen = HashSet::new();
        for plan in &book.plans {
            if !seen.insert(plan.name.as_str()) {
                bail!("plan '{}' is defined more than once", plan.name);
            }
        }
        Ok(book)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn plan(&self, name: &str) -> Option<&ActionPlan> {
        self.plans.iter().find(|p| p.name == name)
    }

    pub fn plan_names(&self) -> Vec<&str> {
        self.plans.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn coordinate(&self, name: &str) -> Option<&CoordinateValue> {
        self.coordinates.get(name)
    }

    pub fn application(&self, id: &str) -> Option<&Path> {
        self.applications.get(id).map(|p| p.as_path())
    }

    /// Static checks on a plan's references. Placeholders are resolved with
    /// `params` first; paths are not required to exist unless `check_files`.
    pub fn validate(&self, plan: &ActionPlan, params: &Params, check_files: bool) -> Result<()> {
        let plan = plan.instantiate(params);
        for (i, action) in plan.steps.iter().enumerate() {
            let step = i + 1;
            let fail = |msg: String| AutomationError::config(format!("step {}: {}", step, msg));
            match &action.kind {
                ActionKind::Click { coordinate, confidence } => {
                    check_confidence(*confidence).map_err(fail)?;
                    match coordinate {
                        CoordinateRef::Point(_) => {}
                        CoordinateRef::Named(name) => match self.coordinate(name) {
                            None => return Err(fail(format!("unknown coordinate name: {}", name))),
                            Some(CoordinateValue::Template(path)) => {
                                if !is_image_path(path) {
                                    return Err(fail(format!("{} is not an image template", path.display())));
                                }
                                if check_files && !path.is_file() {
                                    return Err(AutomationError::ResourceNotFound(path.clone()));
                                }
                            }
                            Some(CoordinateValue::Point(_)) => {}
                        },
                        CoordinateRef::Invalid(v) => {
                            return Err(fail(format!("invalid coordinate format: {}", v)))
                        }
                    }
                }
                ActionKind::Wait { duration } => {
                    if !duration.is_finite() || *duration < 0.0 {
                        return Err(fail(format!("invalid wait duration: {}", duration)));
                    }
                }
                ActionKind::OpenApp { app } => {
                    let path = self
                        .application(app)
                        .ok_or_else(|| fail(format!("unknown application: {}", app)))?;
                    if check_files && !path.exists() {
                        return Err(AutomationError::ResourceNotFound(path.to_path_buf()));
                    }
                }
                ActionKind::AvatarKeywordClick(a) => {
                    check_confidence(a.confidence).map_err(fail)?;
                    let keywords = a.keywords.to_vec();
                    if keywords.iter().all(|k| k.trim().is_empty()) {
                        return Err(fail("no keywords specified".into()));
                    }
                    if let Some(k) = keywords.iter().find(|k| k.contains('{') && k.contains('}')) {
                        return Err(fail(format!("unbound placeholder in keyword: {}", k)));
                    }
                    for path in &a.avatar_templates {
                        if check_files && !path.is_file() {
                            return Err(AutomationError::ResourceNotFound(path.clone()));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_confidence(c: f32) -> std::result::Result<(), String> {
    if (0.0..=1.0).contains(&c) {
        Ok(())
    } else {
        Err(format!("confidence {} outside 0..=1", c))
    }
}
