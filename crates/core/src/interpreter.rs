//! Sequential plan execution with fail-fast semantics.

use serde::Serialize;

use crate::dedupe::dedupe;
use crate::error::{AutomationError, ErrorKind, Result};
use crate::gateway::{Classifier, Verdict};
use crate::logger;
use crate::matcher::{self, Template};
use crate::plan::{Action, ActionKind, ActionPlan, AvatarKeywordClick, CoordinateRef, CoordinateValue, Keywords, Params, PlanBook};
use crate::platform::{guarded_click, Capabilities, Platform};
use crate::region;
use crate::scaling::{detect_scaling, to_logical, to_physical};
use crate::settings::Settings;
use crate::sleep::{sleep_secs, Sleeper};
use crate::templates::{DirectoryTemplates, ExplicitTemplates, TemplateProvider};
use crate::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Ready,
    /// 1-based index of the step being executed.
    Running(usize),
    Failed { step: usize, kind: ErrorKind, message: String },
    Completed,
}

/// Everything an accepted avatar search knows about its target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateBundle {
    pub x: i32,
    pub y: i32,
    pub physical_x: i32,
    pub physical_y: i32,
    pub template: String,
    pub match_confidence: f32,
    /// Avatar position inside the chat capture.
    pub position: (i32, i32),
    pub verdict: Verdict,
}

impl CoordinateBundle {
    pub fn logical(&self) -> LogicalPoint {
        LogicalPoint::new(self.x, self.y)
    }

    pub fn target(&self) -> ClickTarget {
        ClickTarget {
            point: self.logical(),
            source: TargetSource::Detection { template_id: self.template.clone() },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Done,
    Coordinates(CoordinateBundle),
}

#[derive(Debug, Clone)]
pub struct StepRecord {
    pub index: usize,
    pub summary: String,
    pub description: String,
    pub outcome: std::result::Result<ActionOutcome, String>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub plan: String,
    pub state: RunState,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Coordinates handed back by the last step that returned any.
    pub fn coordinates(&self) -> Option<&CoordinateBundle> {
        self.steps.iter().rev().find_map(|s| match &s.outcome {
            Ok(ActionOutcome::Coordinates(c)) => Some(c),
            _ => None,
        })
    }
}

pub struct Interpreter<'a> {
    platform: &'a mut dyn Platform,
    sleeper: &'a mut dyn Sleeper,
    classifier: Option<&'a mut dyn Classifier>,
    templates: Option<Box<dyn TemplateProvider + 'a>>,
    book: &'a PlanBook,
    settings: &'a Settings,
    caps: Capabilities,
    scale: Option<f64>,
    state: RunState,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        platform: &'a mut dyn Platform,
        sleeper: &'a mut dyn Sleeper,
        book: &'a PlanBook,
        settings: &'a Settings,
        caps: Capabilities,
    ) -> Self {
        Self {
            platform,
            sleeper,
            classifier: None,
            templates: None,
            book,
            settings,
            caps,
            scale: None,
            state: RunState::Ready,
        }
    }

    pub fn with_classifier(mut self, classifier: &'a mut dyn Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Templates used when an avatar action names none. Defaults to every
    /// image in the configured avatar directory.
    pub fn with_templates(mut self, provider: Box<dyn TemplateProvider + 'a>) -> Self {
        self.templates = Some(provider);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Look up `name` in the plan table and run it.
    pub fn run_plan(&mut self, name: &str, params: &Params) -> RunReport {
        let book = self.book;
        match book.plan(name) {
            Some(plan) => self.run(plan, params),
            None => {
                let message = format!(
                    "unknown action plan: {} (available: {})",
                    name,
                    book.plan_names().join(", ")
                );
                logger::error(&message);
                self.state = RunState::Failed { step: 0, kind: ErrorKind::Configuration, message };
                RunReport { plan: name.into(), state: self.state.clone(), steps: Vec::new() }
            }
        }
    }

    /// Run every step of `plan` in order, stopping at the first failure.
    pub fn run(&mut self, plan: &ActionPlan, params: &Params) -> RunReport {
        let plan = plan.instantiate(params);
        let total = plan.steps.len();
        let mut steps = Vec::with_capacity(total);

        self.state = RunState::Ready;
        logger::info(&format!("executing plan '{}' ({} actions)", plan.name, total));

        for (i, action) in plan.steps.iter().enumerate() {
            let index = i + 1;
            self.state = RunState::Running(index);
            logger::info(&format!("step {}/{}: {}", index, total, action.description()));

            let result = self.execute(action);
            let record = StepRecord {
                index,
                summary: action.summary(),
                description: action.description().to_string(),
                outcome: result.as_ref().cloned().map_err(|e| e.to_string()),
            };
            steps.push(record);

            if let Err(e) = result {
                logger::error(&format!("failed at step {}: {}. stopping execution", index, e));
                self.state = RunState::Failed { step: index, kind: e.kind(), message: e.to_string() };
                return RunReport { plan: plan.name, state: self.state.clone(), steps };
            }
        }

        logger::info(&format!("plan '{}' completed", plan.name));
        self.state = RunState::Completed;
        RunReport { plan: plan.name, state: self.state.clone(), steps }
    }

    pub fn execute(&mut self, action: &Action) -> Result<ActionOutcome> {
        match &action.kind {
            ActionKind::Click { coordinate, confidence } => {
                self.require(self.caps.input, "pointer injection")?;
                let target = self.resolve_target(coordinate, *confidence)?;
                logger::info(&format!("click {} ({:?})", target.point, target.source));
                guarded_click(self.platform, target.point)?;
                Ok(ActionOutcome::Done)
            }
            ActionKind::Wait { duration } => {
                logger::info(&format!("wait {}s", duration));
                sleep_secs(self.sleeper, *duration);
                Ok(ActionOutcome::Done)
            }
            ActionKind::OpenApp { app } => {
                self.open_app(app)?;
                Ok(ActionOutcome::Done)
            }
            ActionKind::AvatarKeywordClick(a) => self.avatar_keyword_click(a),
        }
    }

    /// Launch `app` through the OS and wait for it to settle.
    pub fn open_app(&mut self, app: &str) -> Result<()> {
        let book = self.book;
        let path = book
            .application(app)
            .ok_or_else(|| AutomationError::config(format!("unknown application: {}", app)))?;
        if !path.exists() {
            return Err(AutomationError::ResourceNotFound(path.to_path_buf()));
        }

        logger::info(&format!("opening {} ({})", app, path.display()));
        self.platform.open(path).map_err(|e| AutomationError::Launch {
            app: app.into(),
            reason: e.to_string(),
        })?;

        let timing = &self.settings.timing;
        let settle = if app == self.settings.emulator_app {
            timing.emulator_startup
        } else {
            timing.app_startup
        };
        sleep_secs(self.sleeper, settle);
        Ok(())
    }

    /// Locate the avatar whose message matches `keywords` without clicking.
    pub fn find_keyword(&mut self, keywords: Keywords) -> Result<CoordinateBundle> {
        let mut action = AvatarKeywordClick::new(keywords);
        action.return_coordinates = true;
        match self.avatar_keyword_click(&action)? {
            ActionOutcome::Coordinates(c) => Ok(c),
            ActionOutcome::Done => Err(AutomationError::DetectionMiss("no coordinates returned".into())),
        }
    }

    fn require(&self, available: bool, what: &str) -> Result<()> {
        if available {
            Ok(())
        } else {
            Err(AutomationError::EnvironmentUnavailable(format!("{} is not available", what)))
        }
    }

    /// Logical/physical factor, measured once per interpreter unless fixed
    /// in settings.
    fn scale_factor(&mut self) -> Result<f64> {
        if let Some(f) = self.scale {
            return Ok(f);
        }
        let factor = match self.settings.scale_factor {
            Some(f) => f,
            None => detect_scaling(self.platform).ok_or_else(|| {
                AutomationError::EnvironmentUnavailable("cannot measure display scaling".into())
            })?,
        };
        if !factor.is_finite() || factor <= 0.0 {
            return Err(AutomationError::EnvironmentUnavailable(format!(
                "degenerate display scaling factor {}",
                factor
            )));
        }
        logger::debug(&format!("display scaling factor {:.2}", factor));
        self.scale = Some(factor);
        Ok(factor)
    }

    fn capture(&mut self) -> Result<Capture> {
        self.platform
            .capture()
            .ok_or_else(|| AutomationError::EnvironmentUnavailable("screen capture failed".into()))
    }

    fn resolve_target(&mut self, coordinate: &CoordinateRef, confidence: f32) -> Result<ClickTarget> {
        let book = self.book;
        match coordinate {
            CoordinateRef::Point([x, y]) => Ok(ClickTarget {
                point: LogicalPoint::new(*x, *y),
                source: TargetSource::Literal,
            }),
            CoordinateRef::Named(name) => match book.coordinate(name) {
                None => Err(AutomationError::config(format!("unknown coordinate name: {}", name))),
                Some(CoordinateValue::Point([x, y])) => Ok(ClickTarget {
                    point: LogicalPoint::new(*x, *y),
                    source: TargetSource::Named(name.clone()),
                }),
                Some(CoordinateValue::Template(path)) => {
                    self.require(self.caps.capture, "screen capture")?;
                    let template = Template::load(path)?;
                    let factor = self.scale_factor()?;
                    let capture = self.capture()?;
                    let det = matcher::best_match(&capture, &template, confidence).ok_or_else(|| {
                        AutomationError::DetectionMiss(format!(
                            "{} not found on screen (confidence {})",
                            template.id, confidence
                        ))
                    })?;
                    logger::info(&format!(
                        "found {} at {} ({:.3})",
                        template.id, det.position, det.confidence
                    ));
                    Ok(ClickTarget {
                        point: to_logical(capture.to_screen(det.center()), factor),
                        source: TargetSource::Template {
                            name: name.clone(),
                            path: path.display().to_string(),
                        },
                    })
                }
            },
            CoordinateRef::Invalid(v) => Err(AutomationError::config(format!("invalid coordinate format: {}", v))),
        }
    }

    /// Chat area in physical buffer coordinates and its logical center.
    fn chat_area(&self, factor: f64) -> Result<(Bounds, LogicalPoint)> {
        let [x1, y1, x2, y2] = self.settings.chat_area;
        if x2 <= x1 || y2 <= y1 {
            return Err(AutomationError::config(format!(
                "chat area {:?} is empty",
                self.settings.chat_area
            )));
        }
        let top_left = to_physical(LogicalPoint::new(x1.max(0), y1.max(0)), factor);
        let bottom_right = to_physical(LogicalPoint::new(x2.max(0), y2.max(0)), factor);
        let bounds = Bounds::new(
            top_left.x as u32,
            top_left.y as u32,
            (bottom_right.x - top_left.x).max(0) as u32,
            (bottom_right.y - top_left.y).max(0) as u32,
        );
        Ok((bounds, LogicalPoint::new((x1 + x2) / 2, (y1 + y2) / 2)))
    }

    fn avatar_keyword_click(&mut self, action: &AvatarKeywordClick) -> Result<ActionOutcome> {
        let keywords: Vec<String> = action
            .keywords
            .to_vec()
            .into_iter()
            .filter(|k| !k.trim().is_empty())
            .collect();
        if keywords.is_empty() {
            return Err(AutomationError::config("no keywords specified"));
        }

        self.require(self.caps.capture, "screen capture")?;
        if !action.return_coordinates {
            self.require(self.caps.input, "pointer injection")?;
        }

        let templates = if action.avatar_templates.is_empty() {
            match &self.templates {
                Some(provider) => provider.templates(),
                None => DirectoryTemplates::new(&self.settings.avatar_dir).templates(),
            }
        } else {
            ExplicitTemplates::new(action.avatar_templates.clone()).templates()
        };
        if templates.is_empty() {
            return Err(AutomationError::config("no avatar templates available"));
        }

        let factor = self.scale_factor()?;
        let (area, chat_center) = self.chat_area(factor)?;

        logger::info(&format!(
            "searching for avatars with keywords [{}] using {} template(s)",
            keywords.join(", "),
            templates.len()
        ));

        let mut attempts = ScrollAttemptState::new(action.max_scroll_attempts);
        loop {
            logger::debug(&format!(
                "search attempt {}/{}",
                attempts.attempt_number + 1,
                attempts.max_attempts + 1
            ));
            if let Some(bundle) = self.search_chat(&templates, &keywords, action.confidence, area, factor)? {
                if action.return_coordinates {
                    logger::info(&format!(
                        "returning coordinates: logical ({}, {}), physical ({}, {})",
                        bundle.x, bundle.y, bundle.physical_x, bundle.physical_y
                    ));
                    return Ok(ActionOutcome::Coordinates(bundle));
                }
                let target = bundle.target();
                logger::info(&format!("click {} ({:?})", target.point, target.source));
                guarded_click(self.platform, target.point)?;
                return Ok(ActionOutcome::Done);
            }

            if !attempts.advance() {
                break;
            }
            logger::info(&format!(
                "nothing matched, scrolling ({}/{})",
                attempts.attempt_number, attempts.max_attempts
            ));
            self.platform.scroll(chat_center, self.settings.scroll_amount);
            sleep_secs(self.sleeper, self.settings.timing.scroll_settle);
        }

        Err(AutomationError::DetectionMiss(format!(
            "no avatar message related to [{}] after {} scroll(s)",
            keywords.join(", "),
            action.max_scroll_attempts
        )))
    }

    #[cfg(feature = "debug-capture")]
    fn save_debug(&self, chat: &Capture, detections: &[Detection], analyses: &[Option<TextRegionAnalysis>]) {
        match crate::debug::save_search(&self.settings.debug_dir, chat, detections, analyses) {
            Ok(path) => logger::debug(&format!("debug capture saved to {}", path.display())),
            Err(e) => logger::warn(&format!("debug capture failed: {}", e)),
        }
    }

    /// One pass over the chat area: match, dedupe, classify in detection
    /// order. Returns the first accepted candidate.
    fn search_chat(
        &mut self,
        templates: &[Template],
        keywords: &[String],
        confidence: f32,
        area: Bounds,
        factor: f64,
    ) -> Result<Option<CoordinateBundle>> {
        let screen = self.capture()?;
        let chat = screen
            .crop(area)
            .ok_or_else(|| AutomationError::config("chat area lies outside the captured screen"))?;
        let gray = chat.gray();

        let mut found = Vec::new();
        for template in templates {
            found.extend(matcher::find_all_gray(&gray, template, confidence));
        }
        let detections = dedupe(found, self.settings.duplicate_distance);
        if detections.is_empty() {
            logger::info("no avatars detected");
            return Ok(None);
        }
        logger::info(&format!("found {} avatar(s)", detections.len()));

        let analyses: Vec<Option<TextRegionAnalysis>> = detections
            .iter()
            .map(|d| region::analyze(&gray, d, &self.settings.text_region, &self.settings.content))
            .collect();

        #[cfg(feature = "debug-capture")]
        self.save_debug(&chat, &detections, &analyses);

        let Some(classifier) = self.classifier.as_deref_mut() else {
            return Ok(None);
        };

        for (i, (det, analysis)) in detections.iter().zip(&analyses).enumerate() {
            let Some(analysis) = analysis else {
                logger::debug(&format!("avatar {} has no text region inside the capture", i + 1));
                continue;
            };
            if self.settings.skip_blank_regions && !analysis.has_content {
                logger::debug(&format!(
                    "avatar {} text region looks blank (density {:.3}, variance {:.1})",
                    i + 1,
                    analysis.density,
                    analysis.variance
                ));
                continue;
            }
            let Some(text) = chat.crop(analysis.bounds) else { continue };

            let verdict = classifier.classify(&text.image, keywords);
            if verdict.accepts() {
                let physical = chat.to_screen(det.center());
                let logical = to_logical(physical, factor);
                logger::info(&format!(
                    "avatar {} matches ({}%): {}",
                    i + 1,
                    verdict.confidence,
                    verdict.explanation
                ));
                return Ok(Some(CoordinateBundle {
                    x: logical.x,
                    y: logical.y,
                    physical_x: physical.x,
                    physical_y: physical.y,
                    template: det.template_id.clone(),
                    match_confidence: det.confidence,
                    position: (det.position.x, det.position.y),
                    verdict,
                }));
            }
            if verdict.is_related {
                logger::info(&format!("avatar {} related but confidence too low: {}%", i + 1, verdict.confidence));
            } else {
                logger::info(&format!("avatar {} not related", i + 1));
            }
        }
        Ok(None)
    }
}
