//! Scheduling settings.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// How the due queue is ordered when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrder {
    /// Least overdue first, ties kept in collection order.
    #[default]
    Urgency,
    /// Sorted by urgency, then shuffled.
    Shuffled,
}

/// Settings consumed by the interval model, recommendation table and session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Wait before the first review of a new item.
    #[serde(default = "default_initial_interval")]
    pub initial_interval_minutes: f64,
    /// Wait after a failed review.
    #[serde(default = "default_forgotten_interval")]
    pub forgotten_interval_minutes: f64,
    /// Wait after the first success in a streak.
    #[serde(default = "default_remembered_interval")]
    pub remembered_interval_minutes: f64,
    /// Growth per additional consecutive success.
    #[serde(default = "default_lengthening_factor")]
    pub lengthening_factor: f64,
    /// Success rate the learned recommendations steer toward.
    #[serde(default = "default_ideal_success")]
    pub ideal_success_percentage: f64,
    /// Samples required before a learned recommendation is trusted.
    #[serde(default = "default_reliability_threshold")]
    pub reliability_threshold: usize,
    /// Maximum items per session.
    #[serde(default)]
    pub session_size_cap: Option<usize>,
    #[serde(default)]
    pub session_order: SessionOrder,
    /// Let items whose last review failed consult learned recommendations.
    #[serde(default)]
    pub learn_after_failure: bool,
}

fn default_initial_interval() -> f64 { 1440.0 }
fn default_forgotten_interval() -> f64 { 10.0 }
fn default_remembered_interval() -> f64 { 1440.0 }
fn default_lengthening_factor() -> f64 { 2.5 }
fn default_ideal_success() -> f64 { 85.0 }
fn default_reliability_threshold() -> usize { 60 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            initial_interval_minutes: 1440.0,
            forgotten_interval_minutes: 10.0,
            remembered_interval_minutes: 1440.0,
            lengthening_factor: 2.5,
            ideal_success_percentage: 85.0,
            reliability_threshold: 60,
            session_size_cap: None,
            session_order: SessionOrder::Urgency,
            learn_after_failure: false,
        }
    }
}

impl Settings {
    /// Start building settings from the defaults.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Check every scalar. Intervals and the lengthening factor must be strictly positive.
    pub fn validate(&self) -> EngineResult<()> {
        positive("initial_interval_minutes", self.initial_interval_minutes)?;
        positive("forgotten_interval_minutes", self.forgotten_interval_minutes)?;
        positive("remembered_interval_minutes", self.remembered_interval_minutes)?;
        positive("lengthening_factor", self.lengthening_factor)?;

        let pct = self.ideal_success_percentage;
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(EngineError::InvalidSettings(format!(
                "ideal_success_percentage must be between 0 and 100, got {pct}"
            )));
        }
        if self.reliability_threshold == 0 {
            return Err(EngineError::InvalidSettings(
                "reliability_threshold must be positive".to_string(),
            ));
        }
        if self.session_size_cap == Some(0) {
            return Err(EngineError::InvalidSettings(
                "session_size_cap must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidSettings(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

/// Builder that validates on [`SettingsBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn initial_interval_minutes(mut self, minutes: f64) -> Self {
        self.settings.initial_interval_minutes = minutes;
        self
    }

    pub fn forgotten_interval_minutes(mut self, minutes: f64) -> Self {
        self.settings.forgotten_interval_minutes = minutes;
        self
    }

    pub fn remembered_interval_minutes(mut self, minutes: f64) -> Self {
        self.settings.remembered_interval_minutes = minutes;
        self
    }

    pub fn lengthening_factor(mut self, factor: f64) -> Self {
        self.settings.lengthening_factor = factor;
        self
    }

    pub fn ideal_success_percentage(mut self, pct: f64) -> Self {
        self.settings.ideal_success_percentage = pct;
        self
    }

    pub fn reliability_threshold(mut self, samples: usize) -> Self {
        self.settings.reliability_threshold = samples;
        self
    }

    pub fn session_size_cap(mut self, cap: Option<usize>) -> Self {
        self.settings.session_size_cap = cap;
        self
    }

    pub fn session_order(mut self, order: SessionOrder) -> Self {
        self.settings.session_order = order;
        self
    }

    pub fn learn_after_failure(mut self, enabled: bool) -> Self {
        self.settings.learn_after_failure = enabled;
        self
    }

    /// Validate and return the settings.
    pub fn build(self) -> EngineResult<Settings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}
