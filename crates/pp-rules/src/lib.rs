//! Pure rules over the shared store.
//!
//! Nothing here writes: the evaluator returns a report, the consistency rules
//! return lists of [`Correction`]s, and [`WritePolicy`] rewrites a value before
//! the proxy commits it.

use pp_types::{ChangeEvent, FALSE, Requirement, RequirementReport, is_true, keys};
use std::collections::BTreeMap;

/// Read-only access to current store values.
pub trait StoreView {
    fn value(&self, key: &str) -> Option<String>;

    fn flag(&self, key: &str) -> bool {
        is_true(self.value(key).as_deref())
    }

    fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }
}

impl StoreView for BTreeMap<String, String> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

// ── Requirement Evaluator ──

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequirementFlags {
    pub pump_pairing: bool,
    pub insulin_qaedy: bool,
    pub glucose_limits: bool,
    pub active_time: bool,
    pub daily_dose: bool,
    pub cgms_paired: bool,
}

impl RequirementFlags {
    /// Reads the six flags fresh from the store.
    pub fn read(view: &(impl StoreView + ?Sized)) -> Self {
        Self {
            pump_pairing: view.flag(keys::PUMP_PAIRING),
            insulin_qaedy: view.flag(keys::INSULIN_QAEDY),
            glucose_limits: view.flag(keys::GLUCOSE_LIMITS_CLEARED),
            active_time: view.flag(keys::ACTIVE_TIME_SELECTED),
            daily_dose: view.flag(keys::DAILY_DOSE_SELECTED),
            cgms_paired: view.flag(keys::CGMS_PAIRED),
        }
    }

    pub fn all() -> Self {
        Self {
            pump_pairing: true,
            insulin_qaedy: true,
            glucose_limits: true,
            active_time: true,
            daily_dose: true,
            cgms_paired: true,
        }
    }

    pub fn get(&self, requirement: Requirement) -> bool {
        match requirement {
            Requirement::PumpPairing => self.pump_pairing,
            Requirement::InsulinQaedy => self.insulin_qaedy,
            Requirement::GlucoseLimits => self.glucose_limits,
            Requirement::ActiveTime => self.active_time,
            Requirement::DailyDose => self.daily_dose,
            Requirement::CgmsPaired => self.cgms_paired,
        }
    }

    pub fn with(mut self, requirement: Requirement, value: bool) -> Self {
        match requirement {
            Requirement::PumpPairing => self.pump_pairing = value,
            Requirement::InsulinQaedy => self.insulin_qaedy = value,
            Requirement::GlucoseLimits => self.glucose_limits = value,
            Requirement::ActiveTime => self.active_time = value,
            Requirement::DailyDose => self.daily_dose = value,
            Requirement::CgmsPaired => self.cgms_paired = value,
        }
        self
    }
}

/// Computes whether Automatic Mode may be enabled. `failing` keeps the
/// priority order of [`Requirement::ALL`].
pub fn requirements_met(flags: &RequirementFlags) -> RequirementReport {
    let failing: Vec<Requirement> = Requirement::ALL
        .into_iter()
        .filter(|req| !flags.get(*req))
        .collect();
    RequirementReport {
        all_met: failing.is_empty(),
        failing,
    }
}

pub fn evaluate(view: &(impl StoreView + ?Sized)) -> RequirementReport {
    requirements_met(&RequirementFlags::read(view))
}

// ── Dependent-Flag Consistency Rules ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// `pump-pairing` false forces `insulin-qaedy` false.
    BasalNeedsPump,
    /// `insulin-qaedy=true` is only accepted while the pump is paired.
    BasalWriteNeedsPump,
    /// `activeTab` is dropped once pump or basal stop being set.
    ActiveTabInvalidated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    Set {
        key: &'static str,
        value: &'static str,
        rule: Rule,
    },
    Remove {
        key: &'static str,
        rule: Rule,
    },
}

fn basal_needs_pump(view: &(impl StoreView + ?Sized)) -> Option<Correction> {
    if !view.flag(keys::PUMP_PAIRING) && view.flag(keys::INSULIN_QAEDY) {
        Some(Correction::Set {
            key: keys::INSULIN_QAEDY,
            value: FALSE,
            rule: Rule::BasalNeedsPump,
        })
    } else {
        None
    }
}

fn drop_active_tab(view: &(impl StoreView + ?Sized)) -> Option<Correction> {
    view.contains(keys::ACTIVE_TAB).then_some(Correction::Remove {
        key: keys::ACTIVE_TAB,
        rule: Rule::ActiveTabInvalidated,
    })
}

/// Corrections owed after one observed change.
pub fn on_change(view: &(impl StoreView + ?Sized), event: &ChangeEvent) -> Vec<Correction> {
    let mut corrections = Vec::new();
    if let Some(fix) = basal_needs_pump(view) {
        corrections.push(fix);
    }

    let invalidating = (event.is_key(keys::PUMP_PAIRING) || event.is_key(keys::INSULIN_QAEDY))
        && !event.now_true();
    if invalidating || !corrections.is_empty() {
        corrections.extend(drop_active_tab(view));
    }
    corrections
}

/// State-only pass used by the periodic reconciliation tick.
pub fn sweep(view: &(impl StoreView + ?Sized)) -> Vec<Correction> {
    let mut corrections = Vec::new();
    if let Some(fix) = basal_needs_pump(view) {
        corrections.push(fix);
        corrections.extend(drop_active_tab(view));
    }
    corrections
}

/// Cleanup applied once when a context loads.
pub fn startup(view: &(impl StoreView + ?Sized)) -> Vec<Correction> {
    let mut corrections = Vec::new();
    corrections.extend(basal_needs_pump(view));
    if !view.flag(keys::PUMP_PAIRING) {
        corrections.extend(drop_active_tab(view));
    }
    corrections
}

// ── Write interception ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accept,
    Coerce { value: &'static str, rule: Rule },
}

/// Inspects a write before the proxy commits it.
pub trait WritePolicy: Send {
    fn admit(&self, view: &dyn StoreView, key: &str, value: &str) -> Admission;
}

/// Rejects `insulin-qaedy=true` unless the pump is paired at that instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasalRequiresPump;

impl WritePolicy for BasalRequiresPump {
    fn admit(&self, view: &dyn StoreView, key: &str, value: &str) -> Admission {
        if key == keys::INSULIN_QAEDY && is_true(Some(value)) && !view.flag(keys::PUMP_PAIRING) {
            tracing::debug!("insulin-qaedy=true refused, pump not paired");
            Admission::Coerce {
                value: FALSE,
                rule: Rule::BasalWriteNeedsPump,
            }
        } else {
            Admission::Accept
        }
    }
}
