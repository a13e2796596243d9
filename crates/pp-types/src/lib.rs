use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Keys of the shared persistent store.
pub mod keys {
    pub const PUMP_PAIRING: &str = "pump-pairing";
    pub const INSULIN_QAEDY: &str = "insulin-qaedy";
    pub const GLUCOSE_LIMITS_CLEARED: &str = "glucose_limits_v2_cleared";
    pub const ACTIVE_TIME_SELECTED: &str = "active_time_selected";
    pub const DAILY_DOSE_SELECTED: &str = "daily_dose_selected";
    pub const CGMS_PAIRED: &str = "cgms_paired";
    pub const AUTO_MODE_SWITCH: &str = "autoModeSwitch";
    pub const EXERCISE_MODE_SWITCH: &str = "exerciseautoModeSwitch";
    pub const EXERCISE_SELECTED_MINUTES: &str = "exerciseSelectedMinutes";

    pub const ACTIVE_TAB: &str = "activeTab";
    pub const CGMS_SERIAL: &str = "cgms_serial";
    pub const DEFAULTS_CLEARED: &str = "defaults_cleared";

    pub const SENSITIVITY_SELECTED: &str = "sensitivity_selected";
    pub const SENSITIVITY_DEFAULT: &str = "sensitivity_default";
    pub const ACTIVE_TIME: &str = "active_time";
    pub const DAILY_DOSE: &str = "daily_dose";

    /// Boolean flags that get a `"false"` default on first load.
    pub const BOOLEAN_FLAGS: [&str; 8] = [
        PUMP_PAIRING,
        INSULIN_QAEDY,
        GLUCOSE_LIMITS_CLEARED,
        ACTIVE_TIME_SELECTED,
        DAILY_DOSE_SELECTED,
        CGMS_PAIRED,
        AUTO_MODE_SWITCH,
        EXERCISE_MODE_SWITCH,
    ];

    /// Values removed once by the `defaults_cleared` migration.
    pub const LEGACY_DEFAULTS: [&str; 6] = [
        "sensitivity_default",
        "active_time",
        "daily_dose",
        "carb_ratio",
        "upper_glucose_limit",
        "lower_glucose_limit",
    ];
}

pub const TRUE: &str = "true";
pub const FALSE: &str = "false";

pub fn bool_str(value: bool) -> &'static str {
    if value { TRUE } else { FALSE }
}

/// A stored value reads as set only when it is exactly `"true"`.
pub fn is_true(value: Option<&str>) -> bool {
    value == Some(TRUE)
}

pub const EXERCISE_MESSAGE: &str = "يجب تفعيل الوضع التلقائي الرئيسي أولاً";

/// Prerequisites of Automatic Mode, declared in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    PumpPairing,
    InsulinQaedy,
    GlucoseLimits,
    ActiveTime,
    DailyDose,
    CgmsPaired,
}

impl Requirement {
    pub const ALL: [Requirement; 6] = [
        Requirement::PumpPairing,
        Requirement::InsulinQaedy,
        Requirement::GlucoseLimits,
        Requirement::ActiveTime,
        Requirement::DailyDose,
        Requirement::CgmsPaired,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Requirement::PumpPairing => keys::PUMP_PAIRING,
            Requirement::InsulinQaedy => keys::INSULIN_QAEDY,
            Requirement::GlucoseLimits => keys::GLUCOSE_LIMITS_CLEARED,
            Requirement::ActiveTime => keys::ACTIVE_TIME_SELECTED,
            Requirement::DailyDose => keys::DAILY_DOSE_SELECTED,
            Requirement::CgmsPaired => keys::CGMS_PAIRED,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|req| req.key() == key)
    }

    /// Message shown when an enable attempt is blocked by this requirement.
    pub fn message(self) -> &'static str {
        match self {
            Requirement::PumpPairing => "لم يتم إقتران مضخة الانسولين, لا يمكن تمكين الوضع التلقائي",
            Requirement::InsulinQaedy => "يرجى ضبط القاعدي",
            Requirement::GlucoseLimits => "يرجى ضبط معامل حساسية الأنسولين",
            Requirement::ActiveTime => "يرجى ضبط معامل الإنسولين النشط",
            Requirement::DailyDose => "يرجى ضبط اجمالي كمية الأنسولين اليومية",
            Requirement::CgmsPaired => "يرجى إقران نظام المراقبة المستمرة للجلوكوز",
        }
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of evaluating the six prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementReport {
    pub all_met: bool,
    pub failing: Vec<Requirement>,
}

impl RequirementReport {
    pub fn first_failing(&self) -> Option<Requirement> {
        self.failing.first().copied()
    }
}

/// A committed change to one key. `None` stands for an absent key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, old_value: Option<String>, new_value: Option<String>) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
        }
    }

    pub fn is_key(&self, key: &str) -> bool {
        self.key == key
    }

    pub fn now_true(&self) -> bool {
        is_true(self.new_value.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ExerciseStatus {
    Off,
    AwaitingDuration,
    On { minutes: u32 },
}

/// Settled view of one execution context, consumed by the reflection layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSnapshot {
    pub auto_mode: bool,
    pub exercise: ExerciseStatus,
    pub requirements: RequirementReport,
    pub pump_paired: bool,
    pub basal_configured: bool,
    pub cgms_paired: bool,
}

// ── HTTP DTOs ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCreateResponse {
    pub context_id: Uuid,
    pub snapshot: ModeSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseConfirmRequest {
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreWriteRequest {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub accepted: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub snapshot: ModeSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Unchanged,
    Committed,
    Coerced,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreWriteResponse {
    pub outcome: WriteOutcome,
    pub snapshot: ModeSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStateResponse {
    pub context_id: Uuid,
    pub snapshot: ModeSnapshot,
    pub messages: Vec<String>,
    pub picker_open: bool,
}
