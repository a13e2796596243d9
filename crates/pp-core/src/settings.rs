use pp_types::keys;

/// Therapy settings chosen on the picker screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingField {
    Sensitivity,
    ActiveTime,
    DailyDose,
}

impl SettingField {
    pub fn selection_key(self) -> &'static str {
        match self {
            SettingField::Sensitivity => keys::SENSITIVITY_SELECTED,
            SettingField::ActiveTime => keys::ACTIVE_TIME_SELECTED,
            SettingField::DailyDose => keys::DAILY_DOSE_SELECTED,
        }
    }

    pub fn value_key(self) -> &'static str {
        match self {
            SettingField::Sensitivity => keys::SENSITIVITY_DEFAULT,
            SettingField::ActiveTime => keys::ACTIVE_TIME,
            SettingField::DailyDose => keys::DAILY_DOSE,
        }
    }
}
