//! Automatic Mode and its nested Exercise Mode.
//!
//! The machine never trusts its own copy of the world over the store: every
//! requirement check reads the flags fresh, and every transition is persisted
//! through the proxy. State is set before the matching write so that the
//! resulting change event finds the machine already consistent.

use crate::error::ModeError;
use crate::proxy::StoreProxy;
use pp_rules::evaluate;
use pp_storage::KeyValueStore;
use pp_types::{ChangeEvent, ExerciseStatus, FALSE, Requirement, TRUE, keys};
use tracing::{debug, info};

pub const MIN_EXERCISE_MINUTES: u32 = 1;
pub const MAX_EXERCISE_MINUTES: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExerciseMode {
    Disabled,
    /// Picker is open; nothing is persisted until a duration is confirmed.
    AwaitingDuration,
    Enabled { minutes: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMode {
    Disabled,
    Enabled(ExerciseMode),
}

impl AutoMode {
    pub fn is_enabled(self) -> bool {
        matches!(self, AutoMode::Enabled(_))
    }

    pub fn exercise(self) -> ExerciseMode {
        match self {
            AutoMode::Disabled => ExerciseMode::Disabled,
            AutoMode::Enabled(exercise) => exercise,
        }
    }

    pub fn exercise_status(self) -> ExerciseStatus {
        match self.exercise() {
            ExerciseMode::Disabled => ExerciseStatus::Off,
            ExerciseMode::AwaitingDuration => ExerciseStatus::AwaitingDuration,
            ExerciseMode::Enabled { minutes } => ExerciseStatus::On { minutes },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableCause {
    User,
    Requirement(Requirement),
    /// `autoModeSwitch` was cleared by a write the machine did not make.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AutoEnabled,
    AutoDisabled(DisableCause),
    ExerciseAwaitingDuration,
    ExerciseEnabled { minutes: u32 },
    ExerciseDisabled,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct AutoModeMachine {
    state: AutoMode,
    default_minutes: u32,
}

impl AutoModeMachine {
    pub fn new(default_minutes: u32) -> Self {
        Self {
            state: AutoMode::Disabled,
            default_minutes,
        }
    }

    /// Restores the persisted state as-is. Callers re-validate afterwards.
    pub fn rehydrate<S: KeyValueStore>(proxy: &StoreProxy<S>, default_minutes: u32) -> Self {
        let mut machine = Self::new(default_minutes);
        if proxy.flag(keys::AUTO_MODE_SWITCH) {
            machine.state = AutoMode::Enabled(machine.stored_exercise(proxy));
        }
        debug!(state = ?machine.state, "automatic mode rehydrated");
        machine
    }

    pub fn state(&self) -> AutoMode {
        self.state
    }

    /// User toggled Automatic Mode on.
    pub fn enable<S: KeyValueStore>(
        &mut self,
        proxy: &mut StoreProxy<S>,
    ) -> Result<Transition, ModeError> {
        let report = evaluate(&*proxy);
        if let Some(requirement) = report.first_failing() {
            info!(%requirement, "automatic mode enable rejected");
            self.shut_down(proxy);
            return Err(ModeError::RequirementNotMet { requirement });
        }

        if self.state.is_enabled() {
            proxy.write(keys::AUTO_MODE_SWITCH, TRUE);
            return Ok(Transition::Unchanged);
        }

        self.state = AutoMode::Enabled(ExerciseMode::Disabled);
        proxy.write(keys::AUTO_MODE_SWITCH, TRUE);
        info!("automatic mode enabled");
        Ok(Transition::AutoEnabled)
    }

    /// User toggled Automatic Mode off.
    pub fn disable<S: KeyValueStore>(&mut self, proxy: &mut StoreProxy<S>) -> Transition {
        let was_enabled = self.state.is_enabled();
        self.shut_down(proxy);
        if was_enabled {
            info!("automatic mode disabled by user");
            Transition::AutoDisabled(DisableCause::User)
        } else {
            Transition::Unchanged
        }
    }

    /// Silent re-check of the six requirements. Only ever disables.
    pub fn revalidate<S: KeyValueStore>(&mut self, proxy: &mut StoreProxy<S>) -> Transition {
        if !self.state.is_enabled() {
            return Transition::Unchanged;
        }
        match evaluate(&*proxy).first_failing() {
            Some(requirement) => {
                info!(%requirement, "automatic mode disabled, requirement no longer met");
                self.shut_down(proxy);
                Transition::AutoDisabled(DisableCause::Requirement(requirement))
            }
            None => Transition::Unchanged,
        }
    }

    /// User toggled Exercise Mode on. Opens the duration prompt on success.
    pub fn request_exercise<S: KeyValueStore>(
        &mut self,
        proxy: &mut StoreProxy<S>,
    ) -> Result<Transition, ModeError> {
        match self.state {
            AutoMode::Disabled => {
                proxy.write(keys::EXERCISE_MODE_SWITCH, FALSE);
                Err(ModeError::ExercisePreconditionNotMet)
            }
            AutoMode::Enabled(ExerciseMode::Enabled { .. }) => Ok(Transition::Unchanged),
            AutoMode::Enabled(_) => {
                self.state = AutoMode::Enabled(ExerciseMode::AwaitingDuration);
                debug!("exercise mode awaiting duration");
                Ok(Transition::ExerciseAwaitingDuration)
            }
        }
    }

    pub fn confirm_exercise<S: KeyValueStore>(
        &mut self,
        proxy: &mut StoreProxy<S>,
        minutes: u32,
    ) -> Result<Transition, ModeError> {
        if !(MIN_EXERCISE_MINUTES..=MAX_EXERCISE_MINUTES).contains(&minutes) {
            return Err(ModeError::InvalidExerciseDuration { minutes });
        }
        match self.state {
            AutoMode::Disabled => Err(ModeError::ExercisePreconditionNotMet),
            AutoMode::Enabled(ExerciseMode::AwaitingDuration) => {
                self.state = AutoMode::Enabled(ExerciseMode::Enabled { minutes });
                proxy.write(keys::EXERCISE_SELECTED_MINUTES, &minutes.to_string());
                proxy.write(keys::EXERCISE_MODE_SWITCH, TRUE);
                info!(minutes, "exercise mode enabled");
                Ok(Transition::ExerciseEnabled { minutes })
            }
            AutoMode::Enabled(_) => Err(ModeError::ExerciseNotPending),
        }
    }

    /// Toggle-off or picker cancellation.
    pub fn disable_exercise<S: KeyValueStore>(&mut self, proxy: &mut StoreProxy<S>) -> Transition {
        let transition = match self.state {
            AutoMode::Enabled(ExerciseMode::Disabled) | AutoMode::Disabled => Transition::Unchanged,
            AutoMode::Enabled(_) => {
                self.state = AutoMode::Enabled(ExerciseMode::Disabled);
                info!("exercise mode disabled");
                Transition::ExerciseDisabled
            }
        };
        proxy.write(keys::EXERCISE_MODE_SWITCH, FALSE);
        transition
    }

    /// Reacts to one committed change, local or remote.
    pub fn observe<S: KeyValueStore>(
        &mut self,
        proxy: &mut StoreProxy<S>,
        event: &ChangeEvent,
    ) -> Transition {
        // Flags are re-read: a queued remote event may already be stale.
        if event.is_key(keys::AUTO_MODE_SWITCH) {
            let on = proxy.flag(keys::AUTO_MODE_SWITCH);
            return self.follow_auto_flag(proxy, on);
        }
        if event.is_key(keys::EXERCISE_MODE_SWITCH) {
            let on = proxy.flag(keys::EXERCISE_MODE_SWITCH);
            return self.follow_exercise_flag(proxy, on);
        }
        if event.is_key(keys::EXERCISE_SELECTED_MINUTES) {
            if let AutoMode::Enabled(ExerciseMode::Enabled { minutes }) = self.state {
                let stored = self.stored_minutes(proxy);
                if stored != minutes {
                    self.state = AutoMode::Enabled(ExerciseMode::Enabled { minutes: stored });
                    return Transition::ExerciseEnabled { minutes: stored };
                }
            }
            return Transition::Unchanged;
        }
        if Requirement::from_key(&event.key).is_some() {
            return self.revalidate(proxy);
        }
        Transition::Unchanged
    }

    /// Brings the machine back in line with the store after edits it may
    /// never have been told about, then re-validates.
    pub fn resync<S: KeyValueStore>(&mut self, proxy: &mut StoreProxy<S>) -> Transition {
        let on = proxy.flag(keys::AUTO_MODE_SWITCH);
        let auto = self.follow_auto_flag(proxy, on);
        let on = proxy.flag(keys::EXERCISE_MODE_SWITCH);
        let exercise = self.follow_exercise_flag(proxy, on);
        let revalidated = self.revalidate(proxy);
        [auto, revalidated, exercise]
            .into_iter()
            .find(|t| *t != Transition::Unchanged)
            .unwrap_or(Transition::Unchanged)
    }

    fn follow_auto_flag<S: KeyValueStore>(&mut self, proxy: &mut StoreProxy<S>, on: bool) -> Transition {
        match (self.state, on) {
            (AutoMode::Enabled(_), false) => {
                info!("automatic mode cleared externally");
                self.shut_down(proxy);
                Transition::AutoDisabled(DisableCause::External)
            }
            (AutoMode::Disabled, false) => {
                proxy.write(keys::EXERCISE_MODE_SWITCH, FALSE);
                Transition::Unchanged
            }
            (AutoMode::Disabled, true) => match evaluate(&*proxy).first_failing() {
                Some(requirement) => {
                    info!(%requirement, "external automatic mode enable reverted");
                    self.shut_down(proxy);
                    Transition::AutoDisabled(DisableCause::Requirement(requirement))
                }
                None => {
                    self.state = AutoMode::Enabled(self.stored_exercise(proxy));
                    info!("automatic mode enabled externally");
                    Transition::AutoEnabled
                }
            },
            (AutoMode::Enabled(_), true) => Transition::Unchanged,
        }
    }

    fn follow_exercise_flag<S: KeyValueStore>(
        &mut self,
        proxy: &mut StoreProxy<S>,
        on: bool,
    ) -> Transition {
        match (self.state, on) {
            (AutoMode::Disabled, true) => {
                proxy.write(keys::EXERCISE_MODE_SWITCH, FALSE);
                Transition::Unchanged
            }
            (AutoMode::Disabled, false) => Transition::Unchanged,
            (AutoMode::Enabled(ExerciseMode::Enabled { .. }), true) => Transition::Unchanged,
            (AutoMode::Enabled(_), true) => {
                let minutes = self.stored_minutes(proxy);
                self.state = AutoMode::Enabled(ExerciseMode::Enabled { minutes });
                Transition::ExerciseEnabled { minutes }
            }
            (AutoMode::Enabled(ExerciseMode::Enabled { .. }), false) => {
                self.state = AutoMode::Enabled(ExerciseMode::Disabled);
                Transition::ExerciseDisabled
            }
            // An open picker is not undone by a store that still says off.
            (AutoMode::Enabled(_), false) => Transition::Unchanged,
        }
    }

    fn shut_down<S: KeyValueStore>(&mut self, proxy: &mut StoreProxy<S>) {
        self.state = AutoMode::Disabled;
        proxy.write(keys::AUTO_MODE_SWITCH, FALSE);
        proxy.write(keys::EXERCISE_MODE_SWITCH, FALSE);
    }

    fn stored_exercise<S: KeyValueStore>(&self, proxy: &StoreProxy<S>) -> ExerciseMode {
        if proxy.flag(keys::EXERCISE_MODE_SWITCH) {
            ExerciseMode::Enabled {
                minutes: self.stored_minutes(proxy),
            }
        } else {
            ExerciseMode::Disabled
        }
    }

    fn stored_minutes<S: KeyValueStore>(&self, proxy: &StoreProxy<S>) -> u32 {
        proxy
            .get(keys::EXERCISE_SELECTED_MINUTES)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|m| (MIN_EXERCISE_MINUTES..=MAX_EXERCISE_MINUTES).contains(m))
            .unwrap_or(self.default_minutes)
    }
}
