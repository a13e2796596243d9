use crate::config::ControllerConfig;
use crate::error::{ModeError, SurfaceError};
use crate::machine::{AutoMode, AutoModeMachine, ExerciseMode, Transition};
use crate::proxy::StoreProxy;
use crate::settings::SettingField;
use crate::surface::Surface;
use pp_rules::{BasalRequiresPump, Correction, evaluate, on_change, startup, sweep};
use pp_storage::KeyValueStore;
use pp_types::{
    ChangeEvent, ExerciseStatus, FALSE, ModeSnapshot, TRUE, WriteOutcome, bool_str, keys,
};
use tracing::{debug, info, warn};

/// One execution context: a proxy over the shared backend, the mode machine
/// and the surface it reflects into.
///
/// Every public operation runs inside a settle cycle. Writes made while the
/// cycle is draining join its queue, and the surface is refreshed once the
/// queue is empty.
pub struct Controller<S, U> {
    proxy: StoreProxy<S>,
    machine: AutoModeMachine,
    surface: U,
    config: ControllerConfig,
}

impl<S: KeyValueStore, U: Surface> Controller<S, U> {
    /// Builds an unloaded context. Call [`Controller::load`] before use.
    pub fn new(backend: S, surface: U, config: ControllerConfig) -> Self {
        Self {
            proxy: StoreProxy::new(backend).with_policy(BasalRequiresPump),
            machine: AutoModeMachine::new(config.default_exercise_minutes),
            surface,
            config,
        }
    }

    /// First-load work: legacy cleanup, flag defaults, startup corrections,
    /// then rehydration followed by re-validation.
    pub fn load(&mut self) {
        self.run(|this| {
            this.migrate_defaults();
            for key in keys::BOOLEAN_FLAGS {
                this.proxy.ensure_default(key, FALSE);
            }
            let fixes = startup(&this.proxy);
            this.apply_all(fixes);

            this.machine =
                AutoModeMachine::rehydrate(&this.proxy, this.config.default_exercise_minutes);
            let transition = this.machine.resync(&mut this.proxy);
            info!(?transition, state = ?this.machine.state(), "context loaded");
        });
    }

    pub fn toggle_auto_mode(&mut self, enabled: bool) -> Result<Transition, ModeError> {
        let result = self.run(|this| {
            if enabled {
                this.machine.enable(&mut this.proxy)
            } else {
                Ok(this.machine.disable(&mut this.proxy))
            }
        });
        self.report(result)
    }

    pub fn toggle_exercise(&mut self, enabled: bool) -> Result<Transition, ModeError> {
        let result = self.run(|this| {
            if enabled {
                this.machine.request_exercise(&mut this.proxy)
            } else {
                Ok(this.machine.disable_exercise(&mut this.proxy))
            }
        });
        self.report(result)
    }

    pub fn confirm_exercise(&mut self, minutes: u32) -> Result<Transition, ModeError> {
        let result = self.run(|this| this.machine.confirm_exercise(&mut this.proxy, minutes));
        self.report(result)
    }

    pub fn cancel_exercise(&mut self) -> Transition {
        self.run(|this| this.machine.disable_exercise(&mut this.proxy))
    }

    pub fn write(&mut self, key: &str, value: &str) -> WriteOutcome {
        self.run(|this| this.proxy.write(key, value))
    }

    pub fn set_flag(&mut self, key: &str, value: bool) -> WriteOutcome {
        self.write(key, bool_str(value))
    }

    pub fn remove(&mut self, key: &str) -> WriteOutcome {
        self.run(|this| this.proxy.remove(key))
    }

    pub fn set_pump_paired(&mut self, paired: bool) -> WriteOutcome {
        self.set_flag(keys::PUMP_PAIRING, paired)
    }

    /// Marks the basal dose as configured. Coerced back while no pump is paired.
    pub fn configure_basal(&mut self) -> WriteOutcome {
        self.set_flag(keys::INSULIN_QAEDY, true)
    }

    pub fn pair_cgms(&mut self, serial: &str) -> WriteOutcome {
        self.run(|this| {
            this.proxy.write(keys::CGMS_SERIAL, serial);
            this.proxy.write(keys::CGMS_PAIRED, TRUE)
        })
    }

    /// Clears the pairing flag. The serial stays for the next pairing screen.
    pub fn unpair_cgms(&mut self) -> WriteOutcome {
        self.set_flag(keys::CGMS_PAIRED, false)
    }

    pub fn record_setting(&mut self, field: SettingField, value: &str) -> WriteOutcome {
        self.run(|this| {
            this.proxy.write(field.value_key(), value);
            this.proxy.write(field.selection_key(), TRUE)
        })
    }

    pub fn reset_setting(&mut self, field: SettingField) -> WriteOutcome {
        self.run(|this| {
            let outcome = this.proxy.remove(field.selection_key());
            this.proxy.remove(field.value_key());
            outcome
        })
    }

    /// Delivers a change committed by another context.
    pub fn apply_remote(&mut self, event: ChangeEvent) {
        self.run(|this| this.proxy.observe_remote(event));
    }

    /// Periodic tick. Heals anything written behind the proxy's back.
    pub fn reconcile(&mut self) {
        self.run(|this| {
            let transition = this.machine.resync(&mut this.proxy);
            if transition != Transition::Unchanged {
                info!(?transition, "reconciliation adjusted automatic mode");
            }
            let fixes = sweep(&this.proxy);
            this.apply_all(fixes);
        });
    }

    pub fn snapshot(&self) -> ModeSnapshot {
        let state = self.machine.state();
        ModeSnapshot {
            auto_mode: state.is_enabled(),
            exercise: state.exercise_status(),
            requirements: evaluate(&self.proxy),
            pump_paired: self.proxy.flag(keys::PUMP_PAIRING),
            basal_configured: self.proxy.flag(keys::INSULIN_QAEDY),
            cgms_paired: self.proxy.flag(keys::CGMS_PAIRED),
        }
    }

    pub fn state(&self) -> AutoMode {
        self.machine.state()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.proxy.get(key)
    }

    pub fn take_outbox(&mut self) -> Vec<ChangeEvent> {
        self.proxy.take_outbox()
    }

    pub fn notifications(&self) -> u64 {
        self.proxy.notifications()
    }

    pub fn surface(&self) -> &U {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut U {
        &mut self.surface
    }

    fn run<T>(&mut self, op: impl FnOnce(&mut Self) -> T) -> T {
        let before = self.machine.state();
        let outermost = self.proxy.begin_settle();
        let result = op(self);
        self.drain();
        if outermost {
            self.proxy.end_settle();
            self.refresh_surface(before);
        }
        result
    }

    fn drain(&mut self) {
        let mut rounds = 0;
        while let Some(event) = self.proxy.next_pending() {
            if rounds == self.config.settle_limit() {
                let dropped = self.proxy.discard_pending() + 1;
                warn!(dropped, "settle stopped after {} events", rounds);
                break;
            }
            rounds += 1;

            let transition = self.machine.observe(&mut self.proxy, &event);
            if transition != Transition::Unchanged {
                debug!(key = %event.key, ?transition, "machine reacted");
            }
            let fixes = on_change(&self.proxy, &event);
            self.apply_all(fixes);
        }
    }

    fn apply_all(&mut self, fixes: Vec<Correction>) {
        for fix in fixes {
            match fix {
                Correction::Set { key, value, rule } => {
                    debug!(?rule, "correcting {} to {}", key, value);
                    self.proxy.write(key, value);
                }
                Correction::Remove { key, rule } => {
                    debug!(?rule, "removing {}", key);
                    self.proxy.remove(key);
                }
            }
        }
    }

    fn migrate_defaults(&mut self) {
        if self.proxy.flag(keys::DEFAULTS_CLEARED) {
            return;
        }
        for key in keys::LEGACY_DEFAULTS {
            self.proxy.direct_remove(key);
        }
        self.proxy.direct_write(keys::DEFAULTS_CLEARED, TRUE);
        info!("legacy default values cleared");
    }

    fn report(&mut self, result: Result<Transition, ModeError>) -> Result<Transition, ModeError> {
        if let Some(message) = result.as_ref().err().and_then(|err| err.user_message()) {
            let shown = self.surface.show_message(message);
            self.log_surface("show_message", shown);
        }
        result
    }

    fn refresh_surface(&mut self, before: AutoMode) {
        let snapshot = self.snapshot();
        let was_awaiting = before.exercise() == ExerciseMode::AwaitingDuration;
        let awaiting = snapshot.exercise == ExerciseStatus::AwaitingDuration;

        if awaiting && !was_awaiting {
            let opened = self.surface.open_exercise_picker(self.config.default_exercise_minutes);
            self.log_surface("open_exercise_picker", opened);
        } else if was_awaiting && !awaiting {
            let closed = self.surface.close_exercise_picker();
            self.log_surface("close_exercise_picker", closed);
        }

        let exercise_on = snapshot.exercise != ExerciseStatus::Off;
        let reflected = self.surface.reflect_switches(snapshot.auto_mode, exercise_on);
        self.log_surface("reflect_switches", reflected);
        let devices = self
            .surface
            .refresh_device_status(snapshot.cgms_paired, snapshot.pump_paired);
        self.log_surface("refresh_device_status", devices);
        let status = self.surface.refresh_final_status(&snapshot);
        self.log_surface("refresh_final_status", status);
    }

    fn log_surface(&self, step: &str, result: Result<(), SurfaceError>) {
        if let Err(err) = result {
            warn!(step, "surface update skipped: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceResult;
    use pp_storage::InMemoryStore;
    use pp_types::{EXERCISE_MESSAGE, Requirement};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingSurface {
        messages: Vec<String>,
        picker_opened: Vec<u32>,
        picker_closed: usize,
        switches: Option<(bool, bool)>,
        refreshes: usize,
    }

    impl Surface for RecordingSurface {
        fn show_message(&mut self, message: &str) -> SurfaceResult {
            self.messages.push(message.to_owned());
            Ok(())
        }

        fn open_exercise_picker(&mut self, default_minutes: u32) -> SurfaceResult {
            self.picker_opened.push(default_minutes);
            Ok(())
        }

        fn close_exercise_picker(&mut self) -> SurfaceResult {
            self.picker_closed += 1;
            Ok(())
        }

        fn reflect_switches(&mut self, auto_mode: bool, exercise_mode: bool) -> SurfaceResult {
            self.switches = Some((auto_mode, exercise_mode));
            Ok(())
        }

        fn refresh_final_status(&mut self, _snapshot: &ModeSnapshot) -> SurfaceResult {
            self.refreshes += 1;
            Ok(())
        }
    }

    struct MissingElements;

    impl Surface for MissingElements {
        fn reflect_switches(&mut self, _auto_mode: bool, _exercise_mode: bool) -> SurfaceResult {
            Err(SurfaceError::MissingElement("autoModeSwitch".into()))
        }

        fn show_message(&mut self, _message: &str) -> SurfaceResult {
            Err(SurfaceError::MissingElement("confirmautomode".into()))
        }
    }

    type TestController = Controller<Arc<InMemoryStore>, RecordingSurface>;

    fn context(store: &Arc<InMemoryStore>) -> TestController {
        let mut controller = Controller::new(
            Arc::clone(store),
            RecordingSurface::default(),
            ControllerConfig::default(),
        );
        controller.load();
        controller
    }

    fn ready_store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::with_entries(
            Requirement::ALL.map(|req| (req.key(), "true")),
        ))
    }

    fn deliver(from: &mut TestController, to: &mut TestController) {
        for event in from.take_outbox() {
            to.apply_remote(event);
        }
    }

    #[test]
    fn scenario_a_enables_with_all_requirements() {
        let mut ctx = context(&ready_store());
        assert_eq!(ctx.toggle_auto_mode(true), Ok(Transition::AutoEnabled));
        assert_eq!(ctx.get("autoModeSwitch").as_deref(), Some("true"));
        assert!(ctx.snapshot().auto_mode);
        assert_eq!(ctx.surface().switches, Some((true, false)));
        assert!(ctx.surface().messages.is_empty());
    }

    #[test]
    fn scenario_b_losing_cgms_disables_both_modes() {
        let mut ctx = context(&ready_store());
        ctx.toggle_auto_mode(true).unwrap();
        ctx.toggle_exercise(true).unwrap();
        ctx.confirm_exercise(30).unwrap();
        assert_eq!(ctx.get("exerciseautoModeSwitch").as_deref(), Some("true"));

        ctx.set_flag("cgms_paired", false);
        assert_eq!(ctx.get("autoModeSwitch").as_deref(), Some("false"));
        assert_eq!(ctx.get("exerciseautoModeSwitch").as_deref(), Some("false"));
        assert_eq!(ctx.state(), AutoMode::Disabled);
        assert!(ctx.surface().messages.is_empty());
        assert_eq!(ctx.surface().switches, Some((false, false)));
    }

    #[test]
    fn scenario_c_rejects_and_names_pump_pairing() {
        let mut ctx = context(&Arc::new(InMemoryStore::default()));
        assert_eq!(
            ctx.toggle_auto_mode(true),
            Err(ModeError::RequirementNotMet {
                requirement: Requirement::PumpPairing
            })
        );
        assert_eq!(ctx.get("autoModeSwitch").as_deref(), Some("false"));
        assert_eq!(
            ctx.surface().messages,
            vec![Requirement::PumpPairing.message().to_owned()]
        );
        assert_eq!(ctx.surface().switches, Some((false, false)));
    }

    #[test]
    fn scenario_d_basal_follows_pump() {
        let mut ctx = context(&Arc::new(InMemoryStore::default()));
        ctx.set_pump_paired(true);
        assert_eq!(ctx.configure_basal(), WriteOutcome::Committed);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("true"));

        ctx.set_pump_paired(false);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("false"));
    }

    #[test]
    fn no_single_missing_requirement_allows_enable() {
        for missing in Requirement::ALL {
            let store = ready_store();
            store.set(missing.key(), "false").unwrap();
            let mut ctx = context(&store);

            let result = ctx.toggle_auto_mode(true);
            assert_eq!(
                result,
                Err(ModeError::RequirementNotMet { requirement: missing })
            );
            assert_ne!(ctx.get("autoModeSwitch").as_deref(), Some("true"));
        }
    }

    #[test]
    fn direct_auto_clear_cascades_to_exercise() {
        let mut ctx = context(&ready_store());
        ctx.toggle_auto_mode(true).unwrap();
        ctx.toggle_exercise(true).unwrap();
        ctx.confirm_exercise(60).unwrap();

        ctx.write("autoModeSwitch", "false");
        assert_eq!(ctx.get("exerciseautoModeSwitch").as_deref(), Some("false"));
        assert_eq!(ctx.state(), AutoMode::Disabled);
    }

    #[test]
    fn unpairing_pump_heals_basal_and_auto_mode() {
        let store = ready_store();
        store.set("activeTab", "basal").unwrap();
        let mut ctx = context(&store);
        ctx.toggle_auto_mode(true).unwrap();

        ctx.set_pump_paired(false);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("false"));
        assert_eq!(ctx.get("autoModeSwitch").as_deref(), Some("false"));
        assert_eq!(ctx.get("activeTab"), None);
    }

    #[test]
    fn cascade_commits_in_order_with_one_refresh() {
        let store = ready_store();
        store.set("autoModeSwitch", "true").unwrap();
        store.set("exerciseautoModeSwitch", "true").unwrap();
        store.set("activeTab", "basal").unwrap();
        let mut ctx = context(&store);
        assert!(matches!(ctx.state(), AutoMode::Enabled(ExerciseMode::Enabled { .. })));
        ctx.take_outbox();
        let refreshes = ctx.surface().refreshes;

        ctx.set_pump_paired(false);

        let order: Vec<String> = ctx.take_outbox().into_iter().map(|e| e.key).collect();
        assert_eq!(
            order,
            [
                "pump-pairing",
                "autoModeSwitch",
                "exerciseautoModeSwitch",
                "insulin-qaedy",
                "activeTab",
            ]
        );
        assert_eq!(ctx.surface().refreshes - refreshes, 1);
        assert_eq!(ctx.surface().switches, Some((false, false)));
    }

    #[test]
    fn rewriting_current_value_is_silent() {
        let mut ctx = context(&ready_store());
        let before = ctx.notifications();
        assert_eq!(ctx.write("cgms_paired", "true"), WriteOutcome::Unchanged);
        assert_eq!(ctx.toggle_auto_mode(false), Ok(Transition::Unchanged));
        assert_eq!(ctx.notifications(), before);
    }

    #[test]
    fn basal_without_pump_is_coerced() {
        let mut ctx = context(&Arc::new(InMemoryStore::default()));
        assert_eq!(ctx.configure_basal(), WriteOutcome::Coerced);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("false"));

        ctx.write("pump-pairing", "maybe");
        assert_eq!(ctx.configure_basal(), WriteOutcome::Coerced);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("false"));
    }

    #[test]
    fn exercise_flow_opens_and_closes_picker() {
        let mut ctx = context(&ready_store());
        ctx.toggle_auto_mode(true).unwrap();

        assert_eq!(ctx.toggle_exercise(true), Ok(Transition::ExerciseAwaitingDuration));
        assert_eq!(ctx.surface().picker_opened, vec![30]);
        assert_eq!(ctx.surface().switches, Some((true, true)));
        assert_eq!(ctx.get("exerciseautoModeSwitch").as_deref(), Some("false"));

        assert_eq!(
            ctx.confirm_exercise(45),
            Ok(Transition::ExerciseEnabled { minutes: 45 })
        );
        assert_eq!(ctx.surface().picker_closed, 1);
        assert_eq!(ctx.snapshot().exercise, ExerciseStatus::On { minutes: 45 });

        assert_eq!(ctx.toggle_exercise(false), Ok(Transition::ExerciseDisabled));
        assert_eq!(ctx.get("exerciseautoModeSwitch").as_deref(), Some("false"));
    }

    #[test]
    fn cancelled_picker_leaves_exercise_off() {
        let mut ctx = context(&ready_store());
        ctx.toggle_auto_mode(true).unwrap();
        ctx.toggle_exercise(true).unwrap();

        assert_eq!(ctx.cancel_exercise(), Transition::ExerciseDisabled);
        assert_eq!(ctx.surface().picker_closed, 1);
        assert_eq!(ctx.snapshot().exercise, ExerciseStatus::Off);
        assert_eq!(ctx.confirm_exercise(30), Err(ModeError::ExerciseNotPending));
    }

    #[test]
    fn exercise_without_auto_mode_is_rejected_with_message() {
        let mut ctx = context(&ready_store());
        assert_eq!(
            ctx.toggle_exercise(true),
            Err(ModeError::ExercisePreconditionNotMet)
        );
        assert_eq!(ctx.surface().messages, vec![EXERCISE_MESSAGE.to_owned()]);
        assert!(ctx.surface().picker_opened.is_empty());
        assert_eq!(ctx.surface().switches, Some((false, false)));
    }

    #[test]
    fn invalid_duration_is_rejected_quietly() {
        let mut ctx = context(&ready_store());
        ctx.toggle_auto_mode(true).unwrap();
        ctx.toggle_exercise(true).unwrap();
        assert_eq!(
            ctx.confirm_exercise(121),
            Err(ModeError::InvalidExerciseDuration { minutes: 121 })
        );
        assert!(ctx.surface().messages.is_empty());
        assert_eq!(ctx.snapshot().exercise, ExerciseStatus::AwaitingDuration);
    }

    #[test]
    fn load_migrates_and_defaults_without_notifying() {
        let store = Arc::new(InMemoryStore::with_entries([
            ("sensitivity_default", "50"),
            ("carb_ratio", "10"),
            ("lower_glucose_limit", "70"),
        ]));
        let ctx = context(&store);

        assert_eq!(ctx.notifications(), 0);
        assert_eq!(store.get("sensitivity_default").unwrap(), None);
        assert_eq!(store.get("carb_ratio").unwrap(), None);
        assert_eq!(store.get("lower_glucose_limit").unwrap(), None);
        assert_eq!(store.get("defaults_cleared").unwrap().as_deref(), Some("true"));
        for key in keys::BOOLEAN_FLAGS {
            assert_eq!(store.get(key).unwrap().as_deref(), Some("false"), "{key}");
        }
        assert_eq!(ctx.surface().refreshes, 1);
    }

    #[test]
    fn migration_runs_once() {
        let store = Arc::new(InMemoryStore::default());
        let mut ctx = context(&store);
        ctx.record_setting(SettingField::Sensitivity, "45");

        let _second = context(&store);
        assert_eq!(store.get("sensitivity_default").unwrap().as_deref(), Some("45"));
    }

    #[test]
    fn load_revalidates_rehydrated_auto_mode() {
        let store = Arc::new(InMemoryStore::with_entries([
            ("autoModeSwitch", "true"),
            ("exerciseautoModeSwitch", "true"),
            ("pump-pairing", "true"),
        ]));
        let ctx = context(&store);

        assert_eq!(ctx.state(), AutoMode::Disabled);
        assert_eq!(store.get("autoModeSwitch").unwrap().as_deref(), Some("false"));
        assert_eq!(store.get("exerciseautoModeSwitch").unwrap().as_deref(), Some("false"));
        assert!(ctx.surface().messages.is_empty());
    }

    #[test]
    fn load_keeps_valid_persisted_state() {
        let store = ready_store();
        store.set("autoModeSwitch", "true").unwrap();
        store.set("exerciseautoModeSwitch", "true").unwrap();
        store.set("exerciseSelectedMinutes", "15").unwrap();

        let ctx = context(&store);
        assert_eq!(
            ctx.state(),
            AutoMode::Enabled(ExerciseMode::Enabled { minutes: 15 })
        );
        assert_eq!(ctx.surface().switches, Some((true, true)));
    }

    #[test]
    fn load_drops_active_tab_without_pump() {
        let store = Arc::new(InMemoryStore::with_entries([("activeTab", "basal")]));
        let _ctx = context(&store);
        assert_eq!(store.get("activeTab").unwrap(), None);
    }

    #[test]
    fn remote_changes_settle_in_other_contexts() {
        let store = ready_store();
        let mut first = context(&store);
        let mut second = context(&store);

        first.toggle_auto_mode(true).unwrap();
        deliver(&mut first, &mut second);
        assert!(second.state().is_enabled());
        assert_eq!(second.surface().switches, Some((true, false)));

        second.set_flag("daily_dose_selected", false);
        deliver(&mut second, &mut first);
        assert_eq!(first.state(), AutoMode::Disabled);
        assert_eq!(store.get("autoModeSwitch").unwrap().as_deref(), Some("false"));
        assert!(first.take_outbox().is_empty());
    }

    #[test]
    fn stale_remote_event_follows_current_store() {
        let store = ready_store();
        let mut ctx = context(&store);
        ctx.apply_remote(ChangeEvent::new(
            "autoModeSwitch",
            Some("false".into()),
            Some("true".into()),
        ));
        assert_eq!(ctx.state(), AutoMode::Disabled);
    }

    #[test]
    fn reconcile_heals_writes_behind_the_proxy() {
        let store = ready_store();
        let mut ctx = context(&store);
        ctx.toggle_auto_mode(true).unwrap();

        store.set("pump-pairing", "false").unwrap();
        store.set("activeTab", "basal").unwrap();
        ctx.reconcile();

        assert_eq!(store.get("insulin-qaedy").unwrap().as_deref(), Some("false"));
        assert_eq!(store.get("autoModeSwitch").unwrap().as_deref(), Some("false"));
        assert_eq!(store.get("activeTab").unwrap(), None);
        assert_eq!(ctx.state(), AutoMode::Disabled);

        let before = ctx.notifications();
        ctx.reconcile();
        assert_eq!(ctx.notifications(), before);
    }

    #[test]
    fn cgms_unpairing_keeps_serial() {
        let store = Arc::new(InMemoryStore::default());
        let mut ctx = context(&store);
        assert_eq!(ctx.pair_cgms("22222C4JT"), WriteOutcome::Committed);
        assert_eq!(store.get("cgms_serial").unwrap().as_deref(), Some("22222C4JT"));
        assert!(ctx.snapshot().cgms_paired);

        assert_eq!(ctx.unpair_cgms(), WriteOutcome::Committed);
        assert_eq!(store.get("cgms_paired").unwrap().as_deref(), Some("false"));
        assert_eq!(store.get("cgms_serial").unwrap().as_deref(), Some("22222C4JT"));
        assert!(!ctx.snapshot().cgms_paired);
    }

    #[test]
    fn resetting_a_setting_blocks_auto_mode() {
        let store = ready_store();
        let mut ctx = context(&store);
        ctx.record_setting(SettingField::DailyDose, "40");
        ctx.toggle_auto_mode(true).unwrap();

        ctx.reset_setting(SettingField::DailyDose);
        assert_eq!(store.get("daily_dose").unwrap(), None);
        assert_eq!(ctx.state(), AutoMode::Disabled);
        assert_eq!(
            ctx.snapshot().requirements.first_failing(),
            Some(Requirement::DailyDose)
        );
    }

    #[test]
    fn missing_ui_elements_do_not_block_persistence() {
        let mut ctx = Controller::new(
            ready_store(),
            MissingElements,
            ControllerConfig::default(),
        );
        ctx.load();
        assert_eq!(ctx.toggle_auto_mode(true), Ok(Transition::AutoEnabled));
        assert_eq!(ctx.get("autoModeSwitch").as_deref(), Some("true"));

        ctx.toggle_auto_mode(false).unwrap();
        assert_eq!(ctx.toggle_exercise(true), Err(ModeError::ExercisePreconditionNotMet));
    }

    #[test]
    fn settle_bound_stops_runaway_cycles() {
        let config = ControllerConfig {
            max_settle_rounds: 1,
            ..ControllerConfig::default()
        };
        let mut ctx = Controller::new(ready_store(), RecordingSurface::default(), config);
        ctx.load();
        ctx.toggle_auto_mode(true).unwrap();

        ctx.set_pump_paired(false);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("false"));
        assert_eq!(ctx.get("autoModeSwitch").as_deref(), Some("false"));
        assert_eq!(ctx.surface().switches, Some((false, false)));
    }

    #[test]
    fn zero_settle_rounds_still_settles_first_event() {
        let config = ControllerConfig {
            max_settle_rounds: 0,
            ..ControllerConfig::default()
        };
        let mut ctx = Controller::new(ready_store(), RecordingSurface::default(), config);
        ctx.load();
        ctx.toggle_auto_mode(true).unwrap();

        ctx.set_pump_paired(false);
        assert_eq!(ctx.get("insulin-qaedy").as_deref(), Some("false"));
        assert_eq!(ctx.state(), AutoMode::Disabled);
    }
}
