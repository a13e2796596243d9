//! Automatic Mode in the browser.
//!
//! Wires the controller to `localStorage`, the page's toggle switches, the
//! cross-tab `storage` event and a reconciliation timer. The picker widget and
//! the pairing screens call back in through the exported functions below.

pub mod dom;
pub mod events;
pub mod state;
pub mod store;
pub mod surface;

use pp_core::{Controller, ControllerConfig, SettingField};
use store::BrowserStore;
use surface::DomSurface;
use wasm_bindgen::prelude::*;

/// WASM entry point – called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    init()
}

fn init() -> Result<(), JsValue> {
    let store = BrowserStore;
    if !store.is_available() {
        gloo_console::warn!("localStorage unavailable, automatic mode stays locked");
    }

    let config = ControllerConfig::default();
    let interval_ms = config.reconcile_interval_ms;
    let mut controller = Controller::new(store, DomSurface::new(store), config);
    controller.load();
    controller.take_outbox();
    state::install(controller);

    events::bind_switches()?;
    events::bind_storage_events()?;
    events::start_reconciler(interval_ms);
    Ok(())
}

/// Picker confirmed. Returns whether exercise mode is now on.
#[wasm_bindgen(js_name = confirmExerciseTimePicker)]
pub fn confirm_exercise_time_picker(minutes: u32) -> bool {
    matches!(
        state::with_controller(|c| c.confirm_exercise(minutes)),
        Some(Ok(_))
    )
}

#[wasm_bindgen(js_name = cancelExerciseTimePicker)]
pub fn cancel_exercise_time_picker() {
    state::with_controller(|c| c.cancel_exercise());
}

#[wasm_bindgen(js_name = setPumpPaired)]
pub fn set_pump_paired(paired: bool) {
    state::with_controller(|c| c.set_pump_paired(paired));
}

/// Returns `false` when the basal flag was refused because no pump is paired.
#[wasm_bindgen(js_name = configureBasal)]
pub fn configure_basal() -> bool {
    state::with_controller(|c| {
        c.configure_basal();
        c.snapshot().basal_configured
    })
    .unwrap_or(false)
}

#[wasm_bindgen(js_name = pairCgms)]
pub fn pair_cgms(serial: &str) {
    state::with_controller(|c| c.pair_cgms(serial));
}

#[wasm_bindgen(js_name = unpairCgms)]
pub fn unpair_cgms() {
    state::with_controller(|c| c.unpair_cgms());
}

/// `field` is one of `sensitivity`, `activeTime`, `dailyDose`.
#[wasm_bindgen(js_name = recordSetting)]
pub fn record_setting(field: &str, value: &str) -> Result<(), JsValue> {
    let field = parse_field(field)?;
    state::with_controller(|c| c.record_setting(field, value));
    Ok(())
}

#[wasm_bindgen(js_name = resetSetting)]
pub fn reset_setting(field: &str) -> Result<(), JsValue> {
    let field = parse_field(field)?;
    state::with_controller(|c| c.reset_setting(field));
    Ok(())
}

fn parse_field(field: &str) -> Result<SettingField, JsValue> {
    match field {
        "sensitivity" => Ok(SettingField::Sensitivity),
        "activeTime" => Ok(SettingField::ActiveTime),
        "dailyDose" => Ok(SettingField::DailyDose),
        other => Err(JsValue::from_str(&format!("unknown setting `{other}`"))),
    }
}
