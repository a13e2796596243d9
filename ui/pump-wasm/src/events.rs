//! Event binding.
//!
//! Toggle switches, the cross-tab `storage` event and the reconciliation
//! timer all funnel into the controller through `state::with_controller`.

use crate::state;
use crate::surface::{AUTO_SWITCHES, EXERCISE_SWITCH};
use crate::dom;
use gloo_timers::callback::Interval;
use pp_types::ChangeEvent;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlInputElement, StorageEvent};

fn on_change(input: &HtmlInputElement, handler: fn(bool)) -> Result<(), JsValue> {
    let target = input.clone();
    let cb = Closure::wrap(Box::new(move |_: web_sys::Event| {
        handler(target.checked());
    }) as Box<dyn FnMut(_)>);
    input.add_event_listener_with_callback("change", cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}

fn auto_mode_changed(enabled: bool) {
    if let Some(Err(err)) = state::with_controller(|c| c.toggle_auto_mode(enabled)) {
        gloo_console::log!(format!("automatic mode: {err}"));
    }
}

fn exercise_changed(enabled: bool) {
    if let Some(Err(err)) = state::with_controller(|c| c.toggle_exercise(enabled)) {
        gloo_console::log!(format!("exercise mode: {err}"));
    }
}

/// Switches missing from the current screen are skipped.
pub fn bind_switches() -> Result<(), JsValue> {
    for id in AUTO_SWITCHES {
        if let Some(input) = dom::by_id_typed::<HtmlInputElement>(id) {
            on_change(&input, auto_mode_changed)?;
        }
    }
    if let Some(input) = dom::by_id_typed::<HtmlInputElement>(EXERCISE_SWITCH) {
        on_change(&input, exercise_changed)?;
    }
    Ok(())
}

/// Writes from other tabs. A `null` key means the store was cleared.
pub fn bind_storage_events() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let cb = Closure::wrap(Box::new(move |event: StorageEvent| match event.key() {
        Some(key) => {
            let change = ChangeEvent::new(key, event.old_value(), event.new_value());
            state::with_controller(|c| c.apply_remote(change));
        }
        None => {
            state::with_controller(|c| c.reconcile());
        }
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("storage", cb.as_ref().unchecked_ref())?;
    cb.forget();
    Ok(())
}

pub fn start_reconciler(interval_ms: u64) {
    let millis = u32::try_from(interval_ms).unwrap_or(u32::MAX);
    Interval::new(millis, || {
        state::with_controller(|c| c.reconcile());
    })
    .forget();
}
