use crate::dom::{self, ACTIVE_COLOR, INACTIVE_COLOR, UNSET_COLOR};
use crate::store::BrowserStore;
use pp_core::{Surface, SurfaceError, surface::SurfaceResult};
use pp_storage::KeyValueStore;
use pp_types::{ModeSnapshot, keys};

const READY: &str = "جاهز";
const NOT_READY: &str = "غير جاهز";
const ENABLED: &str = "مفعل";
const DISABLED: &str = "معطل";
const CONFIGURED: &str = "تعيين";
const UNSET: &str = "غير محدد";

pub const AUTO_SWITCHES: [&str; 2] = ["autoModeSwitch", "planautoModeSwitch"];
pub const EXERCISE_SWITCH: &str = "exerciseautoModeSwitch";

fn readiness(ready: bool) -> (&'static str, &'static str) {
    if ready {
        (READY, ACTIVE_COLOR)
    } else {
        (NOT_READY, INACTIVE_COLOR)
    }
}

fn mode_label(enabled: bool) -> (&'static str, &'static str) {
    if enabled {
        (ENABLED, ACTIVE_COLOR)
    } else {
        (DISABLED, INACTIVE_COLOR)
    }
}

fn basal_label(configured: bool) -> (&'static str, &'static str) {
    if configured {
        (CONFIGURED, ACTIVE_COLOR)
    } else {
        (UNSET, INACTIVE_COLOR)
    }
}

/// Text for a therapy setting on the final status screen. Settings are only
/// shown while Automatic Mode is on.
fn setting_label(auto_mode: bool, value: Option<&str>) -> (String, &'static str) {
    match value.map(str::trim).filter(|v| auto_mode && !v.is_empty()) {
        Some(v) => (v.to_owned(), ACTIVE_COLOR),
        None => (UNSET.to_owned(), UNSET_COLOR),
    }
}

/// Renders settled state into the page. Reads the store only for display
/// values; decisions are never taken here.
pub struct DomSurface {
    store: BrowserStore,
}

impl DomSurface {
    pub fn new(store: BrowserStore) -> Self {
        Self { store }
    }
}

impl Surface for DomSurface {
    fn show_message(&mut self, message: &str) -> SurfaceResult {
        let modal = dom::require("confirmautomode")?;
        if let Ok(Some(title)) = modal.query_selector(".modal-title") {
            dom::set_text(&title, message);
        }
        dom::add_class(&modal, "active");
        Ok(())
    }

    fn open_exercise_picker(&mut self, default_minutes: u32) -> SurfaceResult {
        let overlay = dom::require_html("exerciseTimePickerOverlay")?;
        let _ = overlay.set_attribute("data-default-minutes", &default_minutes.to_string());
        let _ = overlay.style().set_property("display", "flex");
        Ok(())
    }

    fn close_exercise_picker(&mut self) -> SurfaceResult {
        let overlay = dom::require_html("exerciseTimePickerOverlay")?;
        let _ = overlay.style().set_property("display", "none");
        Ok(())
    }

    fn reflect_switches(&mut self, auto_mode: bool, exercise_mode: bool) -> SurfaceResult {
        let mut found = 0;
        for id in AUTO_SWITCHES {
            found += usize::from(dom::set_checked(id, auto_mode));
        }
        found += usize::from(dom::set_checked(EXERCISE_SWITCH, exercise_mode));

        let (text, color) = mode_label(auto_mode);
        for el in dom::query_all(".mode-status, .auto-mode-status, .auto-status-text, #autoModeStatus, #autoStatusText") {
            dom::set_label(&el, text, color);
        }
        if let Some(icon) = dom::by_id("autoIconDiv") {
            let image = if auto_mode {
                "url(assets/23-active.png)"
            } else {
                "url(assets/23.png)"
            };
            dom::set_style(&icon, "background-image", image);
        }
        for section in dom::query_all(".auto-mode-middle-section") {
            dom::set_style(&section, "display", if auto_mode { "block" } else { "none" });
        }

        if found == 0 {
            return Err(SurfaceError::MissingElement(AUTO_SWITCHES[0].to_owned()));
        }
        Ok(())
    }

    fn refresh_device_status(&mut self, cgms_paired: bool, pump_paired: bool) -> SurfaceResult {
        let (text, color) = readiness(cgms_paired);
        for el in dom::query_all("#cgmsStatus") {
            dom::set_label(&el, text, color);
        }
        if let Some(el) = dom::by_id("pumpStatus") {
            let (text, color) = readiness(pump_paired);
            dom::set_label(&el, text, color);
        }
        Ok(())
    }

    fn refresh_final_status(&mut self, snapshot: &ModeSnapshot) -> SurfaceResult {
        let settings = [
            (".dailyDose", keys::DAILY_DOSE),
            (".actIn", keys::ACTIVE_TIME),
            (".senVal", keys::SENSITIVITY_DEFAULT),
        ];
        for (selector, key) in settings {
            let stored = self.store.get(key).ok().flatten();
            let (text, color) = setting_label(snapshot.auto_mode, stored.as_deref());
            for el in dom::query_all(selector) {
                dom::set_label(&el, &text, color);
            }
        }

        let (text, color) = basal_label(snapshot.basal_configured);
        let basal = dom::require("basalStatus")?;
        dom::set_label(&basal, text, color);
        Ok(())
    }
}
