//! The page's single controller.
//!
//! Uses `RefCell`-wrapped `thread_local!` storage (WASM is single-threaded).
//! Handlers reach the controller only through [`with_controller`].

use crate::store::BrowserStore;
use crate::surface::DomSurface;
use pp_core::Controller;
use std::cell::RefCell;

pub type PageController = Controller<BrowserStore, DomSurface>;

thread_local! {
    static CONTROLLER: RefCell<Option<PageController>> = const { RefCell::new(None) };
}

pub fn install(controller: PageController) {
    CONTROLLER.with(|cell| *cell.borrow_mut() = Some(controller));
}

/// Runs `f` against the controller. Returns `None` before [`install`] or if
/// a handler is already running.
///
/// The browser broadcasts `localStorage` writes to other tabs on its own, so
/// the outbox is dropped after every call.
pub fn with_controller<R>(f: impl FnOnce(&mut PageController) -> R) -> Option<R> {
    CONTROLLER.with(|cell| {
        let Ok(mut slot) = cell.try_borrow_mut() else {
            gloo_console::warn!("controller busy, event skipped");
            return None;
        };
        let controller = slot.as_mut()?;
        let result = f(controller);
        controller.take_outbox();
        Some(result)
    })
}
