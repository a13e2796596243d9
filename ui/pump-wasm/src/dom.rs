//! DOM helpers.
//!
//! Lookups return `Option` so a screen that lacks an element is not an error
//! by itself; callers decide which elements are required via [`require`].

use pp_core::SurfaceError;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlInputElement};

pub const ACTIVE_COLOR: &str = "#1b52a4";
pub const INACTIVE_COLOR: &str = "#7b7b7b";
pub const UNSET_COLOR: &str = "#999";

fn doc() -> Option<Document> {
    web_sys::window()?.document()
}

pub fn by_id(id: &str) -> Option<Element> {
    doc()?.get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn require(id: &str) -> Result<Element, SurfaceError> {
    by_id(id).ok_or_else(|| SurfaceError::MissingElement(id.to_owned()))
}

pub fn require_html(id: &str) -> Result<HtmlElement, SurfaceError> {
    by_id_typed::<HtmlElement>(id).ok_or_else(|| SurfaceError::MissingElement(id.to_owned()))
}

pub fn query_all(selector: &str) -> Vec<Element> {
    let Some(list) = doc().and_then(|d| d.query_selector_all(selector).ok()) else {
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn set_style(el: &Element, property: &str, value: &str) {
    if let Some(html) = el.dyn_ref::<HtmlElement>() {
        let _ = html.style().set_property(property, value);
    }
}

/// Sets a label's text and colour together.
pub fn set_label(el: &Element, text: &str, color: &str) {
    set_text(el, text);
    set_style(el, "color", color);
}

pub fn add_class(el: &Element, cls: &str) {
    let _ = el.class_list().add_1(cls);
}

/// Returns whether a checkbox with `id` exists.
pub fn set_checked(id: &str, checked: bool) -> bool {
    match by_id_typed::<HtmlInputElement>(id) {
        Some(input) => {
            input.set_checked(checked);
            true
        }
        None => false,
    }
}
