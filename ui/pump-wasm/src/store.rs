//! `window.localStorage` as a [`KeyValueStore`].
//!
//! The storage handle is looked up on every call since `web_sys::Storage` is
//! not `Send`. A page without storage (private mode, disabled cookies) gets an
//! error per call, which the proxy turns into empty reads.

use anyhow::{Result, anyhow};
use pp_storage::KeyValueStore;
use wasm_bindgen::JsValue;
use web_sys::Storage;

#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserStore;

impl BrowserStore {
    fn storage(&self) -> Result<Storage> {
        let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
        window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| anyhow!("localStorage unavailable"))
    }

    pub fn is_available(&self) -> bool {
        self.storage().is_ok()
    }
}

fn js_error(err: JsValue) -> anyhow::Error {
    anyhow!("localStorage call failed: {:?}", err)
}

impl KeyValueStore for BrowserStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage()?.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.storage()?.remove_item(key).map_err(js_error)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let storage = self.storage()?;
        let len = storage.length().map_err(js_error)?;
        (0..len)
            .filter_map(|index| storage.key(index).transpose())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(js_error)
    }
}
