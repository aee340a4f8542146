use wasm_bindgen::prelude::*;

use crate::{sheet, Merger};

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Merge the call sheet `a` with the report `b`; pages of `a` come first
#[wasm_bindgen]
pub fn merge_pdfs(a: &[u8], b: &[u8]) -> Result<Vec<u8>, JsValue> {
    Merger::default()
        .merge(a, b)
        .map(|output| output.bytes)
        .map_err(|e| JsValue::from_str(&format!("Merge error: {}", e)))
}

/// Annotate a JSON array of pages of script lines
#[wasm_bindgen]
pub fn annotate_script(json: &str) -> Result<String, JsValue> {
    sheet::annotate_json(json).map_err(|e| JsValue::from_str(&format!("Annotate error: {}", e)))
}
