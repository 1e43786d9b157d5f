//! Error types for the viewer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Missing DOM element: {0}")]
    MissingElement(String),

    #[error("Failed to load asset {path}: {message}")]
    AssetFetch { path: String, message: String },

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Invalid node hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Model has no drawable meshes")]
    EmptyModel,

    #[error("Model already attached (scene is {0})")]
    AlreadyAttached(&'static str),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("JavaScript error: {0}")]
    Js(String),
}

impl ViewerError {
    pub fn fetch(path: impl Into<String>, message: impl ToString) -> Self {
        Self::AssetFetch { path: path.into(), message: message.to_string() }
    }
}

impl From<wasm_bindgen::JsValue> for ViewerError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Self::Js(value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }
}

impl From<ViewerError> for wasm_bindgen::JsValue {
    fn from(err: ViewerError) -> Self {
        wasm_bindgen::JsValue::from_str(&err.to_string())
    }
}
