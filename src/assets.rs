//! Asset access: `fetch` on the web, the filesystem natively.

use crate::error::ViewerError;
use crate::model::avatar::{AvatarModel, TextureImage};
use crate::model::gltf_import::load_glb;
use crate::view::texture::decode_image;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        use wasm_bindgen::JsCast;
        use wasm_bindgen_futures::JsFuture;

        pub async fn load_bytes(path: &str) -> Result<Vec<u8>, ViewerError> {
            let window = web_sys::window().ok_or_else(|| ViewerError::MissingElement("window".into()))?;
            let response = JsFuture::from(window.fetch_with_str(path))
                .await
                .map_err(|e| ViewerError::fetch(path, ViewerError::from(e)))?;
            let response: web_sys::Response = response
                .dyn_into()
                .map_err(|_| ViewerError::fetch(path, "fetch did not return a Response"))?;
            if !response.ok() {
                return Err(ViewerError::fetch(path, format!("HTTP {}", response.status())));
            }
            let buffer = JsFuture::from(response.array_buffer().map_err(|e| ViewerError::fetch(path, ViewerError::from(e)))?)
                .await
                .map_err(|e| ViewerError::fetch(path, ViewerError::from(e)))?;
            Ok(js_sys::Uint8Array::new(&buffer).to_vec())
        }
    } else {
        pub async fn load_bytes(path: &str) -> Result<Vec<u8>, ViewerError> {
            std::fs::read(path).map_err(|e| ViewerError::fetch(path, e))
        }
    }
}

pub async fn load_avatar(path: &str) -> Result<AvatarModel, ViewerError> {
    let bytes = load_bytes(path).await?;
    tracing::debug!(path, bytes = bytes.len(), "model fetched");
    load_glb(&bytes)
}

pub async fn load_sprite_sheet(path: &str) -> Result<TextureImage, ViewerError> {
    let bytes = load_bytes(path).await?;
    decode_image(&bytes)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::model::gltf_import::tests::test_glb;

    #[test]
    fn test_missing_file_is_fetch_error() {
        let err = pollster::block_on(load_bytes("definitely/not/here.glb")).unwrap_err();
        assert!(matches!(err, ViewerError::AssetFetch { ref path, .. } if path == "definitely/not/here.glb"));
    }

    #[test]
    fn test_load_avatar_from_disk() {
        let path = std::env::temp_dir().join(format!("avatar-head-{}.glb", std::process::id()));
        std::fs::write(&path, test_glb()).expect("write fixture");
        let model = pollster::block_on(load_avatar(path.to_str().expect("utf8 path")));
        let _ = std::fs::remove_file(&path);
        let model = model.expect("load");
        assert!(model.find_node("sixcen_png_face").is_some());
    }

    #[test]
    fn test_sprite_sheet_rejects_non_images() {
        let path = std::env::temp_dir().join(format!("avatar-head-{}.png", std::process::id()));
        std::fs::write(&path, b"nope").expect("write fixture");
        let result = pollster::block_on(load_sprite_sheet(path.to_str().expect("utf8 path")));
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(ViewerError::ImageDecode(_))));
    }
}
