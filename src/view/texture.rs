use std::collections::HashMap;

use crate::error::ViewerError;
use crate::model::avatar::{Material, TextureImage, TextureWrap};

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// A sampled 2D colour texture
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    /// Empty texture of the given size; `copy_target` textures can receive external images
    pub fn empty(device: &wgpu::Device, width: u32, height: u32, label: &str, copy_target: bool) -> Self {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if copy_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, width: width.max(1), height: height.max(1) }
    }

    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &TextureImage,
        label: &str,
    ) -> Self {
        let tex = Self::empty(device, image.width, image.height, label, false);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * tex.width),
                rows_per_image: Some(tex.height),
            },
            wgpu::Extent3d { width: tex.width, height: tex.height, depth_or_array_layers: 1 },
        );
        tex
    }

    /// 1x1 texture of a single colour
    pub fn solid(device: &wgpu::Device, queue: &wgpu::Queue, rgba: [u8; 4], label: &str) -> Self {
        Self::from_rgba(device, queue, &TextureImage { pixels: rgba.to_vec(), width: 1, height: 1 }, label)
    }

    /// Stand-in for the face until its sprite sheet or video has data
    pub fn placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::solid(device, queue, [0, 0, 0, 0], "face_placeholder")
    }
}

/// Decode a PNG or WebP sprite sheet into RGBA8. No vertical flip is applied.
pub fn decode_image(bytes: &[u8]) -> Result<TextureImage, ViewerError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(TextureImage { pixels: rgba.into_raw(), width, height })
}

/// Filter and addressing of one sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerKey {
    pub nearest: bool,
    pub wrap_u: TextureWrap,
    pub wrap_v: TextureWrap,
}

impl SamplerKey {
    /// Sprite halves must not bleed into each other
    pub const FACE: Self = Self { nearest: true, wrap_u: TextureWrap::ClampToEdge, wrap_v: TextureWrap::ClampToEdge };

    pub fn for_material(material: &Material) -> Self {
        let [wrap_u, wrap_v] = material.wrap;
        Self { nearest: material.nearest_filter, wrap_u, wrap_v }
    }

    pub fn descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        let filter = if self.nearest { wgpu::FilterMode::Nearest } else { wgpu::FilterMode::Linear };
        wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: address_mode(self.wrap_u),
            address_mode_v: address_mode(self.wrap_v),
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        }
    }
}

fn address_mode(wrap: TextureWrap) -> wgpu::AddressMode {
    match wrap {
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
        TextureWrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        TextureWrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

/// Samplers created on first use, one per distinct key
pub struct Samplers {
    face: wgpu::Sampler,
    cache: HashMap<SamplerKey, wgpu::Sampler>,
}

impl Samplers {
    pub fn new(device: &wgpu::Device) -> Self {
        Self { face: device.create_sampler(&SamplerKey::FACE.descriptor()), cache: HashMap::new() }
    }

    pub fn face(&self) -> &wgpu::Sampler {
        &self.face
    }

    pub fn get(&mut self, device: &wgpu::Device, key: SamplerKey) -> &wgpu::Sampler {
        self.cache
            .entry(key)
            .or_insert_with(|| device.create_sampler(&key.descriptor()))
    }
}

#[cfg(target_arch = "wasm32")]
pub use video::VideoFace;

#[cfg(target_arch = "wasm32")]
mod video {
    use super::GpuTexture;
    use web_sys::HtmlVideoElement;

    /// `HTMLMediaElement.HAVE_CURRENT_DATA`
    const HAVE_CURRENT_DATA: u16 = 2;

    /// Streams frames of a `<video>` element into the face texture
    pub struct VideoFace {
        video: HtmlVideoElement,
        size: Option<(u32, u32)>,
    }

    impl VideoFace {
        pub fn new(video: HtmlVideoElement) -> Self {
            Self { video, size: None }
        }

        /// Copy the current video frame into `texture`.
        ///
        /// Returns a new texture when the video size changed (or on the first
        /// frame); the caller must rebind it. Does nothing until the video has data.
        pub fn copy_frame(
            &mut self,
            device: &wgpu::Device,
            queue: &wgpu::Queue,
            texture: &GpuTexture,
        ) -> Option<GpuTexture> {
            if self.video.ready_state() < HAVE_CURRENT_DATA {
                return None;
            }
            let size = (self.video.video_width(), self.video.video_height());
            if size.0 == 0 || size.1 == 0 {
                return None;
            }

            let replacement = if self.size != Some(size) {
                tracing::info!(width = size.0, height = size.1, "video face size changed");
                self.size = Some(size);
                Some(GpuTexture::empty(device, size.0, size.1, "video_face", true))
            } else {
                None
            };
            let target = replacement.as_ref().unwrap_or(texture);

            queue.copy_external_image_to_texture(
                &wgpu::CopyExternalImageSourceInfo {
                    source: wgpu::ExternalImageSource::HTMLVideoElement(self.video.clone()),
                    origin: wgpu::Origin2d::ZERO,
                    flip_y: false,
                },
                wgpu::CopyExternalImageDestInfo {
                    texture: &target.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                    color_space: wgpu::PredefinedColorSpace::Srgb,
                    premultiplied_alpha: false,
                },
                wgpu::Extent3d { width: size.0, height: size.1, depth_or_array_layers: 1 },
            );
            replacement
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_keeps_row_order() {
        let mut img = image::RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 1, image::Rgba([0, 0, 255, 128]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode");

        let decoded = decode_image(&bytes).expect("decode");
        assert_eq!((decoded.width, decoded.height), (2, 2));
        assert_eq!(&decoded.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&decoded.pixels[12..16], &[0, 0, 255, 128]);
    }

    #[test]
    fn test_material_sampler_follows_wrap() {
        let material = Material::default();
        let desc = SamplerKey::for_material(&material).descriptor();
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Linear);

        let tiled = Material {
            wrap: [TextureWrap::MirroredRepeat, TextureWrap::ClampToEdge],
            nearest_filter: true,
            ..Material::default()
        };
        let desc = SamplerKey::for_material(&tiled).descriptor();
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::MirrorRepeat);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Nearest);
    }

    #[test]
    fn test_face_sampler_clamps() {
        let desc = SamplerKey::FACE.descriptor();
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Nearest);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_image(b"not an image"), Err(ViewerError::ImageDecode(_))));
    }
}
