/// Number of equal horizontal frames in the face sprite sheet
pub const SPRITE_FRAMES: usize = 2;

/// Which half of the sprite sheet is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceFrame {
    Open = 0,
    Closed = 1,
}

impl FaceFrame {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// UV offset/repeat applied as `uv * repeat + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    pub offset: [f32; 2],
    pub repeat: [f32; 2],
}

impl UvTransform {
    pub const IDENTITY: Self = Self { offset: [0.0, 0.0], repeat: [1.0, 1.0] };

    /// Address frame `index` of `frames` equal horizontal slices
    pub fn horizontal_frame(index: usize, frames: usize) -> Self {
        let width = 1.0 / frames.max(1) as f32;
        Self {
            offset: [index as f32 * width, 0.0],
            repeat: [width, 1.0],
        }
    }

    pub fn apply(&self, uv: [f32; 2]) -> [f32; 2] {
        [
            uv[0] * self.repeat[0] + self.offset[0],
            uv[1] * self.repeat[1] + self.offset[1],
        ]
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.offset[0], self.offset[1], self.repeat[0], self.repeat[1]]
    }
}

/// Picks the sprite frame from wall-clock time.
///
/// Frame 0 is held for `frame_ms`, frame 1 for `gap_ms`, then the cycle repeats.
/// There is no blending between frames.
#[derive(Debug, Clone, Copy)]
pub struct FaceFrameSelector {
    pub frame_ms: f64,
    pub gap_ms: f64,
}

impl FaceFrameSelector {
    pub fn new(frame_ms: f64, gap_ms: f64) -> Self {
        Self { frame_ms, gap_ms }
    }

    pub fn period_ms(&self) -> f64 {
        self.frame_ms + self.gap_ms
    }

    pub fn frame_at(&self, now_ms: f64) -> FaceFrame {
        let period = self.period_ms();
        if period <= 0.0 {
            return FaceFrame::Open;
        }
        let elapsed = now_ms.rem_euclid(period);
        if elapsed < self.frame_ms {
            FaceFrame::Open
        } else {
            FaceFrame::Closed
        }
    }

    pub fn uv_at(&self, now_ms: f64) -> UvTransform {
        UvTransform::horizontal_frame(self.frame_at(now_ms).index(), SPRITE_FRAMES)
    }
}

/// Milliseconds since the Unix epoch
pub fn wall_clock_ms() -> f64 {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            js_sys::Date::now()
        } else {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or(0.0)
        }
    }
}
