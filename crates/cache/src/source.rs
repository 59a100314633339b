//! Where tile content comes from
//!
//! A [`ContentSource`] produces one image for a cell at a requested size. It
//! runs on a fetch worker, so it may block; long-running sources should poll
//! the cancellation token and give up early.

use std::thread;
use std::time::{Duration, Instant};

use tilegrid_core::{CancellationToken, Coordinate, LoadError, LoadResult, TileContent};

/// What a worker asks a source for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: String,
    pub coordinate: Coordinate,
    /// Edge length in pixels; the image must be at least this large
    pub pixel_size: u32,
    /// Picture to reproduce, from an earlier smaller fetch of the same key
    pub variant: Option<String>,
}

/// A fetched image and the variant that identifies its picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub content: TileContent,
    pub variant: Option<String>,
    /// Set when the source cannot produce this picture any larger, so a
    /// bigger request should be served from this image instead of refetching
    pub complete: bool,
}

pub trait ContentSource: Send + Sync + 'static {
    fn fetch(&self, request: &FetchRequest, token: &CancellationToken)
        -> LoadResult<FetchedContent>;
}

/// Deterministic procedural images
///
/// Each key maps to a picture: a two-colour checkerboard whose colours and
/// cell size derive from a 64-bit seed. The seed is the variant, written as
/// hex, so asking again with the variant redraws the same picture at any size.
#[derive(Debug, Clone)]
pub struct PatternSource {
    latency: Duration,
    max_pixel_size: u32,
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSource {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            max_pixel_size: 1024,
        }
    }

    /// Pretend every fetch takes `latency`; cancellation ends the wait early
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Cap on the rendered edge length
    pub fn with_max_pixel_size(mut self, max: u32) -> Self {
        self.max_pixel_size = max.max(1);
        self
    }

    /// Seed for a key that has not been fetched before
    pub fn seed_for_key(key: &str) -> u64 {
        // FNV-1a
        key.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }

    /// Render the picture for `seed` at `side` x `side` pixels
    pub fn render(seed: u64, side: u32) -> TileContent {
        let [r0, g0, b0, r1, g1, b1, cells, _] = seed.to_le_bytes();
        let cells = u32::from(cells % 6) + 2;
        let cell = (side / cells).max(1);

        let mut pixels = Vec::with_capacity((side as usize) * (side as usize) * 4);
        for y in 0..side {
            for x in 0..side {
                let light = ((x / cell) + (y / cell)) % 2 == 0;
                let (r, g, b) = if light { (r0, g0, b0) } else { (r1, g1, b1) };
                pixels.extend_from_slice(&[r, g, b, 255]);
            }
        }
        TileContent::new(pixels, side, side)
    }

    fn wait(&self, token: &CancellationToken) -> bool {
        if self.latency.is_zero() {
            return !token.is_cancelled();
        }
        let deadline = Instant::now() + self.latency;
        while Instant::now() < deadline {
            if token.is_cancelled() {
                return false;
            }
            thread::sleep(Duration::from_millis(1).min(self.latency));
        }
        !token.is_cancelled()
    }
}

impl ContentSource for PatternSource {
    fn fetch(
        &self,
        request: &FetchRequest,
        token: &CancellationToken,
    ) -> LoadResult<FetchedContent> {
        if !self.wait(token) {
            return Err(LoadError::Cancelled);
        }
        if request.pixel_size == 0 {
            return Err(LoadError::Decode {
                key: request.key.clone(),
                reason: "zero-sized image".to_string(),
            });
        }

        let seed = match request.variant.as_deref() {
            Some(variant) => u64::from_str_radix(variant, 16).map_err(|_| LoadError::Fetch {
                key: request.key.clone(),
                reason: format!("unknown variant {variant:?}"),
            })?,
            None => Self::seed_for_key(&request.key),
        };

        let side = request.pixel_size.min(self.max_pixel_size);
        Ok(FetchedContent {
            content: Self::render(seed, side),
            variant: Some(format!("{seed:016x}")),
            complete: side == self.max_pixel_size,
        })
    }
}
