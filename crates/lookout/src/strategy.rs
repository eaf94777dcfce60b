//! Pluggable per-frame motion scoring.
//!
//! A strategy consumes the edge-detected grayscale frames of one
//! segment in order and scores each against the frames before it. The
//! frame geometry is fixed by the capture invocation (640x480, one
//! byte per pixel).
//!
//! Strategies:
//! - `intensity-delta`: absolute difference of whole-frame summed
//!   intensity, one scalar per frame. Cheap and the default.
//! - `sign-change`: counts pixels whose on/off state flipped against a
//!   short window of prior frames, optionally suppressing isolated
//!   pixels.
//! - `block`: partitions the frame into square blocks and counts
//!   blocks whose summed per-pixel difference crosses a threshold.

use lookoutconf::MotionConfig;
use tracing::warn;

pub const FRAME_WIDTH: usize = 640;
pub const FRAME_HEIGHT: usize = 480;
pub const FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Scores consecutive decoded frames for motion. `feed` returns
/// `Some(magnitude)` when the frame crosses the strategy's threshold.
/// The first frame primes internal state and is never flagged.
pub trait MotionStrategy: Send {
    fn feed(&mut self, frame: &[u8]) -> Option<u64>;
}

/// Build the configured strategy. Unknown names fall back to
/// `intensity-delta` with a warning.
pub fn for_config(cfg: &MotionConfig) -> Box<dyn MotionStrategy> {
    match cfg.strategy.as_str() {
        "intensity-delta" => Box::new(IntensityDelta::new(cfg.threshold)),
        "sign-change" => Box::new(SignChange::new(cfg.min_active_pixels, cfg.noise_filter)),
        "block" => Box::new(BlockDelta::new(
            cfg.block_size,
            cfg.block_threshold,
            cfg.min_active_blocks,
            cfg.noise_filter,
        )),
        other => {
            warn!("unknown motion strategy {other:?}, using intensity-delta");
            Box::new(IntensityDelta::new(cfg.threshold))
        }
    }
}

/// Whole-frame summed-intensity difference.
pub struct IntensityDelta {
    threshold: u64,
    prev_sum: Option<u64>,
}

impl IntensityDelta {
    pub fn new(threshold: u64) -> Self {
        IntensityDelta {
            threshold,
            prev_sum: None,
        }
    }
}

impl MotionStrategy for IntensityDelta {
    fn feed(&mut self, frame: &[u8]) -> Option<u64> {
        let sum: u64 = frame.iter().map(|&b| b as u64).sum();
        let prev = self.prev_sum.replace(sum)?;
        let diff = prev.abs_diff(sum);
        (diff > self.threshold).then_some(diff)
    }
}

/// Per-pixel on/off sign changes against a two-frame window.
///
/// A pixel is active when its lit/unlit state differs from the same
/// pixel in every window frame. With `suppress_isolated`, active
/// pixels with no active 8-neighbor are dropped as sensor noise.
pub struct SignChange {
    min_active_pixels: usize,
    suppress_isolated: bool,
    window: Vec<Vec<u8>>,
}

const SIGN_CHANGE_WINDOW: usize = 2;

impl SignChange {
    pub fn new(min_active_pixels: usize, suppress_isolated: bool) -> Self {
        SignChange {
            min_active_pixels,
            suppress_isolated,
            window: Vec::new(),
        }
    }

    fn push_window(&mut self, frame: &[u8]) {
        if self.window.len() >= SIGN_CHANGE_WINDOW {
            self.window.remove(0);
        }
        self.window.push(frame.to_vec());
    }
}

impl MotionStrategy for SignChange {
    fn feed(&mut self, frame: &[u8]) -> Option<u64> {
        if self.window.is_empty() {
            self.push_window(frame);
            return None;
        }

        let mut active = vec![0u8; FRAME_BYTES];
        let mut count: u64 = 0;
        for idx in 0..FRAME_BYTES.min(frame.len()) {
            let lit = frame[idx] > 0;
            let flipped = self.window.iter().all(|prev| (prev[idx] > 0) != lit);
            if flipped {
                active[idx] = frame[idx].max(1);
                count += 1;
            }
        }

        if self.suppress_isolated {
            count = 0;
            for h in 0..FRAME_HEIGHT {
                for w in 0..FRAME_WIDTH {
                    let idx = h * FRAME_WIDTH + w;
                    if active[idx] == 0 {
                        continue;
                    }
                    let mut has_adjacent = false;
                    for dh in -1i64..=1 {
                        for dw in -1i64..=1 {
                            if dh == 0 && dw == 0 {
                                continue;
                            }
                            let hh = h as i64 + dh;
                            let ww = w as i64 + dw;
                            if hh < 0
                                || hh >= FRAME_HEIGHT as i64
                                || ww < 0
                                || ww >= FRAME_WIDTH as i64
                            {
                                continue;
                            }
                            if active[hh as usize * FRAME_WIDTH + ww as usize] > 0 {
                                has_adjacent = true;
                            }
                        }
                    }
                    if has_adjacent {
                        count += 1;
                    }
                }
            }
        }

        self.push_window(frame);
        (count > self.min_active_pixels as u64).then_some(count)
    }
}

/// Block-partitioned differencing: the frame is divided into square
/// blocks and a block is active when its summed per-pixel difference
/// from the prior frame exceeds `block_threshold`. With `noise_filter`
/// a block also needs at least 10% of its pixels individually changed.
pub struct BlockDelta {
    block_size: usize,
    block_threshold: u64,
    min_active_blocks: usize,
    noise_filter: bool,
    prev: Option<Vec<u8>>,
}

impl BlockDelta {
    pub fn new(
        block_size: usize,
        block_threshold: u64,
        min_active_blocks: usize,
        noise_filter: bool,
    ) -> Self {
        BlockDelta {
            block_size: block_size.max(1),
            block_threshold,
            min_active_blocks,
            noise_filter,
            prev: None,
        }
    }
}

impl MotionStrategy for BlockDelta {
    fn feed(&mut self, frame: &[u8]) -> Option<u64> {
        let prev = match self.prev.replace(frame.to_vec()) {
            Some(p) => p,
            None => return None,
        };

        let blocks_wide = FRAME_WIDTH / self.block_size;
        let blocks_high = FRAME_HEIGHT / self.block_size;

        let mut active_blocks: u64 = 0;
        for by in 0..blocks_high {
            for bx in 0..blocks_wide {
                let mut block_sum: u64 = 0;
                let mut pixel_changes = 0usize;
                let mut total_pixels = 0usize;

                for y in 0..self.block_size {
                    for x in 0..self.block_size {
                        let h = by * self.block_size + y;
                        let w = bx * self.block_size + x;
                        if h >= FRAME_HEIGHT || w >= FRAME_WIDTH {
                            continue;
                        }
                        total_pixels += 1;
                        let idx = h * FRAME_WIDTH + w;
                        let diff = prev[idx].abs_diff(frame[idx]) as u64;
                        if diff > 10 {
                            pixel_changes += 1;
                        }
                        block_sum += diff;
                    }
                }

                // isolated hot pixels can push a block over the sum
                // threshold; require a spread of changed pixels
                if self.noise_filter && total_pixels > 0 && pixel_changes < total_pixels / 10 {
                    block_sum = 0;
                }

                if block_sum > self.block_threshold {
                    active_blocks += 1;
                }
            }
        }

        (active_blocks >= self.min_active_blocks as u64).then_some(active_blocks)
    }
}
