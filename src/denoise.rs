// src/denoise.rs - Body-label mask cleanup
use crate::frame::{BodyLabelFrame, NO_BODY};
use serde::{Deserialize, Serialize};

/// How a label pixel is validated against its neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoisePolicy {
    /// Median of the 3x3 neighborhood, center included.
    #[default]
    MedianOfNine,
    /// Keep the label only when the upper-left, right and lower neighbors all
    /// agree with it. Cheaper, but erodes one pixel from every side.
    ExactMatchOfThree,
}

/// Cleans the raw label mask. Pixels without a full 3x3 neighborhood are
/// written as `NO_BODY` under every policy.
#[derive(Debug, Clone)]
pub struct MaskDenoiser {
    policy: DenoisePolicy,
}

impl MaskDenoiser {
    pub fn new(policy: DenoisePolicy) -> Self {
        Self { policy }
    }

    pub fn denoise(&self, raw: &BodyLabelFrame) -> BodyLabelFrame {
        let mut cleaned = BodyLabelFrame::empty(raw.size());
        self.denoise_into(raw, &mut cleaned);
        cleaned
    }

    /// Writes the cleaned mask into `out`, which must have the same size as
    /// `raw`; otherwise `out` is left untouched.
    pub fn denoise_into(&self, raw: &BodyLabelFrame, out: &mut BodyLabelFrame) {
        if raw.size() != out.size() {
            return;
        }
        let (w, h) = (raw.width(), raw.height());
        let src = raw.as_slice();
        let dst = out.as_mut_slice();
        dst.fill(NO_BODY);
        if w < 3 || h < 3 {
            return;
        }

        let mut window = [0u8; 9];
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let center = y * w + x;
                dst[center] = match self.policy {
                    DenoisePolicy::MedianOfNine => {
                        for (j, row) in window.chunks_exact_mut(3).enumerate() {
                            let start = (y + j - 1) * w + x - 1;
                            row.copy_from_slice(&src[start..start + 3]);
                        }
                        window.sort_unstable();
                        window[4]
                    }
                    DenoisePolicy::ExactMatchOfThree => {
                        let label = src[center];
                        let agree = src[center - w - 1] == label
                            && src[center + 1] == label
                            && src[center + w] == label;
                        if agree {
                            label
                        } else {
                            NO_BODY
                        }
                    }
                };
            }
        }
    }
}
