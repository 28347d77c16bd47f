//! Per-period coarse resampler: proportional nearest-neighbor frame
//! duplication/decimation, not a pitch-preserving stretch.
//!
//! A float cursor advancing by `frame_skip`/`frame_dup` per output frame
//! would drift over a long period; this is reformulated as a direct
//! output-frame-to-source-frame mapping, `s = floor(o * F / out_frames)`,
//! with `out_frames` computed once up front as `round(F * 8 / numerator)`.
//! This is the same proportional nearest-neighbor selection a float walk
//! performs, but keeps the output length exactly `round(F*8/numerator(s))`
//! for every F rather than letting it depend on inner-loop rounding.

use crate::rate::PlaybackState;

/// Reusable per-engine output buffer, sized for the most extreme state
/// (`BUFFER_1_8`, 1/8 rate -> 8x output frames) so no per-write allocation
/// is ever needed.
pub struct Resampler {
    scratch: Vec<u8>,
    frame_bytes: usize,
    max_source_frames: usize,
}

impl Resampler {
    pub fn new(frame_bytes: usize, max_source_frames: usize) -> Self {
        Resampler {
            scratch: vec![0u8; max_source_frames * 8 * frame_bytes],
            frame_bytes,
            max_source_frames,
        }
    }

    /// `round(F * 8 / numerator)`, i.e. `round(F / rate())`.
    pub fn output_frames(source_frames: usize, numerator: u32) -> usize {
        ((source_frames as f64 * 8.0) / numerator as f64).round() as usize
    }

    /// Resamples one source period to the rate implied by `state`. Returns
    /// `None` (and leaves `src` untouched by the caller) if `source_frames`
    /// exceeds what the preallocated scratch buffer can hold for the
    /// worst-case state — a capacity check standing in for a fallible
    /// allocation.
    pub fn resample<'a>(
        &'a mut self,
        src: &'a [u8],
        source_frames: usize,
        state: PlaybackState,
    ) -> Option<&'a [u8]> {
        if source_frames > self.max_source_frames {
            return None;
        }
        // PLAY short-circuits: no copy into scratch, straight passthrough.
        if state == PlaybackState::Play {
            return Some(&src[..source_frames * self.frame_bytes]);
        }

        let numerator = state.numerator();
        let out_frames = Self::output_frames(source_frames, numerator).max(1);
        let fb = self.frame_bytes;

        for o in 0..out_frames {
            let s = (o * source_frames) / out_frames;
            let s = s.min(source_frames.saturating_sub(1));
            let src_off = s * fb;
            let dst_off = o * fb;
            self.scratch[dst_off..dst_off + fb].copy_from_slice(&src[src_off..src_off + fb]);
        }
        Some(&self.scratch[..out_frames * fb])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::PlaybackState::*;

    const FB: usize = 4; // stereo 16-bit

    fn make_source(frames: usize) -> Vec<u8> {
        (0..frames * FB).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn length_law_holds_for_every_state() {
        let states = [
            Buffer1_8, Buffer2_8, Buffer4_8, Buffer6_8, Buffer7_8, Play, Purge10_8, Purge12_8,
            Purge16_8, Purge32_8,
        ];
        for f in [2usize, 3, 17, 256, 1000] {
            let src = make_source(f);
            let mut rs = Resampler::new(FB, 1000);
            for &s in &states {
                let want = ((f as f64 * 8.0) / s.numerator() as f64).round() as usize;
                let out = rs.resample(&src, f, s).unwrap();
                assert_eq!(out.len() / FB, want.max(1), "state={s:?} f={f}");
            }
        }
    }

    #[test]
    fn play_is_idempotent_byte_equal_copy() {
        let src = make_source(256);
        let mut rs = Resampler::new(FB, 256);
        let out = rs.resample(&src, 256, Play).unwrap();
        assert_eq!(out, &src[..]);
    }

    #[test]
    fn monotone_source_walk() {
        let f = 100;
        let src = make_source(f);
        let mut rs = Resampler::new(FB, f);
        for state in [Buffer1_8, Buffer7_8, Purge10_8, Purge32_8] {
            let out_frames = Resampler::output_frames(f, state.numerator()).max(1);
            let mut last_s = 0usize;
            for o in 0..out_frames {
                let s = (o * f) / out_frames;
                assert!(s >= last_s);
                last_s = s;
            }
            let _ = rs.resample(&src, f, state);
        }
    }

    #[test]
    fn buffer_1_8_duplicates_roughly_eight_to_one() {
        let f = 64;
        let src = make_source(f);
        let mut rs = Resampler::new(FB, f);
        let out = rs.resample(&src, f, Buffer1_8).unwrap();
        assert_eq!(out.len() / FB, f * 8);
    }

    #[test]
    fn purge_32_8_decimates_to_one_eighth() {
        let f = 256;
        let src = make_source(f);
        let mut rs = Resampler::new(FB, f);
        let out = rs.resample(&src, f, Purge32_8).unwrap();
        assert_eq!(out.len() / FB, f / 4);
    }

    #[test]
    fn oversized_source_is_rejected_not_allocated() {
        let f = 10;
        let src = make_source(f);
        let mut rs = Resampler::new(FB, 8);
        assert!(rs.resample(&src, f, Play).is_none());
    }
}
