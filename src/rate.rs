//! The rate selector: maps signed `time_off_ms` to one of the nine
//! playback-rate states, with a hysteresis band around PLAY.

/// Hysteresis half-width around zero, in ms (see DESIGN.md Open Question
/// decisions for why 11 exactly).
pub const H_MS: i64 = 11;

/// Playback-rate state. The discriminant doubles as the rate numerator
/// over 8, which is what makes `numerator()`/`rate()` trivial.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Buffer1_8 = 1,
    Buffer2_8 = 2,
    Buffer4_8 = 4,
    Buffer6_8 = 6,
    Buffer7_8 = 7,
    Play = 8,
    Purge10_8 = 10,
    Purge12_8 = 12,
    Purge16_8 = 16,
    Purge32_8 = 32,
}

impl PlaybackState {
    pub fn numerator(self) -> u32 {
        self as u32
    }

    /// Rate as out/in, e.g. `Buffer1_8` -> 0.125.
    pub fn rate(self) -> f64 {
        self.numerator() as f64 / 8.0
    }
}

/// Selects a state from the signed time-off error against a fixed
/// threshold table. Recomputed fresh each call; the previous state has no
/// bearing beyond what the hysteresis band around zero already encodes.
pub fn select(time_off_ms: i64) -> PlaybackState {
    select_with_hysteresis(time_off_ms, H_MS)
}

/// Same as [`select`] but with an explicit hysteresis half-width, for tests
/// that want to pin down the `+100 ms` boundary case.
pub fn select_with_hysteresis(time_off_ms: i64, h_ms: i64) -> PlaybackState {
    use PlaybackState::*;
    match time_off_ms {
        t if t < -5000 => Purge32_8,
        t if t < -1500 => Purge16_8,
        t if t < -500 => Purge12_8,
        t if t < -h_ms => Purge10_8,
        t if t < h_ms => Play,
        t if t < 300 => Buffer7_8,
        t if t < 1000 => Buffer6_8,
        t if t < 3000 => Buffer4_8,
        t if t < 6000 => Buffer2_8,
        _ => Buffer1_8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerators_match_table() {
        assert_eq!(PlaybackState::Buffer1_8.numerator(), 1);
        assert_eq!(PlaybackState::Buffer2_8.numerator(), 2);
        assert_eq!(PlaybackState::Buffer4_8.numerator(), 4);
        assert_eq!(PlaybackState::Buffer6_8.numerator(), 6);
        assert_eq!(PlaybackState::Buffer7_8.numerator(), 7);
        assert_eq!(PlaybackState::Play.numerator(), 8);
        assert_eq!(PlaybackState::Purge10_8.numerator(), 10);
        assert_eq!(PlaybackState::Purge12_8.numerator(), 12);
        assert_eq!(PlaybackState::Purge16_8.numerator(), 16);
        assert_eq!(PlaybackState::Purge32_8.numerator(), 32);
    }

    #[test]
    fn hysteresis_band_always_plays() {
        for t in -10..=10 {
            assert_eq!(select(t), PlaybackState::Play);
        }
    }

    #[test]
    fn selector_sweep_matches_worked_example() {
        // With H=11 the +100 case resolves to Buffer7_8 (100 > H), not Play.
        let inputs = [-6000, -2000, -1000, -100, 0, 100, 500, 2000, 4000, 7000];
        let expected = [
            PlaybackState::Purge32_8,
            PlaybackState::Purge16_8,
            PlaybackState::Purge12_8,
            PlaybackState::Purge10_8,
            PlaybackState::Play,
            PlaybackState::Buffer7_8,
            PlaybackState::Buffer7_8,
            PlaybackState::Buffer4_8,
            PlaybackState::Buffer2_8,
            PlaybackState::Buffer1_8,
        ];
        for (t, want) in inputs.iter().zip(expected.iter()) {
            assert_eq!(select(*t), *want, "time_off_ms={t}");
        }
    }

    #[test]
    fn boundaries_fall_in_higher_numbered_bin() {
        assert_eq!(select(-5000), PlaybackState::Purge16_8);
        assert_eq!(select(-1500), PlaybackState::Purge12_8);
        assert_eq!(select(-500), PlaybackState::Purge10_8);
        assert_eq!(select(-H_MS), PlaybackState::Play);
        assert_eq!(select(H_MS), PlaybackState::Buffer7_8);
        assert_eq!(select(300), PlaybackState::Buffer6_8);
        assert_eq!(select(1000), PlaybackState::Buffer4_8);
        assert_eq!(select(3000), PlaybackState::Buffer2_8);
        assert_eq!(select(6000), PlaybackState::Buffer1_8);
    }

    #[test]
    fn explicit_hysteresis_of_100_makes_100_still_fall_outside() {
        // H=100 means the band is [-100,100), so the boundary value 100
        // itself is excluded and falls to Buffer7_8.
        assert_eq!(select_with_hysteresis(100, 100), PlaybackState::Buffer7_8);
        assert_eq!(select_with_hysteresis(99, 100), PlaybackState::Play);
    }
}
