//! Delta tracking: how far the actual playback delay sits from the target,
//! expressed first in periods then in milliseconds.

/// `hw_periods - avail_playback_frames / period_frames`.
pub fn periods_in_hw_playback_ring(hw_periods: usize, avail_playback_frames: usize, period_frames: usize) -> usize {
    let queued_frames = hw_periods.saturating_mul(period_frames).saturating_sub(avail_playback_frames);
    queued_frames / period_frames
}

/// `periods_in_mem_ring + periods_in_hw_playback_ring`.
pub fn actual_delta_p(periods_in_mem_ring: usize, periods_in_hw_playback_ring: usize) -> usize {
    periods_in_mem_ring + periods_in_hw_playback_ring
}

/// `((target_delta_p - actual_delta_p) * period_time_us) / 1000`, signed.
pub fn time_off_ms(target_delta_p: i64, actual_delta_p: i64, period_time_us: u64) -> i64 {
    (target_delta_p - actual_delta_p) * period_time_us as i64 / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hw_playback_periods_from_avail() {
        // hw_periods=4, period_frames=256, avail=256*2 free -> 2 periods queued
        assert_eq!(periods_in_hw_playback_ring(4, 512, 256), 2);
    }

    #[test]
    fn hw_ring_fully_drained_when_avail_equals_capacity() {
        assert_eq!(periods_in_hw_playback_ring(4, 1024, 256), 0);
    }

    #[test]
    fn actual_delta_identity() {
        assert_eq!(actual_delta_p(0, 4), 4);
        assert_eq!(actual_delta_p(469, 4), 473);
    }

    #[test]
    fn actual_delta_stays_within_n_plus_hw_periods() {
        // N=512 periods max in mem ring, hw_periods=4
        let n = 512usize;
        let hw_periods = 4usize;
        for mem in [0usize, 1, n - 1] {
            for hw in 0..=hw_periods {
                let d = actual_delta_p(mem, hw);
                assert!(d <= n + hw_periods);
            }
        }
    }

    #[test]
    fn time_off_sign_matches_direction() {
        // target greater than actual -> positive (need to stretch)
        assert!(time_off_ms(469, 0, 5333) > 0);
        // target less than actual -> negative (need to compress)
        assert!(time_off_ms(235, 469, 5333) < 0);
        assert_eq!(time_off_ms(100, 100, 5333), 0);
    }

    #[test]
    fn cold_start_scenario_matches_worked_example() {
        // N=512, F=256, rate=48000 -> period_time_us ~= 5333
        // target_delay=2500ms -> target_delta_p ~= 469
        let period_time_us = 256u64 * 1_000_000 / 48_000;
        let target_delta_p = (2500i64 * 1000) / period_time_us as i64;
        assert_eq!(target_delta_p, 469);
        // cold start: cap=play=0, hw ring empty too (no periods queued yet)
        let actual = actual_delta_p(0, 0);
        let off = time_off_ms(target_delta_p, actual as i64, period_time_us);
        assert!(off > 0);
    }
}
