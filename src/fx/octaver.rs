use std::f32::consts::PI;

/// Analog-style octave-down generator.
///
/// The input is low-passed so the dividers see one zero crossing per
/// fundamental period, then two flip-flops halve the frequency once and
/// twice. Each divider output is the filtered signal with its sign flipped
/// by the corresponding flip-flop, mixed with the dry input.
pub struct Octaver {
    cutoff_hz: f32,
    dry: f32,
    octave1: f32,
    octave2: f32,

    sample_rate: f32,
    lp1: f32,
    lp2: f32,
    prev_sign_positive: bool,
    flip1: f32,
    flip2: f32,
    crossing_count: u8,
}

impl Octaver {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            cutoff_hz: 250.0,
            dry: 1.0,
            octave1: 0.5,
            octave2: 0.0,
            sample_rate,
            lp1: 0.0,
            lp2: 0.0,
            prev_sign_positive: false,
            flip1: 1.0,
            flip2: 1.0,
            crossing_count: 0,
        }
    }

    pub fn set_cutoff_hz(&mut self, hz: f32) {
        self.cutoff_hz = hz.clamp(40.0, 1000.0);
    }

    pub fn set_levels(&mut self, dry: f32, octave1: f32, octave2: f32) {
        self.dry = dry.clamp(0.0, 1.0);
        self.octave1 = octave1.clamp(0.0, 1.0);
        self.octave2 = octave2.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        // Two cascaded one-poles keep harmonics away from the dividers.
        let dt = 1.0 / self.sample_rate;
        let alpha = dt / (dt + 1.0 / (2.0 * PI * self.cutoff_hz));
        self.lp1 += alpha * (input - self.lp1);
        self.lp2 += alpha * (self.lp1 - self.lp2);
        let tracked = self.lp2;

        // Rising zero crossing toggles the first divider; every second
        // toggle advances the second.
        let positive = tracked > 0.0;
        if positive && !self.prev_sign_positive {
            self.flip1 = -self.flip1;
            self.crossing_count = self.crossing_count.wrapping_add(1);
            if self.crossing_count % 2 == 0 {
                self.flip2 = -self.flip2;
            }
        }
        self.prev_sign_positive = positive;

        self.dry * input + self.octave1 * tracked * self.flip1 + self.octave2 * tracked * self.flip2
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / 48000.0).sin())
            .collect()
    }

    /// Count rising zero crossings as a crude pitch estimate.
    fn crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count()
    }

    #[test]
    fn dry_only_passes_input() {
        let mut fx = Octaver::new(48000.0);
        fx.set_levels(1.0, 0.0, 0.0);
        let input = sine(110.0, 4800);
        let mut block = input.clone();
        fx.process_block(&mut block);
        assert_eq!(block, input);
    }

    #[test]
    fn octave_down_halves_the_pitch() {
        let mut fx = Octaver::new(48000.0);
        fx.set_levels(0.0, 1.0, 0.0);
        fx.set_cutoff_hz(200.0);

        // One second of 110 Hz: the divider output should cross at ~55 Hz.
        let mut block = sine(110.0, 48000);
        fx.process_block(&mut block);
        let rate = crossings(&block[4800..]);
        assert!(
            (45..=65).contains(&rate),
            "expected ~55 rising crossings, got {rate}"
        );
    }

    #[test]
    fn second_divider_quarters_the_pitch() {
        let mut fx = Octaver::new(48000.0);
        fx.set_levels(0.0, 0.0, 1.0);
        fx.set_cutoff_hz(200.0);

        let mut block = sine(110.0, 48000);
        fx.process_block(&mut block);
        let rate = crossings(&block[4800..]);
        assert!(
            (20..=35).contains(&rate),
            "expected ~27 rising crossings, got {rate}"
        );
    }
}
