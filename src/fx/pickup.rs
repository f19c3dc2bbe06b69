use std::f32::consts::PI;

/// Single-coil to humbucker tone transformer.
///
/// A variable bass cut removes the single-coil low-end bloom, then the
/// humbucker blend crossfades toward a darker, mid-pushed voicing built
/// from a low-pass and a presence dip.
pub struct PickupTransformer {
    basscut: f32,
    humbuckerize: f32,

    sample_rate: f32,
    hp_lp: f32,
    voice_lp: f32,
    dip_lp: f32,
}

impl PickupTransformer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            basscut: 0.0,
            humbuckerize: 0.0,
            sample_rate,
            hp_lp: 0.0,
            voice_lp: 0.0,
            dip_lp: 0.0,
        }
    }

    /// Normalized bass-cut amount; 0 leaves the low end alone, 1 cuts up
    /// to ~720 Hz.
    pub fn set_basscut(&mut self, amount: f32) {
        self.basscut = amount.clamp(0.0, 1.0);
    }

    /// Crossfade between the untouched single-coil signal (0) and the
    /// humbucker voicing (1).
    pub fn set_humbuckerize(&mut self, amount: f32) {
        self.humbuckerize = amount.clamp(0.0, 1.0);
    }

    #[inline]
    fn alpha(&self, f: f32) -> f32 {
        let dt = 1.0 / self.sample_rate;
        dt / (dt + 1.0 / (2.0 * PI * f))
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        // Bass cut: one-pole high-pass with a sweepable corner.
        let hp_freq = 20.0 + self.basscut * 700.0;
        let a = self.alpha(hp_freq);
        self.hp_lp += a * (input - self.hp_lp);
        let cut = input - self.hp_lp;

        if self.humbuckerize <= 0.0 {
            return cut;
        }

        // Humbucker voicing: roll off the sparkle, dip the presence band.
        let a_voice = self.alpha(3200.0);
        self.voice_lp += a_voice * (cut - self.voice_lp);
        let a_dip = self.alpha(900.0);
        self.dip_lp += a_dip * (cut - self.dip_lp);
        let presence = self.dip_lp - self.voice_lp;
        let voiced = (self.voice_lp + 0.4 * presence) * 1.15;

        cut + (voiced - cut) * self.humbuckerize
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

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn neutral_settings_touch_little() {
        let mut fx = PickupTransformer::new(48000.0);
        let mut block = sine(440.0, 9600);
        let input_rms = rms(&block[4800..]);
        fx.process_block(&mut block);
        let output_rms = rms(&block[4800..]);
        assert!((output_rms / input_rms - 1.0).abs() < 0.05);
    }

    #[test]
    fn basscut_attenuates_lows() {
        let mut fx = PickupTransformer::new(48000.0);
        fx.set_basscut(1.0);
        let mut low = sine(80.0, 48000);
        fx.process_block(&mut low);
        assert!(rms(&low[24000..]) < 0.3);

        let mut fx = PickupTransformer::new(48000.0);
        fx.set_basscut(1.0);
        let mut high = sine(3000.0, 48000);
        fx.process_block(&mut high);
        assert!(rms(&high[24000..]) > 0.5);
    }

    #[test]
    fn humbucker_voicing_darkens_highs() {
        let run = |amount: f32| {
            let mut fx = PickupTransformer::new(48000.0);
            fx.set_humbuckerize(amount);
            let mut block = sine(6000.0, 48000);
            fx.process_block(&mut block);
            rms(&block[24000..])
        };
        assert!(run(1.0) < run(0.0) * 0.8);
    }
}
