use std::f32::consts::PI;

use crate::amp::params::TubeParams;
use crate::profile::ProfileHeader;

/// Nonlinear tube/tonestack compute stage.
///
/// One concrete implementation, driven entirely by the profile header's
/// parameters: preamp triode clip, three-band tonestack at the header's
/// center frequencies, then a power stage with supply sag. Deterministic
/// given its inputs and filter state; the pipeline calls it once per block
/// between the two convolution passes.
pub struct TubeStage {
    sample_rate: f32,

    // Envelope followers: gain regulation per stage, plus supply sag.
    preamp_env: f32,
    amp_env: f32,
    sag_env: f32,

    // Tonestack one-pole states.
    low_lp: f32,
    mid_hp: f32,
    mid_lp: f32,
    high_lp: f32,

    env_attack: f32,
    env_release: f32,
}

impl TubeStage {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            preamp_env: 0.0,
            amp_env: 0.0,
            sag_env: 0.0,
            low_lp: 0.0,
            mid_hp: 0.0,
            mid_lp: 0.0,
            high_lp: 0.0,
            env_attack: coeff(0.005, sample_rate),
            env_release: coeff(0.050, sample_rate),
        }
    }

    pub fn reset(&mut self) {
        self.preamp_env = 0.0;
        self.amp_env = 0.0;
        self.sag_env = 0.0;
        self.low_lp = 0.0;
        self.mid_hp = 0.0;
        self.mid_lp = 0.0;
        self.high_lp = 0.0;
    }

    #[inline]
    fn alpha(&self, f: f32) -> f32 {
        let dt = 1.0 / self.sample_rate;
        dt / (dt + 1.0 / (2.0 * PI * f.max(10.0)))
    }

    #[inline]
    fn follow(&self, env: f32, level: f32) -> f32 {
        if level > env {
            self.env_attack * (env - level) + level
        } else {
            self.env_release * (env - level) + level
        }
    }

    /// Process one mono block into both output channels.
    pub fn compute_block(
        &mut self,
        mono_in: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
        header: &ProfileHeader,
        params: &TubeParams,
    ) {
        let drive_gain = 1.0 + params.drive * 0.35;
        let master_gain = 0.5 + params.mastergain * 0.04;

        let low_gain = db_to_lin(params.low);
        let mid_gain = db_to_lin(params.middle);
        let high_gain = db_to_lin(params.high);

        // Band edges: each knob covers its center frequency plus half the
        // profile's bandwidth on either side.
        let low_alpha =
            self.alpha(header.tonestack_low_freq + header.tonestack_low_band * 0.5);
        let mid_hp_alpha = self.alpha(
            (header.tonestack_middle_freq - header.tonestack_middle_band * 0.5).max(40.0),
        );
        let mid_lp_alpha =
            self.alpha(header.tonestack_middle_freq + header.tonestack_middle_band * 0.5);
        let high_alpha = self.alpha(
            (header.tonestack_high_freq - header.tonestack_high_band * 0.5).max(200.0),
        );

        // Sag tracks at the header's time constant; sag_coeff sets depth.
        let sag_alpha = if header.sag_time > 0.0 {
            1.0 - coeff(header.sag_time, self.sample_rate)
        } else {
            1.0
        };

        for ((&x, l), r) in mono_in.iter().zip(out_l.iter_mut()).zip(out_r.iter_mut()) {
            // Preamp triode: gain regulation pulls drive back as the stage
            // heats up, then the biased clip.
            let preamp_reg = 1.0 / (1.0 + header.preamp_kreg.max(0.0) * self.preamp_env);
            let pre = tube_clip(
                x * drive_gain * preamp_reg,
                header.preamp_bias,
                header.preamp_upor,
            );
            self.preamp_env = self.follow(self.preamp_env, pre.abs());

            // Tonestack: low band straight from a one-pole LP, mid from an
            // HP/LP pair around the center, high is the LP complement.
            self.low_lp += low_alpha * (pre - self.low_lp);
            let low_band = self.low_lp;

            self.mid_hp += mid_hp_alpha * (pre - self.mid_hp);
            let mid_src = pre - self.mid_hp;
            self.mid_lp += mid_lp_alpha * (mid_src - self.mid_lp);
            let mid_band = self.mid_lp;

            self.high_lp += high_alpha * (pre - self.high_lp);
            let high_band = pre - self.high_lp;

            let toned = (low_band * low_gain + mid_band * mid_gain + high_band * high_gain)
                * header.preamp_level;

            // Power stage: supply sag compresses the drive, then the same
            // triode shape with the power-amp constants.
            self.sag_env += sag_alpha * (toned.abs() - self.sag_env);
            let sag_gain = 1.0 / (1.0 + header.sag_coeff.max(0.0) * self.sag_env);
            let amp_reg = 1.0 / (1.0 + header.amp_kreg.max(0.0) * self.amp_env);
            let power = tube_clip(
                toned * master_gain * sag_gain * amp_reg,
                header.amp_bias,
                header.amp_upor,
            );
            self.amp_env = self.follow(self.amp_env, power.abs());

            let y = power * header.amp_level * header.output_level * params.volume;
            *l = y;
            *r = y;
        }
    }
}

/// Phenomenological triode transfer: a bias-shifted soft clip, recentred
/// so silence stays at zero, with conduction cutoff folding the negative
/// excursion onto a shallow slope below `upor`.
#[inline]
fn tube_clip(v: f32, bias: f32, upor: f32) -> f32 {
    let shifted = (v + bias).tanh() - bias.tanh();
    let cutoff = -upor.abs().min(1.0);
    if shifted < cutoff {
        cutoff + (shifted - cutoff) * 0.1
    } else {
        shifted
    }
}

#[inline]
fn db_to_lin(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[inline]
fn coeff(time_s: f32, sample_rate: f32) -> f32 {
    (-1.0 / (sample_rate * time_s)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_header() -> ProfileHeader {
        ProfileHeader {
            amp_bias: 0.2,
            amp_kreg: 0.5,
            amp_upor: 0.8,
            preamp_bias: 0.1,
            preamp_kreg: 0.3,
            preamp_upor: 0.9,
            tonestack_low_freq: 120.0,
            tonestack_low_band: 80.0,
            tonestack_middle_freq: 700.0,
            tonestack_middle_band: 400.0,
            tonestack_high_freq: 2200.0,
            tonestack_high_band: 1000.0,
            preamp_level: 1.0,
            amp_level: 1.0,
            sag_time: 0.05,
            sag_coeff: 0.5,
            output_level: 1.0,
        }
    }

    fn test_params() -> TubeParams {
        TubeParams {
            drive: 50.0,
            low: 0.0,
            middle: 0.0,
            high: 0.0,
            mastergain: 50.0,
            volume: 1.0,
            cabinet: 1.0,
        }
    }

    #[test]
    fn produces_identical_channels() {
        let mut stage = TubeStage::new(48000.0);
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();
        let mut l = vec![0.0f32; 256];
        let mut r = vec![0.0f32; 256];
        stage.compute_block(&input, &mut l, &mut r, &test_header(), &test_params());
        assert_eq!(l, r);
        assert!(l.iter().any(|&x| x.abs() > 1e-4), "expected audible output");
    }

    #[test]
    fn deterministic_after_reset() {
        let mut stage = TubeStage::new(48000.0);
        let input: Vec<f32> = (0..128).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut a = vec![0.0f32; 128];
        let mut b = vec![0.0f32; 128];
        let mut scratch = vec![0.0f32; 128];

        stage.compute_block(&input, &mut a, &mut scratch, &test_header(), &test_params());
        stage.reset();
        stage.compute_block(&input, &mut b, &mut scratch, &test_header(), &test_params());
        assert_eq!(a, b);
    }

    #[test]
    fn silence_stays_silent() {
        let mut stage = TubeStage::new(48000.0);
        let input = vec![0.0f32; 128];
        let mut l = vec![1.0f32; 128];
        let mut r = vec![1.0f32; 128];
        stage.compute_block(&input, &mut l, &mut r, &test_header(), &test_params());
        assert!(l.iter().all(|&x| x.abs() < 1e-6));
    }

    #[test]
    fn drive_increases_output_level() {
        let header = test_header();
        let input: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.08).sin() * 0.2).collect();

        let rms = |drive: f32| {
            let mut stage = TubeStage::new(48000.0);
            let mut l = vec![0.0f32; input.len()];
            let mut r = vec![0.0f32; input.len()];
            let mut params = test_params();
            params.drive = drive;
            stage.compute_block(&input, &mut l, &mut r, &header, &params);
            (l.iter().map(|x| x * x).sum::<f32>() / l.len() as f32).sqrt()
        };

        assert!(rms(90.0) > rms(10.0));
    }
}
