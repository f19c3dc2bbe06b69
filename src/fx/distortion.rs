use std::f32::consts::PI;

use super::db_to_lin;

/// High-gain distortion with a three-band tone section.
///
/// Signal path: DC blocker, voice-dependent pre-clip tilt, asymmetric
/// clipper, then bass/middle/treble shelving and the output volume.
pub struct Distruction {
    drive_db: f32,
    bass_db: f32,
    middle_db: f32,
    treble_db: f32,
    /// 0 = dark/loose voicing, 1 = tight/bright.
    voice: f32,
    volume: f32,

    sample_rate: f32,

    dc_prev_in: f32,
    dc_prev_out: f32,
    dc_coeff: f32,

    voice_hp: f32,
    bass_lp: f32,
    mid_hp: f32,
    mid_lp: f32,
    treble_lp: f32,
}

impl Distruction {
    pub fn new(sample_rate: f32) -> Self {
        const DC_CUTOFF_HZ: f32 = 15.0;
        Self {
            drive_db: 20.0,
            bass_db: 0.0,
            middle_db: 0.0,
            treble_db: 0.0,
            voice: 0.5,
            volume: 0.5,
            sample_rate,
            dc_prev_in: 0.0,
            dc_prev_out: 0.0,
            dc_coeff: (-2.0 * PI * DC_CUTOFF_HZ / sample_rate).exp(),
            voice_hp: 0.0,
            bass_lp: 0.0,
            mid_hp: 0.0,
            mid_lp: 0.0,
            treble_lp: 0.0,
        }
    }

    pub fn set_drive_db(&mut self, db: f32) {
        self.drive_db = db.clamp(0.0, 40.0);
    }

    pub fn set_tone_db(&mut self, bass: f32, middle: f32, treble: f32) {
        self.bass_db = bass.clamp(-10.0, 10.0);
        self.middle_db = middle.clamp(-10.0, 10.0);
        self.treble_db = treble.clamp(-10.0, 10.0);
    }

    pub fn set_voice(&mut self, voice: f32) {
        self.voice = voice.clamp(0.0, 1.0);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    #[inline]
    fn alpha(&self, f: f32) -> f32 {
        let dt = 1.0 / self.sample_rate;
        dt / (dt + 1.0 / (2.0 * PI * f))
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        // DC blocker so the asymmetric clipper doesn't ratchet.
        let dc = input - self.dc_prev_in + self.dc_coeff * self.dc_prev_out;
        self.dc_prev_in = input;
        self.dc_prev_out = dc;

        // Voice: tighter settings cut more lows before clipping.
        let voice_freq = 60.0 + self.voice * 320.0;
        let a = self.alpha(voice_freq);
        self.voice_hp += a * (dc - self.voice_hp);
        let pre = dc - self.voice_hp * (0.3 + 0.7 * self.voice);

        // Asymmetric clip: tanh positive lobe, harder negative lobe.
        let driven = pre * db_to_lin(self.drive_db);
        let clipped = if driven >= 0.0 {
            driven.tanh()
        } else {
            (driven * 1.2).tanh() * 0.9
        };

        // Three-band tone.
        let bass = {
            let a = self.alpha(100.0);
            self.bass_lp += a * (clipped - self.bass_lp);
            self.bass_lp
        };
        let mid = {
            let a_hp = self.alpha(100.0);
            self.mid_hp += a_hp * (clipped - self.mid_hp);
            let hp = clipped - self.mid_hp;
            let a_lp = self.alpha(700.0);
            self.mid_lp += a_lp * (hp - self.mid_lp);
            self.mid_lp
        };
        let treble = {
            let a = self.alpha(2000.0);
            self.treble_lp += a * (clipped - self.treble_lp);
            clipped - self.treble_lp
        };

        let toned = bass * db_to_lin(self.bass_db)
            + mid * db_to_lin(self.middle_db)
            + treble * db_to_lin(self.treble_db);

        toned * self.volume
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
