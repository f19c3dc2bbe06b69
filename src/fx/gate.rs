use super::{db_to_lin, smoothing_coeff};

/// Two-threshold noise gate.
///
/// The dead zone is a hard mute: once the envelope falls below it the
/// output is silence, full stop. The gate threshold above it closes
/// smoothly so decaying notes are not chopped off.
pub struct DeadGate {
    deadzone: f32,
    threshold: f32,

    envelope: f32,
    gate_state: f32,
    hold_counter: usize,
    hold_samples: usize,

    env_attack: f32,
    env_release: f32,
    attack: f32,
    release: f32,
}

impl DeadGate {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            deadzone: db_to_lin(-120.0),
            threshold: db_to_lin(-60.0),
            envelope: 0.0,
            gate_state: 0.0,
            hold_counter: 0,
            hold_samples: (sample_rate * 0.05) as usize,
            env_attack: smoothing_coeff(0.1, sample_rate),
            env_release: smoothing_coeff(10.0, sample_rate),
            attack: smoothing_coeff(2.0, sample_rate),
            release: smoothing_coeff(50.0, sample_rate),
        }
    }

    pub fn set_deadzone_db(&mut self, db: f32) {
        self.deadzone = db_to_lin(db.clamp(-120.0, 0.0));
    }

    pub fn set_threshold_db(&mut self, db: f32) {
        self.threshold = db_to_lin(db.clamp(-120.0, 0.0));
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let level = input.abs();
        if level > self.envelope {
            self.envelope = self.env_attack * (self.envelope - level) + level;
        } else {
            self.envelope = self.env_release * (self.envelope - level) + level;
        }

        if self.envelope < self.deadzone {
            self.gate_state = 0.0;
            self.hold_counter = 0;
            return 0.0;
        }

        let open = self.envelope > self.threshold;
        if open {
            self.hold_counter = self.hold_samples;
        } else if self.hold_counter > 0 {
            self.hold_counter -= 1;
        }

        let target = if open || self.hold_counter > 0 { 1.0 } else { 0.0 };
        if target > self.gate_state {
            self.gate_state = self.attack * (self.gate_state - target) + target;
        } else {
            self.gate_state = self.release * (self.gate_state - target) + target;
        }

        input * self.gate_state
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

    #[test]
    fn loud_signal_passes() {
        let mut gate = DeadGate::new(48000.0);
        gate.set_threshold_db(-40.0);

        let mut block = vec![0.5f32; 4800];
        gate.process_block(&mut block);
        assert!(block[4000].abs() > 0.4, "gate should be open: {}", block[4000]);
    }

    #[test]
    fn deadzone_mutes_hard() {
        let mut gate = DeadGate::new(48000.0);
        gate.set_deadzone_db(-40.0);
        gate.set_threshold_db(-20.0);

        let mut block = vec![1e-4f32; 4800];
        gate.process_block(&mut block);
        assert!(block[4000] == 0.0, "dead zone should mute outright");
    }

    #[test]
    fn quiet_signal_is_attenuated() {
        let mut gate = DeadGate::new(48000.0);
        gate.set_threshold_db(-20.0);

        // Warm the envelope with silence, then a signal below threshold.
        let mut block = vec![0.01f32; 48000];
        gate.process_block(&mut block);
        assert!(
            block[40000].abs() < 0.001,
            "gate should be closed: {}",
            block[40000]
        );
    }
}
