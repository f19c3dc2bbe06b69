use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

use super::{InvalidConfiguration, zap_denormal};

/// Hard ceiling on channel counts; profile engines use at most 2.
const MAX_CHANNELS: usize = 16;

/// Frequency-domain filter partitions for one (input, output) routing.
struct FilterBank {
    input: usize,
    output: usize,
    partitions: Vec<Vec<Complex<f32>>>,
}

/// Uniform partitioned overlap-save convolution engine.
///
/// The impulse is cut into fragment-sized partitions (FFT length is twice
/// the fragment), so the per-call cost is a bounded sum over partition
/// spectra instead of a full-length convolution. Geometry is fixed by
/// [`ConvolutionEngine::configure`]; after [`start_processing`] the
/// process path touches only pre-sized buffers.
///
/// [`start_processing`]: ConvolutionEngine::start_processing
pub struct ConvolutionEngine {
    n_inputs: usize,
    n_outputs: usize,
    fragment: usize,
    fft_len: usize,
    num_bins: usize,
    part_count: usize,

    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    r2c_scratch: Vec<Complex<f32>>,
    c2r_scratch: Vec<Complex<f32>>,

    // Staging buffers exposed to the caller, one fragment per channel.
    input_stage: Vec<Vec<f32>>,
    output_stage: Vec<Vec<f32>>,

    // Per input: the last two fragments in time order, and a ring of
    // partition spectra read back in reverse time order while convolving.
    input_window: Vec<Vec<f32>>,
    history: Vec<Vec<Vec<Complex<f32>>>>,
    hist_head: usize,

    filters: Vec<FilterBank>,

    time_scratch: Vec<f32>,
    freq_scratch: Vec<Complex<f32>>,
    freq_accumulator: Vec<Complex<f32>>,

    processing: bool,
}

impl ConvolutionEngine {
    /// Fix the engine geometry: channel counts, the impulse-length budget
    /// (in samples), the fragment size `process` will consume per call, the
    /// largest partition the caller would tolerate and the partition
    /// density. The budget is a capacity: shorter impulses may be loaded
    /// later, longer ones are rejected.
    pub fn configure(
        n_inputs: usize,
        n_outputs: usize,
        impulse_len: usize,
        fragment: usize,
        max_partition: usize,
        density: f32,
    ) -> Result<Self, InvalidConfiguration> {
        if n_inputs == 0 || n_inputs > MAX_CHANNELS || n_outputs == 0 || n_outputs > MAX_CHANNELS {
            return Err(InvalidConfiguration("channel count out of range"));
        }
        if impulse_len == 0 {
            return Err(InvalidConfiguration("impulse length must be non-zero"));
        }
        if fragment == 0 || !fragment.is_power_of_two() {
            return Err(InvalidConfiguration("fragment size must be a power of two"));
        }
        if max_partition < fragment || !max_partition.is_power_of_two() {
            return Err(InvalidConfiguration(
                "max partition must be a power of two >= fragment",
            ));
        }
        if !(0.0..=1.0).contains(&density) {
            return Err(InvalidConfiguration("density must be within [0, 1]"));
        }

        let fft_len = 2 * fragment;
        let num_bins = fragment + 1;
        let part_count = impulse_len.div_ceil(fragment);

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_len);
        let c2r = planner.plan_fft_inverse(fft_len);
        let r2c_scratch = r2c.make_scratch_vec();
        let c2r_scratch = c2r.make_scratch_vec();

        Ok(Self {
            n_inputs,
            n_outputs,
            fragment,
            fft_len,
            num_bins,
            part_count,
            r2c,
            c2r,
            r2c_scratch,
            c2r_scratch,
            input_stage: vec![vec![0.0; fragment]; n_inputs],
            output_stage: vec![vec![0.0; fragment]; n_outputs],
            input_window: vec![vec![0.0; fft_len]; n_inputs],
            history: vec![
                vec![vec![Complex::new(0.0, 0.0); num_bins]; part_count];
                n_inputs
            ],
            hist_head: 0,
            filters: Vec::with_capacity(n_inputs.max(n_outputs)),
            time_scratch: vec![0.0; fft_len],
            freq_scratch: vec![Complex::new(0.0, 0.0); num_bins],
            freq_accumulator: vec![Complex::new(0.0, 0.0); num_bins],
            processing: false,
        })
    }

    /// Load `length` samples of `data` starting at `offset` as the impulse
    /// routed from `input` to `output`, scaled by `gain`. Replaces any
    /// impulse previously loaded on the same routing.
    pub fn load_impulse(
        &mut self,
        input: usize,
        output: usize,
        gain: f32,
        data: &[f32],
        offset: usize,
        length: usize,
    ) -> Result<(), InvalidConfiguration> {
        if input >= self.n_inputs || output >= self.n_outputs {
            return Err(InvalidConfiguration("impulse channel index out of range"));
        }
        if length == 0 {
            return Err(InvalidConfiguration("impulse length must be non-zero"));
        }
        if offset.checked_add(length).is_none_or(|end| end > data.len()) {
            return Err(InvalidConfiguration("impulse data slice out of bounds"));
        }
        if length > self.part_count * self.fragment {
            return Err(InvalidConfiguration("impulse exceeds configured budget"));
        }

        let samples = &data[offset..offset + length];
        let mut partitions = Vec::with_capacity(self.part_count);
        for chunk in samples.chunks(self.fragment) {
            self.time_scratch.fill(0.0);
            for (dst, &src) in self.time_scratch.iter_mut().zip(chunk) {
                *dst = src * gain;
            }

            let mut spectrum = vec![Complex::new(0.0, 0.0); self.num_bins];
            self.r2c
                .process_with_scratch(&mut self.time_scratch, &mut spectrum, &mut self.r2c_scratch)
                .map_err(|_| InvalidConfiguration("forward FFT failed on impulse data"))?;
            partitions.push(spectrum);
        }

        self.filters.retain(|f| f.input != input || f.output != output);
        self.filters.push(FilterBank {
            input,
            output,
            partitions,
        });
        Ok(())
    }

    /// Arm the engine. All processing state is cleared; from here on
    /// `process` performs no allocation.
    pub fn start_processing(&mut self) -> Result<(), InvalidConfiguration> {
        if self.filters.is_empty() {
            return Err(InvalidConfiguration("no impulse loaded"));
        }
        for window in &mut self.input_window {
            window.fill(0.0);
        }
        for ring in &mut self.history {
            for spectrum in ring.iter_mut() {
                spectrum.fill(Complex::new(0.0, 0.0));
            }
        }
        self.hist_head = 0;
        for stage in &mut self.output_stage {
            stage.fill(0.0);
        }
        self.processing = true;
        Ok(())
    }

    pub const fn fragment_size(&self) -> usize {
        self.fragment
    }

    pub const fn partition_count(&self) -> usize {
        self.part_count
    }

    /// Mutable view of one fragment of staged input for `channel`.
    pub fn input_buffer(&mut self, channel: usize) -> &mut [f32] {
        &mut self.input_stage[channel]
    }

    /// The fragment produced for `channel` by the last `process` call.
    pub fn output_buffer(&self, channel: usize) -> &[f32] {
        &self.output_stage[channel]
    }

    /// Consume one staged fragment per input and produce one fragment per
    /// output. Before `start_processing` this writes silence.
    pub fn process(&mut self) {
        if !self.processing {
            for stage in &mut self.output_stage {
                stage.fill(0.0);
            }
            return;
        }

        // Slide each input window one fragment and take its spectrum into
        // the history ring.
        for ch in 0..self.n_inputs {
            let window = &mut self.input_window[ch];
            window.copy_within(self.fragment.., 0);
            window[self.fragment..].copy_from_slice(&self.input_stage[ch]);

            self.time_scratch.copy_from_slice(window);
            self.r2c
                .process_with_scratch(
                    &mut self.time_scratch,
                    &mut self.freq_scratch,
                    &mut self.r2c_scratch,
                )
                .expect("forward FFT failed");
            self.history[ch][self.hist_head].copy_from_slice(&self.freq_scratch);
        }
        let head = self.hist_head;
        self.hist_head = (self.hist_head + 1) % self.part_count;

        let scale = 1.0 / self.fft_len as f32;
        for out in 0..self.n_outputs {
            self.freq_accumulator.fill(Complex::new(0.0, 0.0));

            for filter in &self.filters {
                if filter.output != out {
                    continue;
                }
                let ring = &self.history[filter.input];
                for (j, partition) in filter.partitions.iter().enumerate() {
                    // Partition j convolves against the input spectrum
                    // captured j fragments ago.
                    let idx = (head + self.part_count - j) % self.part_count;
                    let spectrum = &ring[idx];
                    for (acc, (&x, &h)) in self
                        .freq_accumulator
                        .iter_mut()
                        .zip(spectrum.iter().zip(partition.iter()))
                    {
                        let prod = x * h;
                        acc.re += zap_denormal(prod.re);
                        acc.im += zap_denormal(prod.im);
                    }
                }
            }

            // DC and Nyquist bins must stay real.
            self.freq_accumulator[0].im = 0.0;
            if let Some(last) = self.freq_accumulator.last_mut() {
                last.im = 0.0;
            }

            self.c2r
                .process_with_scratch(
                    &mut self.freq_accumulator,
                    &mut self.time_scratch,
                    &mut self.c2r_scratch,
                )
                .expect("inverse FFT failed");

            // Overlap-save: the first half is circular wrap-around, the
            // second half is the valid linear convolution.
            for (dst, &src) in self.output_stage[out]
                .iter_mut()
                .zip(&self.time_scratch[self.fragment..])
            {
                *dst = src * scale;
            }
        }
    }
}
