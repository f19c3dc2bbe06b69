use std::sync::{Arc, LazyLock, Mutex, Weak};

use super::InvalidConfiguration;

/// Filter half-length in taps at the lower of the two rates.
const HALF_LEN: usize = 48;
/// Largest reduced-denominator phase count the table supports.
const MAX_PHASES: u32 = 1000;

/// Shared windowed-sinc coefficient table.
///
/// One table exists per (cutoff, half-length, phase count) triple; rows are
/// the right half of the symmetric kernel at `np + 1` fractional offsets.
/// Tables are only ever built on the load path, so the registry sits behind
/// a single coarse lock.
pub(crate) struct SincTable {
    fr: f64,
    hl: usize,
    np: u32,
    coeffs: Vec<f32>,
}

static REGISTRY: LazyLock<Mutex<Vec<Weak<SincTable>>>> = LazyLock::new(|| Mutex::new(Vec::new()));

impl SincTable {
    fn new(fr: f64, hl: usize, np: u32) -> Self {
        let mut coeffs = Vec::with_capacity(hl * (np as usize + 1));
        for j in 0..=np {
            let mut t = f64::from(j) / f64::from(np);
            for _ in 0..hl {
                coeffs.push((fr * sinc(t * fr) * wind(t / hl as f64)) as f32);
                t += 1.0;
            }
        }
        Self { fr, hl, np, coeffs }
    }

    /// Fetch a matching table from the registry or build one. Cutoffs are
    /// matched within ±0.1%, the tolerance band of the original filter.
    pub(crate) fn acquire(
        fr: f64,
        hl: usize,
        np: u32,
    ) -> Result<Arc<Self>, InvalidConfiguration> {
        if hl == 0 || np == 0 {
            return Err(InvalidConfiguration("sinc table geometry is empty"));
        }
        if !fr.is_finite() || fr <= 0.0 {
            return Err(InvalidConfiguration("sinc table cutoff must be positive"));
        }

        let mut registry = REGISTRY.lock().expect("sinc table registry poisoned");
        registry.retain(|w| w.strong_count() > 0);
        for weak in registry.iter() {
            if let Some(table) = weak.upgrade()
                && fr >= table.fr * 0.999
                && fr <= table.fr * 1.001
                && hl == table.hl
                && np == table.np
            {
                return Ok(table);
            }
        }

        let table = Arc::new(Self::new(fr, hl, np));
        registry.push(Arc::downgrade(&table));
        Ok(table)
    }

    #[inline]
    fn row(&self, phase: u32) -> &[f32] {
        let start = self.hl * phase as usize;
        &self.coeffs[start..start + self.hl]
    }
}

#[inline]
fn sinc(x: f64) -> f64 {
    let x = x.abs();
    if x < 1e-6 {
        return 1.0;
    }
    let x = x * std::f64::consts::PI;
    x.sin() / x
}

#[inline]
fn wind(x: f64) -> f64 {
    let x = x.abs();
    if x >= 1.0 {
        return 0.0;
    }
    let x = x * std::f64::consts::PI;
    0.384 + 0.500 * x.cos() + 0.116 * (2.0 * x).cos()
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Resample interleaved `channels`-channel audio from `source_rate` to
/// `target_rate`.
///
/// Equal rates return the input unchanged. Otherwise the signal is padded
/// with `inpsize / 2 - 1` silent frames before and `inpsize - 1` after
/// (`inpsize` being the full filter span), so the output grid starts at
/// input position zero and the onset of an impulse response is not shifted.
/// Output length is `ceil(frames * ratio)` frames and every sample is
/// divided by the ratio, which keeps the sample sum of an IR constant
/// across rates.
pub fn resample(
    input: &[f32],
    source_rate: u32,
    target_rate: u32,
    channels: usize,
) -> Result<Vec<f32>, InvalidConfiguration> {
    if channels == 0 {
        return Err(InvalidConfiguration("channel count must be non-zero"));
    }
    if source_rate == 0 || target_rate == 0 {
        return Err(InvalidConfiguration("sample rates must be non-zero"));
    }
    if input.len() % channels != 0 {
        return Err(InvalidConfiguration(
            "input length is not a multiple of the channel count",
        ));
    }

    if source_rate == target_rate {
        return Ok(input.to_vec());
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    let g = gcd(source_rate, target_rate);
    let np = target_rate / g;
    let step = (source_rate / g) as u64;
    if np > MAX_PHASES || 16.0 * ratio < 1.0 {
        return Err(InvalidConfiguration("unsupported resampling ratio"));
    }

    let (fr, hl) = if ratio < 1.0 {
        (ratio, (HALF_LEN as f64 / ratio).ceil() as usize)
    } else {
        (1.0, HALF_LEN)
    };
    let table = SincTable::acquire(fr, hl, np)?;

    let frames = input.len() / channels;
    let inpsize = 2 * hl;
    let pad_before = inpsize / 2 - 1;
    let pad_after = inpsize - 1;

    let mut padded = vec![0.0f32; (frames + pad_before + pad_after) * channels];
    padded[pad_before * channels..(pad_before + frames) * channels].copy_from_slice(input);

    let out_frames = (frames as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(out_frames * channels);
    let inv_ratio = (1.0 / ratio) as f32;

    for m in 0..out_frames as u64 {
        // Output m sits at input position q + p/np frames into the signal.
        let acc = m * step;
        let q = pad_before + (acc / u64::from(np)) as usize;
        let p = (acc % u64::from(np)) as u32;
        let past_taps = table.row(p);
        let future_taps = table.row(np - p);

        for c in 0..channels {
            let mut sum = 0.0f32;
            for i in 0..hl {
                sum += padded[(q - i) * channels + c] * past_taps[i]
                    + padded[(q + 1 + i) * channels + c] * future_taps[i];
            }
            output.push(sum * inv_ratio);
        }
    }

    Ok(output)
}
