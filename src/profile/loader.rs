use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use super::{
    CABINET_IMPULSE_BUDGET, FRAGMENT, ImpulseRecord, Profile, ProfileError, ProfileHeader,
    REFERENCE_RATE,
};
use crate::dsp::{ConvolutionEngine, resampler};

/// Largest partition size the engines would accept; informational with the
/// uniform partition plan.
const MAX_PARTITION: usize = 8192;

/// Validate that `path` looks like a profile file. Reads the header only
/// and mutates nothing.
pub fn check_file(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    ProfileHeader::read(&mut BufReader::new(file)).is_ok()
}

/// Load the profile at `path` and build its convolution engines for
/// `sample_rate`. A failed load returns before anything observable is
/// touched, so the caller can keep its previous profile active.
pub fn load(path: &Path, sample_rate: u32) -> Result<Profile, ProfileError> {
    let file = File::open(path).map_err(ProfileError::Io)?;
    let mut reader = BufReader::new(file);

    let header = ProfileHeader::read(&mut reader)?;

    // One preamp record (its channel tag carries no meaning), then the two
    // cabinet records dispatched by tag in whatever order the file has.
    let preamp_record = ImpulseRecord::read(&mut reader)?;
    let mut left: Option<Vec<f32>> = None;
    let mut right: Option<Vec<f32>> = None;
    for _ in 0..2 {
        let record = ImpulseRecord::read(&mut reader)?;
        match record.channel {
            0 => left = Some(record.samples),
            1 => right = Some(record.samples),
            _ => return Err(ProfileError::ShortRead),
        }
    }
    let Some(left) = left else {
        return Err(ProfileError::MissingChannel(0));
    };
    let Some(right) = right else {
        return Err(ProfileError::MissingChannel(1));
    };

    let (preamp_ir, cabinet_l, cabinet_r) = if sample_rate == REFERENCE_RATE {
        (preamp_record.samples, left, right)
    } else {
        let preamp =
            resampler::resample(&preamp_record.samples, REFERENCE_RATE, sample_rate, 1)?;
        let (l, r) = resample_cabinet_pair(&left, &right, sample_rate)?;
        (preamp, l, r)
    };

    let mut preamp = ConvolutionEngine::configure(
        1,
        1,
        preamp_ir.len(),
        FRAGMENT,
        MAX_PARTITION,
        0.0,
    )?;
    preamp.load_impulse(0, 0, 1.0, &preamp_ir, 0, preamp_ir.len())?;
    preamp.start_processing()?;

    let mut cabinet = ConvolutionEngine::configure(
        2,
        2,
        CABINET_IMPULSE_BUDGET,
        FRAGMENT,
        MAX_PARTITION,
        0.0,
    )?;
    let left_len = cabinet_l.len().min(CABINET_IMPULSE_BUDGET);
    let right_len = cabinet_r.len().min(CABINET_IMPULSE_BUDGET);
    cabinet.load_impulse(0, 0, 1.0, &cabinet_l, 0, left_len)?;
    cabinet.load_impulse(1, 1, 1.0, &cabinet_r, 0, right_len)?;
    cabinet.start_processing()?;

    debug!(
        "loaded profile {:?}: preamp {} samples, cabinet {}/{} samples at {} Hz",
        path,
        preamp_ir.len(),
        left_len,
        right_len,
        sample_rate
    );

    Ok(Profile {
        header,
        path: path.to_path_buf(),
        preamp,
        cabinet,
    })
}

/// Both cabinet channels go through one interleaved stereo filter pass so
/// they share a coefficient table and stay phase-aligned.
fn resample_cabinet_pair(
    left: &[f32],
    right: &[f32],
    sample_rate: u32,
) -> Result<(Vec<f32>, Vec<f32>), ProfileError> {
    let frames = left.len().max(right.len());
    let mut interleaved = vec![0.0f32; frames * 2];
    for (i, &s) in left.iter().enumerate() {
        interleaved[i * 2] = s;
    }
    for (i, &s) in right.iter().enumerate() {
        interleaved[i * 2 + 1] = s;
    }

    let resampled = resampler::resample(&interleaved, REFERENCE_RATE, sample_rate, 2)?;
    let out_frames = resampled.len() / 2;
    let mut out_l = Vec::with_capacity(out_frames);
    let mut out_r = Vec::with_capacity(out_frames);
    for frame in resampled.chunks_exact(2) {
        out_l.push(frame[0]);
        out_r.push(frame[1]);
    }
    Ok((out_l, out_r))
}
