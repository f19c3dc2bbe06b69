pub mod loader;

use std::io::Read;
use std::path::PathBuf;

use thiserror::Error;

use crate::dsp::{ConvolutionEngine, InvalidConfiguration};

/// Rate every impulse response inside a profile file is recorded at.
pub const REFERENCE_RATE: u32 = 48000;
/// Fragment size both convolution engines are driven at.
pub const FRAGMENT: usize = 64;
/// Fixed impulse budget of the cabinet engine, in samples. A reserved
/// worst-case partition allocation sized for the reference-rate case, not
/// the length of any particular cabinet IR.
pub const CABINET_IMPULSE_BUDGET: usize = (REFERENCE_RATE / 2) as usize;

const SIGNATURE: [u8; 4] = *b"TaPf";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile file i/o error")]
    Io(#[source] std::io::Error),
    #[error("profile file is truncated or malformed")]
    ShortRead,
    #[error("bad profile signature (expected \"TaPf\")")]
    BadSignature,
    #[error("cabinet impulse for channel {0} is missing")]
    MissingChannel(i32),
    #[error("pipeline is not active")]
    Inactive,
    #[error(transparent)]
    Config(#[from] InvalidConfiguration),
}

/// The fixed-size parameter record at the head of a `.tapf` file. All
/// fields are little-endian f32; the signature gates everything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileHeader {
    pub amp_bias: f32,
    pub amp_kreg: f32,
    pub amp_upor: f32,
    pub preamp_bias: f32,
    pub preamp_kreg: f32,
    pub preamp_upor: f32,
    pub tonestack_low_freq: f32,
    pub tonestack_low_band: f32,
    pub tonestack_middle_freq: f32,
    pub tonestack_middle_band: f32,
    pub tonestack_high_freq: f32,
    pub tonestack_high_band: f32,
    pub preamp_level: f32,
    pub amp_level: f32,
    pub sag_time: f32,
    pub sag_coeff: f32,
    pub output_level: f32,
}

impl ProfileHeader {
    pub(crate) fn read(reader: &mut impl Read) -> Result<Self, ProfileError> {
        let mut signature = [0u8; 4];
        read_exact(reader, &mut signature)?;
        if signature != SIGNATURE {
            return Err(ProfileError::BadSignature);
        }

        let mut fields = [0.0f32; 17];
        for field in &mut fields {
            *field = read_f32(reader)?;
        }

        Ok(Self {
            amp_bias: fields[0],
            amp_kreg: fields[1],
            amp_upor: fields[2],
            preamp_bias: fields[3],
            preamp_kreg: fields[4],
            preamp_upor: fields[5],
            tonestack_low_freq: fields[6],
            tonestack_low_band: fields[7],
            tonestack_middle_freq: fields[8],
            tonestack_middle_band: fields[9],
            tonestack_high_freq: fields[10],
            tonestack_high_band: fields[11],
            preamp_level: fields[12],
            amp_level: fields[13],
            sag_time: fields[14],
            sag_coeff: fields[15],
            output_level: fields[16],
        })
    }
}

/// One impulse record from the container: a channel tag and its samples at
/// the reference rate.
pub(crate) struct ImpulseRecord {
    pub channel: i32,
    pub samples: Vec<f32>,
}

impl ImpulseRecord {
    /// Longest believable impulse; counts past this are treated as file
    /// corruption rather than data.
    const MAX_SAMPLES: i32 = (REFERENCE_RATE * 5) as i32;

    pub(crate) fn read(reader: &mut impl Read) -> Result<Self, ProfileError> {
        let channel = read_i32(reader)?;
        let sample_count = read_i32(reader)?;
        if sample_count <= 0 || sample_count > Self::MAX_SAMPLES {
            return Err(ProfileError::ShortRead);
        }

        let mut samples = vec![0.0f32; sample_count as usize];
        for sample in &mut samples {
            *sample = read_f32(reader)?;
        }
        Ok(Self { channel, samples })
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), ProfileError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProfileError::ShortRead
        } else {
            ProfileError::Io(e)
        }
    })
}

fn read_f32(reader: &mut impl Read) -> Result<f32, ProfileError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_i32(reader: &mut impl Read) -> Result<i32, ProfileError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// A loaded amplifier model: validated header parameters plus the two
/// convolution engines built from the file's impulse responses. Exactly
/// one profile is active in a pipeline at any time; see
/// [`crate::amp::pipeline`] for the replacement discipline.
pub struct Profile {
    pub header: ProfileHeader,
    pub path: PathBuf,
    pub preamp: ConvolutionEngine,
    pub cabinet: ConvolutionEngine,
}
