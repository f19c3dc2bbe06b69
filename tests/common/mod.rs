use std::io::Write;
use std::path::{Path, PathBuf};

/// Header constants shared by every fixture profile: a moderate-gain amp
/// with a flat-ish tonestack.
pub const HEADER_FIELDS: [f32; 17] = [
    0.2, 0.5, 0.9, // amp bias / kreg / upor
    0.1, 0.3, 0.9, // preamp bias / kreg / upor
    120.0, 80.0, // tonestack low
    700.0, 400.0, // tonestack middle
    2200.0, 1200.0, // tonestack high
    1.0, 1.0, // preamp / amp level
    0.05, 0.5, // sag time / coeff
    1.0, // output level
];

fn push_record(buf: &mut Vec<u8>, channel: i32, samples: &[f32]) {
    buf.extend_from_slice(&channel.to_le_bytes());
    buf.extend_from_slice(&(samples.len() as i32).to_le_bytes());
    for &s in samples {
        buf.extend_from_slice(&s.to_le_bytes());
    }
}

pub fn write_tapf(path: &Path, preamp: &[f32], cab_left: &[f32], cab_right: &[f32]) {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"TaPf");
    for v in HEADER_FIELDS {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    push_record(&mut buf, 0, preamp);
    push_record(&mut buf, 0, cab_left);
    push_record(&mut buf, 1, cab_right);

    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(&buf).unwrap();
}

/// A profile whose convolution stages are pure gains: preamp unity,
/// cabinet `cab_gain` on both channels. Makes pipeline output easy to
/// reason about.
pub fn write_gain_profile(dir: &Path, name: &str, cab_gain: f32) -> PathBuf {
    let path = dir.join(name);
    write_tapf(&path, &[1.0], &[cab_gain], &[cab_gain]);
    path
}

/// A profile with realistic decaying IRs on both stages.
pub fn write_decay_profile(dir: &Path, name: &str) -> PathBuf {
    let preamp: Vec<f32> = (0..256)
        .map(|i| (0.92f32).powi(i) * (i as f32 * 0.5).cos())
        .collect();
    let cab: Vec<f32> = (0..2000)
        .map(|i| (0.995f32).powi(i) * (i as f32 * 0.13).sin())
        .collect();
    let path = dir.join(name);
    write_tapf(&path, &preamp, &cab, &cab);
    path
}
