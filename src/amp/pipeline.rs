use arc_swap::ArcSwap;
use crossbeam::queue::ArrayQueue;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::amp::params::{ParamChange, ParameterSet};
use crate::amp::tube::TubeStage;
use crate::dsp::ConvolutionEngine;
use crate::profile::{Profile, ProfileError, loader};

/// Pending + retired profiles the audio thread may hold at once.
const HANDOFF_DEPTH: usize = 4;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state blob is truncated")]
    ShortRead,
    #[error("profile path exceeds 255 bytes")]
    PathTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Inactive,
    ActiveNoProfile,
    ActiveWithProfile,
}

/// Snapshot of the published profile, for display threads.
#[derive(Debug, Clone, Default)]
pub struct ProfileInfo {
    pub path: Option<PathBuf>,
    pub preamp_partitions: usize,
    pub cabinet_partitions: usize,
}

struct Handoff {
    /// Control -> audio: fully built profiles awaiting installation.
    incoming: ArrayQueue<Box<Profile>>,
    /// Audio -> control: displaced profiles awaiting reclamation.
    retired: ArrayQueue<Box<Profile>>,
    /// Live sample rate; zero while the pipeline is inactive.
    live_rate: AtomicU32,
    info: ArcSwap<ProfileInfo>,
    /// Serializes concurrent loads so only one is in flight.
    load_lock: Mutex<()>,
}

/// Control-context endpoint for out-of-band profile loads.
///
/// A load builds the complete profile (file parse, resampling, convolver
/// configuration) on the calling thread, then publishes it through a
/// lock-free slot the audio thread drains at the top of its next block.
/// Last to publish wins. Profiles the audio thread displaced come back
/// through a second queue and are dropped here, off the audio path.
pub struct ProfileHandle {
    shared: Arc<Handoff>,
}

impl ProfileHandle {
    pub fn load(&self, path: &Path) -> Result<(), ProfileError> {
        let _guard = self.shared.load_lock.lock().expect("load lock poisoned");
        self.reclaim();

        let rate = self.shared.live_rate.load(Ordering::Acquire);
        if rate == 0 {
            return Err(ProfileError::Inactive);
        }

        let profile = loader::load(path, rate)?;
        let info = ProfileInfo {
            path: Some(profile.path.clone()),
            preamp_partitions: profile.preamp.partition_count(),
            cabinet_partitions: profile.cabinet.partition_count(),
        };
        if let Some(superseded) = self.shared.incoming.force_push(Box::new(profile)) {
            debug!("profile {:?} superseded before installation", superseded.path);
        }
        self.shared.info.store(Arc::new(info));
        Ok(())
    }

    /// Drop any profiles the audio thread has retired.
    pub fn reclaim(&self) {
        while self.shared.retired.pop().is_some() {}
    }

    pub fn info(&self) -> ProfileInfo {
        self.shared.info.load().as_ref().clone()
    }
}

/// The real-time processing pipeline: owns the active profile, the live
/// parameters and the per-block scratch state.
///
/// `process` never allocates, locks or touches the filesystem once the
/// pipeline is active; profile replacement arrives through the hand-off
/// queue as a whole-profile swap observed once per block.
pub struct AmpPipeline {
    params: ParameterSet,
    tube: TubeStage,
    profile: Option<Box<Profile>>,
    /// Path persisted in state blobs; empty when no profile was loaded.
    profile_path: String,

    sample_rate: u32,
    max_block: usize,
    active: bool,

    mono: Vec<f32>,
    wet_l: Vec<f32>,
    wet_r: Vec<f32>,
    dry_l: Vec<f32>,
    dry_r: Vec<f32>,

    shared: Arc<Handoff>,
}

impl AmpPipeline {
    pub fn new() -> (Self, ProfileHandle) {
        let shared = Arc::new(Handoff {
            incoming: ArrayQueue::new(HANDOFF_DEPTH),
            retired: ArrayQueue::new(HANDOFF_DEPTH),
            live_rate: AtomicU32::new(0),
            info: ArcSwap::from_pointee(ProfileInfo::default()),
            load_lock: Mutex::new(()),
        });

        (
            Self {
                params: ParameterSet::default(),
                tube: TubeStage::new(48000.0),
                profile: None,
                profile_path: String::new(),
                sample_rate: 0,
                max_block: 0,
                active: false,
                mono: Vec::new(),
                wet_l: Vec::new(),
                wet_r: Vec::new(),
                dry_l: Vec::new(),
                dry_r: Vec::new(),
                shared: Arc::clone(&shared),
            },
            ProfileHandle { shared },
        )
    }

    pub fn state(&self) -> PipelineState {
        match (self.active, self.profile.is_some()) {
            (false, _) => PipelineState::Inactive,
            (true, false) => PipelineState::ActiveNoProfile,
            (true, true) => PipelineState::ActiveWithProfile,
        }
    }

    pub const fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    /// Path of the active (or persisted) profile; empty when none.
    pub fn profile_path(&self) -> &str {
        &self.profile_path
    }

    /// Bring the pipeline up at `sample_rate`, sized for host blocks of at
    /// most `max_block` frames. If a profile path was restored earlier the
    /// profile is loaded synchronously; a failed load is logged and leaves
    /// the pipeline active without a profile.
    pub fn activate(&mut self, sample_rate: u32, max_block: usize) {
        self.sample_rate = sample_rate;
        self.max_block = max_block.max(crate::profile::FRAGMENT);
        self.mono = vec![0.0; self.max_block];
        self.wet_l = vec![0.0; self.max_block];
        self.wet_r = vec![0.0; self.max_block];
        self.dry_l = vec![0.0; self.max_block];
        self.dry_r = vec![0.0; self.max_block];
        self.tube = TubeStage::new(sample_rate as f32);
        self.active = true;
        self.shared.live_rate.store(sample_rate, Ordering::Release);

        if !self.profile_path.is_empty() {
            let path = PathBuf::from(&self.profile_path);
            match loader::load(&path, sample_rate) {
                Ok(profile) => self.install(Box::new(profile)),
                Err(e) => warn!("activation load of {:?} failed: {e}", path),
            }
        }
    }

    /// Tear the pipeline down and release the active profile. Control
    /// context only; the persisted path survives for the next activation.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.shared.live_rate.store(0, Ordering::Release);
        drop(self.profile.take());
        while self.shared.incoming.pop().is_some() {}
        while self.shared.retired.pop().is_some() {}
        self.shared.info.store(Arc::new(ProfileInfo::default()));
    }

    /// Synchronous control-context load. On failure the current profile
    /// stays untouched.
    pub fn load_profile(&mut self, path: &Path) -> Result<(), ProfileError> {
        if !self.active {
            return Err(ProfileError::Inactive);
        }
        let profile = loader::load(path, self.sample_rate)?;
        let info = ProfileInfo {
            path: Some(profile.path.clone()),
            preamp_partitions: profile.preamp.partition_count(),
            cabinet_partitions: profile.cabinet.partition_count(),
        };
        self.install(Box::new(profile));
        self.shared.info.store(Arc::new(info));
        Ok(())
    }

    fn install(&mut self, profile: Box<Profile>) {
        self.profile_path = profile.path.to_string_lossy().into_owned();
        if let Some(old) = self.profile.replace(profile) {
            // Hand the old engines back to the control context. If that
            // queue is somehow full the drop happens here; better a one-off
            // free on the audio thread than a leak.
            if let Err(old) = self.shared.retired.push(old) {
                drop(old);
            }
        }
        self.tube.reset();
    }

    /// Apply a block's parameter change events; the last change per
    /// parameter is the one that sticks.
    pub fn handle_parameter_changes(&mut self, changes: &[ParamChange]) {
        for change in changes {
            self.params.apply(change);
        }
    }

    /// Process one stereo block. Real-time safe: no allocation, no locks,
    /// no I/O. Bypass copies input to output verbatim; an active pipeline
    /// without a profile produces silence.
    pub fn process(&mut self, input: [&[f32]; 2], output: [&mut [f32]; 2]) {
        let [in_l, in_r] = input;
        let [out_l, out_r] = output;
        let frames = in_l
            .len()
            .min(in_r.len())
            .min(out_l.len())
            .min(out_r.len());

        if self.params.bypass {
            out_l[..frames].copy_from_slice(&in_l[..frames]);
            out_r[..frames].copy_from_slice(&in_r[..frames]);
            return;
        }

        // Install at most one pending profile and use it for the whole
        // block.
        if self.active
            && let Some(profile) = self.shared.incoming.pop()
        {
            self.install(profile);
        }

        if !self.active || self.profile.is_none() {
            out_l[..frames].fill(0.0);
            out_r[..frames].fill(0.0);
            return;
        }

        let mut offset = 0;
        while offset < frames {
            let n = (frames - offset).min(self.max_block);
            self.process_chunk(
                &in_l[offset..offset + n],
                &in_r[offset..offset + n],
                &mut out_l[offset..offset + n],
                &mut out_r[offset..offset + n],
            );
            offset += n;
        }
    }

    fn process_chunk(
        &mut self,
        in_l: &[f32],
        in_r: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
    ) {
        let n = in_l.len();
        let profile = self.profile.as_mut().expect("checked by process");
        let tube_params = self.params.tube_params();

        // Tube preamps are mono: average the channels before the IR.
        for i in 0..n {
            self.mono[i] = (in_l[i] + in_r[i]) * 0.5;
        }

        run_convolver_mono(&mut profile.preamp, &mut self.mono[..n]);

        self.tube.compute_block(
            &self.mono[..n],
            &mut self.wet_l[..n],
            &mut self.wet_r[..n],
            &profile.header,
            &tube_params,
        );

        // Keep the pre-cabinet signal for the dry side of the mix.
        self.dry_l[..n].copy_from_slice(&self.wet_l[..n]);
        self.dry_r[..n].copy_from_slice(&self.wet_r[..n]);

        run_convolver_stereo(
            &mut profile.cabinet,
            &mut self.wet_l[..n],
            &mut self.wet_r[..n],
        );

        let mix = tube_params.cabinet;
        for i in 0..n {
            out_l[i] = self.wet_l[i] * mix + self.dry_l[i] * (1.0 - mix);
            out_r[i] = self.wet_r[i] * mix + self.dry_r[i] * (1.0 - mix);
        }
    }

    /// Serialize the live parameters, bypass flag and profile path into the
    /// host-opaque state blob.
    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        let path = self.profile_path.as_bytes();
        if path.len() > u8::MAX as usize {
            return Err(StateError::PathTooLong);
        }

        let p = &self.params;
        let mut blob = Vec::with_capacity(7 * 4 + 4 + 1 + path.len());
        for value in [p.drive, p.bass, p.middle, p.treble, p.volume, p.level, p.cabinet] {
            blob.extend_from_slice(&value.to_le_bytes());
        }
        blob.extend_from_slice(&i32::from(p.bypass).to_le_bytes());
        blob.push(path.len() as u8);
        blob.extend_from_slice(path);
        Ok(blob)
    }

    /// Restore a blob produced by [`save_state`]. When the pipeline is
    /// active and the blob names a profile, the profile is reloaded; a
    /// failed reload keeps whatever was active and is only logged.
    ///
    /// [`save_state`]: AmpPipeline::save_state
    pub fn restore_state(&mut self, blob: &[u8]) -> Result<(), StateError> {
        let mut cursor = 0usize;
        let read_f32 = |cursor: &mut usize| -> Result<f32, StateError> {
            let bytes = blob
                .get(*cursor..*cursor + 4)
                .ok_or(StateError::ShortRead)?;
            *cursor += 4;
            Ok(f32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
        };

        let drive = read_f32(&mut cursor)?;
        let bass = read_f32(&mut cursor)?;
        let middle = read_f32(&mut cursor)?;
        let treble = read_f32(&mut cursor)?;
        let volume = read_f32(&mut cursor)?;
        let level = read_f32(&mut cursor)?;
        let cabinet = read_f32(&mut cursor)?;

        let bypass_bytes = blob.get(cursor..cursor + 4).ok_or(StateError::ShortRead)?;
        let bypass = i32::from_le_bytes(bypass_bytes.try_into().expect("4-byte slice")) > 0;
        cursor += 4;

        let path_len = *blob.get(cursor).ok_or(StateError::ShortRead)? as usize;
        cursor += 1;
        let path_bytes = blob
            .get(cursor..cursor + path_len)
            .ok_or(StateError::ShortRead)?;
        let path = String::from_utf8_lossy(path_bytes).into_owned();

        self.params = ParameterSet {
            drive,
            bass,
            middle,
            treble,
            volume,
            level,
            cabinet,
            bypass,
        };
        self.profile_path = path;

        if self.active && !self.profile_path.is_empty() {
            let path = PathBuf::from(&self.profile_path);
            match loader::load(&path, self.sample_rate) {
                Ok(profile) => {
                    let info = ProfileInfo {
                        path: Some(profile.path.clone()),
                        preamp_partitions: profile.preamp.partition_count(),
                        cabinet_partitions: profile.cabinet.partition_count(),
                    };
                    self.install(Box::new(profile));
                    self.shared.info.store(Arc::new(info));
                }
                Err(e) => warn!("state restore load of {:?} failed: {e}", path),
            }
        }
        Ok(())
    }
}

/// Drive a 1-in/1-out engine over `buf` in fragment-sized steps, in place.
/// A trailing partial fragment is zero-padded and only its valid prefix
/// copied back.
fn run_convolver_mono(engine: &mut ConvolutionEngine, buf: &mut [f32]) {
    let fragment = engine.fragment_size();
    let mut pos = 0;
    while pos + fragment <= buf.len() {
        engine.input_buffer(0).copy_from_slice(&buf[pos..pos + fragment]);
        engine.process();
        buf[pos..pos + fragment].copy_from_slice(engine.output_buffer(0));
        pos += fragment;
    }

    let rem = buf.len() - pos;
    if rem > 0 {
        let stage = engine.input_buffer(0);
        stage[..rem].copy_from_slice(&buf[pos..]);
        stage[rem..].fill(0.0);
        engine.process();
        buf[pos..].copy_from_slice(&engine.output_buffer(0)[..rem]);
    }
}

/// Stereo counterpart of [`run_convolver_mono`] for the 2-in/2-out cabinet
/// engine.
fn run_convolver_stereo(engine: &mut ConvolutionEngine, left: &mut [f32], right: &mut [f32]) {
    let fragment = engine.fragment_size();
    let frames = left.len();
    let mut pos = 0;
    while pos + fragment <= frames {
        engine.input_buffer(0).copy_from_slice(&left[pos..pos + fragment]);
        engine.input_buffer(1).copy_from_slice(&right[pos..pos + fragment]);
        engine.process();
        left[pos..pos + fragment].copy_from_slice(engine.output_buffer(0));
        right[pos..pos + fragment].copy_from_slice(engine.output_buffer(1));
        pos += fragment;
    }

    let rem = frames - pos;
    if rem > 0 {
        for (ch, buf) in [(0, &mut *left), (1, &mut *right)] {
            let stage = engine.input_buffer(ch);
            stage[..rem].copy_from_slice(&buf[pos..]);
            stage[rem..].fill(0.0);
        }
        engine.process();
        left[pos..].copy_from_slice(&engine.output_buffer(0)[..rem]);
        right[pos..].copy_from_slice(&engine.output_buffer(1)[..rem]);
    }
}
