use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use tubetone::profile::{REFERENCE_RATE, loader};

#[derive(Parser, Debug)]
#[command(name = "tapfinfo")]
#[command(version)]
#[command(about = "Inspect a .tapf amplifier profile file.")]
struct Args {
    /// Profile file to inspect
    path: PathBuf,

    /// Build the profile's engines at this sample rate instead of the
    /// 48 kHz reference rate
    #[arg(long, env = "TAPFINFO_RATE", default_value_t = REFERENCE_RATE)]
    rate: u32,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !loader::check_file(&args.path) {
        bail!("{} is not a valid profile file", args.path.display());
    }

    let profile = loader::load(&args.path, args.rate)
        .with_context(|| format!("failed to load {}", args.path.display()))?;
    info!("loaded {} at {} Hz", args.path.display(), args.rate);

    let h = &profile.header;
    println!("profile: {}", profile.path.display());
    println!("  power amp   bias {:>8.3}  kreg {:>8.3}  upor {:>8.3}", h.amp_bias, h.amp_kreg, h.amp_upor);
    println!("  preamp      bias {:>8.3}  kreg {:>8.3}  upor {:>8.3}", h.preamp_bias, h.preamp_kreg, h.preamp_upor);
    println!("  tonestack   low {:.0} Hz / {:.0}  mid {:.0} Hz / {:.0}  high {:.0} Hz / {:.0}",
        h.tonestack_low_freq, h.tonestack_low_band,
        h.tonestack_middle_freq, h.tonestack_middle_band,
        h.tonestack_high_freq, h.tonestack_high_band);
    println!("  levels      preamp {:.3}  amp {:.3}  output {:.3}", h.preamp_level, h.amp_level, h.output_level);
    println!("  sag         time {:.3} s  coeff {:.3}", h.sag_time, h.sag_coeff);
    println!(
        "  engines     preamp {} partitions, cabinet {} partitions at fragment {}",
        profile.preamp.partition_count(),
        profile.cabinet.partition_count(),
        profile.preamp.fragment_size()
    );

    Ok(())
}
