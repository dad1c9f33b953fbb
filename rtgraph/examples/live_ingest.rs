//! Live ingestion demo for rtgraph.
//!
//! Feeds a noisy signal into a bounded channel, then shows interval
//! aggregates at several widths and interpolated point reads in every mode.

use rtgraph::{Channel, ChannelConfig, InterpolationMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 10 Hz samples, 1 s level-1 buckets, keep the last 10 minutes
    let config = ChannelConfig {
        base_width: 1.0,
        max_x_range: 600.0,
        ..ChannelConfig::default()
    };
    let mut channel = Channel::with_config("cpu.usage", "s", "%", config)?;

    let mut noise: u32 = 12_345;
    for i in 0..20_000u32 {
        // Small LCG so the demo needs no extra dependencies
        noise = noise.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let jitter = f64::from(noise >> 16) / f64::from(u16::MAX) - 0.5;

        let t = f64::from(i) * 0.1;
        let value = 50.0 + 30.0 * (t / 60.0).sin() + 5.0 * jitter;
        channel.add_value(t, value)?;
    }

    let (oldest, newest) = channel.x_range().ok_or("channel is empty")?;
    println!(
        "{}: {} samples over [{oldest:.1}, {newest:.1}] {}",
        channel.name(),
        channel.len(),
        channel.x_units()
    );

    println!("\nLevels:");
    for level in channel.pyramid().levels() {
        println!(
            "  level {:2}  width {:>8.1}  entries {}",
            level.level(),
            level.width(),
            level.len()
        );
    }

    println!("\nInterval aggregates ending at the newest sample:");
    for width in [1.0, 10.0, 60.0, 300.0, 600.0] {
        let query = channel.query_interval_detailed(newest - width, newest)?;
        let s = query.summary;
        println!(
            "  last {width:>5.0}s: mean {:6.2} min {:6.2} max {:6.2} count {:5}  (level {}, {} buckets, {} raw)",
            s.mean, s.min, s.max, s.count, query.level_used, query.buckets_merged, query.raw_samples_scanned
        );
    }

    let at = newest - 42.37;
    println!("\nPoint reads at x = {at:.2}:");
    for mode in InterpolationMode::ALL {
        channel.set_interpolation(mode);
        let mut iter = channel.make_iterator();
        iter.seek_at(at);
        println!("  {mode:>8}: {:.4}", iter.read_value()?);
    }

    Ok(())
}
