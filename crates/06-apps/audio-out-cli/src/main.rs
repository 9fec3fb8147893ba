//! Plays a test tone through the audio-out port manager.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use audio_out::{
    AudioOutConfig, OutputFormat, PortHandle, PortKind, PortManager, SampleType, MAX_CHANNELS,
};
use clap::{Parser, ValueEnum};
use host_audio::{HostBackend, MemoryBackend, NullBackend};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Text rendering helpers used after playback.
mod render {
    use audio_out::{PortHandle, PortMetricsSnapshot, PortStatus};

    /// One summary line per port.
    pub fn port_line(handle: PortHandle, status: &PortStatus, metrics: &PortMetricsSnapshot) -> String {
        format!(
            "{handle} kind={} {} {}ch {}@{}Hz buffers={} bytes={} waits={} rejected={}",
            status.kind.0,
            status.format,
            status.channels,
            status.samples_per_buffer,
            status.sample_rate_hz,
            metrics.buffers,
            metrics.bytes,
            metrics.backpressure_waits,
            metrics.rejected
        )
    }

    /// Channel gains as a bracketed list.
    pub fn gains(gains: &[i32]) -> String {
        let joined: Vec<String> = gains.iter().map(i32::to_string).collect();
        format!("[{}]", joined.join(" "))
    }
}

/// Open audio-out ports and stream a sine tone through them.
#[derive(Parser, Debug)]
#[command(author, version, about = "Drive the guest audio-out port manager", long_about = None)]
struct Cli {
    /// Host backend the ports play on.
    #[arg(short, long, value_enum, default_value_t = BackendArg::Memory)]
    backend: BackendArg,

    /// Guest sample format of every port.
    #[arg(short, long, value_enum, default_value_t = FormatArg::S16Stereo)]
    format: FormatArg,

    /// Playback rate in Hertz.
    #[arg(short, long, default_value_t = 48_000)]
    rate: u32,

    /// Samples per channel in one guest buffer.
    #[arg(short, long, default_value_t = 256)]
    samples: u32,

    /// Buffers submitted per port.
    #[arg(long, default_value_t = 200)]
    buffers: u32,

    /// Number of ports driven concurrently, one writer thread each.
    #[arg(short, long, default_value_t = 1)]
    ports: u32,

    /// Tone frequency in Hertz.
    #[arg(long, default_value_t = 440.0)]
    frequency: f64,

    /// Gain applied to every channel (32768 is unity).
    #[arg(short, long)]
    volume: Option<i32>,

    /// Scale submitted samples by the channel gains.
    #[arg(long)]
    apply_gain: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    /// Discard every buffer immediately.
    Null,
    /// In-memory streams draining at the playback rate.
    Memory,
    /// Default output device.
    Cpal,
}

/// Declared in raw guest numbering order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// 16-bit mono.
    #[value(name = "s16-mono")]
    S16Mono,
    /// 16-bit stereo.
    #[value(name = "s16-stereo")]
    S16Stereo,
    /// 16-bit eight channels.
    #[value(name = "s16-8ch")]
    S16Surround,
    /// Float mono.
    #[value(name = "f32-mono")]
    F32Mono,
    /// Float stereo.
    #[value(name = "f32-stereo")]
    F32Stereo,
    /// Float eight channels.
    #[value(name = "f32-8ch")]
    F32Surround,
    /// 16-bit eight channels, standard order.
    #[value(name = "s16-8ch-std")]
    S16SurroundStd,
    /// Float eight channels, standard order.
    #[value(name = "f32-8ch-std")]
    F32SurroundStd,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::S16Mono => OutputFormat::S16_MONO,
            FormatArg::S16Stereo => OutputFormat::S16_STEREO,
            FormatArg::S16Surround => OutputFormat::S16_8CH,
            FormatArg::F32Mono => OutputFormat::F32_MONO,
            FormatArg::F32Stereo => OutputFormat::F32_STEREO,
            FormatArg::F32Surround => OutputFormat::F32_8CH,
            FormatArg::S16SurroundStd => OutputFormat::S16_8CH_STD,
            FormatArg::F32SurroundStd => OutputFormat::F32_8CH_STD,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let backend = make_backend(cli.backend)?;
    let config = AudioOutConfig::default().with_apply_gain(cli.apply_gain);
    let manager = Arc::new(PortManager::new(backend, config).context("invalid port configuration")?);
    debug!("port config: {:?}", manager.config());
    let format = OutputFormat::from(cli.format);

    let mut handles = Vec::with_capacity(cli.ports as usize);
    for kind in 0..cli.ports {
        let handle = manager
            .open(PortKind(kind as i32), cli.samples, cli.rate, format)
            .with_context(|| format!("failed to open port {} of {}", kind + 1, cli.ports))?;
        if let Some(gain) = cli.volume {
            manager.set_volume(handle, 0xFF, &[gain; MAX_CHANNELS])?;
        }
        handles.push(handle);
    }
    info!(
        "playing {} Hz on {} port(s) as {format}, {} buffers of {} samples",
        cli.frequency, cli.ports, cli.buffers, cli.samples
    );

    let writers = handles
        .iter()
        .map(|&handle| {
            let manager = Arc::clone(&manager);
            let (buffers, samples, rate, frequency) = (cli.buffers, cli.samples, cli.rate, cli.frequency);
            thread::Builder::new()
                .name(format!("writer-{}", handle.get()))
                .spawn(move || play(&manager, handle, format, buffers, samples, rate, frequency))
                .context("failed to spawn writer thread")
        })
        .collect::<Result<Vec<_>>>()?;
    for writer in writers {
        match writer.join() {
            Ok(result) => result?,
            Err(_) => bail!("writer thread panicked"),
        }
    }

    for &handle in &handles {
        let status = manager.status(handle)?;
        let metrics = manager.metrics(handle)?;
        println!("{}", render::port_line(handle, &status, &metrics));
        println!("  gains {}", render::gains(&manager.volume(handle)?));
        manager.close(handle)?;
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set.
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn make_backend(arg: BackendArg) -> Result<Arc<dyn HostBackend>> {
    Ok(match arg {
        BackendArg::Null => NullBackend::new_handle(),
        BackendArg::Memory => Arc::new(MemoryBackend::new().realtime()),
        #[cfg(feature = "cpal")]
        BackendArg::Cpal => host_audio::CpalBackend::new_handle(),
        #[cfg(not(feature = "cpal"))]
        BackendArg::Cpal => bail!("built without the `cpal` feature"),
    })
}

fn play(
    manager: &PortManager,
    handle: PortHandle,
    format: OutputFormat,
    buffers: u32,
    samples: u32,
    rate: u32,
    frequency: f64,
) -> Result<()> {
    let mut phase = 0.0;
    let step = TAU * frequency / f64::from(rate);
    for index in 0..buffers {
        let buffer = tone(format, samples, step, &mut phase);
        let written = manager
            .output(handle, Some(buffer.as_slice()))
            .with_context(|| format!("output {index} on {handle} failed"))?;
        debug!("{handle}: buffer {index} wrote {written} samples");
    }
    Ok(())
}

/// One interleaved buffer of a quarter-amplitude sine, the same on every channel.
fn tone(format: OutputFormat, samples: u32, step: f64, phase: &mut f64) -> Vec<u8> {
    let channels = usize::from(format.channels());
    let mut out = Vec::with_capacity(samples as usize * format.frame_bytes());
    for _ in 0..samples {
        let value = 0.25 * phase.sin();
        *phase = (*phase + step) % TAU;
        for _ in 0..channels {
            match format.sample {
                SampleType::S16 => {
                    out.extend_from_slice(&((value * f64::from(i16::MAX)) as i16).to_le_bytes())
                }
                SampleType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_out::{PortMetricsSnapshot, PortStatus};
    use insta::assert_snapshot;

    #[test]
    fn tone_fills_one_buffer() {
        let mut phase = 0.0;
        for format in OutputFormat::ALL {
            let buffer = tone(format, 64, 0.1, &mut phase);
            assert_eq!(buffer.len(), 64 * format.frame_bytes());
        }
    }

    #[test]
    fn tone_starts_silent_and_repeats_across_channels() {
        let mut phase = 0.0;
        let buffer = tone(OutputFormat::S16_STEREO, 2, TAU / 4.0, &mut phase);
        assert_eq!(&buffer[..4], &[0, 0, 0, 0]);
        assert_eq!(buffer[4..6], buffer[6..8]);
        assert_ne!(&buffer[4..6], &[0, 0]);
    }

    #[test]
    fn port_line_render_matches_expectation() {
        let status = PortStatus {
            kind: PortKind(2),
            channels: 8,
            format: OutputFormat::F32_8CH_STD,
            samples_per_buffer: 256,
            sample_rate_hz: 48_000,
        };
        let metrics = PortMetricsSnapshot {
            buffers: 3,
            bytes: 24_576,
            backpressure_waits: 1,
            rejected: 0,
        };
        let handle = PortHandle::new(4).unwrap();
        assert_snapshot!(
            render::port_line(handle, &status, &metrics),
            @"#4 kind=2 f32-8ch-std 8ch 256@48000Hz buffers=3 bytes=24576 waits=1 rejected=0"
        );
    }

    #[test]
    fn gains_render_matches_expectation() {
        assert_snapshot!(render::gains(&[32768, 0, 16384]), @"[32768 0 16384]");
    }

    #[test]
    fn format_args_cover_every_format() {
        let mapped: Vec<OutputFormat> = FormatArg::value_variants()
            .iter()
            .map(|&arg| OutputFormat::from(arg))
            .collect();
        assert_eq!(mapped, OutputFormat::ALL.to_vec());
        for (raw, format) in mapped.iter().enumerate() {
            assert_eq!(format.to_raw(), raw as u32);
        }
    }

    #[test]
    fn format_names_match_display() {
        for &arg in FormatArg::value_variants() {
            let name = OutputFormat::from(arg).to_string();
            let cli = Cli::try_parse_from(["audio-out-cli", "--format", name.as_str()]).unwrap();
            assert_eq!(cli.format, arg, "{name}");
        }
    }

    #[test]
    fn apply_gain_flag_reaches_config() {
        let cli = Cli::try_parse_from(["audio-out-cli", "--apply-gain", "-b", "null"]).unwrap();
        let config = AudioOutConfig::default().with_apply_gain(cli.apply_gain);
        let manager = PortManager::new(make_backend(cli.backend).unwrap(), config).unwrap();
        assert!(manager.config().apply_gain);
        assert_eq!(manager.config().capacity, manager.capacity());
    }

    #[test]
    fn null_backend_run_completes() {
        let manager = PortManager::with_defaults(make_backend(BackendArg::Null).unwrap());
        let handle = manager
            .open(PortKind(0), 32, 48_000, OutputFormat::F32_STEREO)
            .unwrap();
        play(&manager, handle, OutputFormat::F32_STEREO, 4, 32, 48_000, 440.0).unwrap();
        assert_eq!(manager.metrics(handle).unwrap().buffers, 4);
    }
}
