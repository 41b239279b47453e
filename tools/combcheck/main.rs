//! Decodes a synthetic moving colour-bar sequence and reports how far each
//! frame lands from the colours that were encoded.
//!
//! Usage: `combcheck [preset] [frames] [threads] [output.rgb]`

use anyhow::{Context, Result};
use flexi_logger::{Logger, LoggerHandle};
use ldchroma::dsp::{ColourConverter, QuadratureDemodulator};
use ldchroma::ntsc::line_phase;
use ldchroma::{
    Configuration, DecodedFrame, DecoderPool, Field, FieldMetadata, FieldSource, FrameSink,
    NtscDecoder, OutputGeometry, PalDecoder, Preset, PresetManager, RgbWriter, VideoSystem,
};
use std::f64::consts::PI;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

// (Y, chroma 1, chroma 2) in IRE, left to right.
const BARS: [(f32, f32, f32); 8] = [
    (75.0, 0.0, 0.0),
    (67.5, 12.0, -22.0),
    (56.0, -30.0, -9.0),
    (48.0, -18.0, -31.0),
    (36.0, 18.0, 31.0),
    (28.0, 30.0, 9.0),
    (17.0, -12.0, 22.0),
    (7.5, 0.0, 0.0),
];
// Samples the bars move to the right per frame.
const BAR_SPEED: usize = 3;
// Output pixels near the picture edge left out of the error figures.
const EDGE_MARGIN: usize = 16;

fn setup_logging(spec: &str) -> Result<LoggerHandle> {
    Logger::try_with_env_or_str(spec)
        .context("invalid log specification")?
        .log_to_stderr()
        .start()
        .context("logger initialisation failed")
}

/// Bar pattern in raw sample units at full-raster column `x` of frame `n`.
fn bar_at(config: &Configuration, n: usize, x: usize) -> (f32, f32, f32) {
    let width = config.active_width().max(1);
    let offset = (x + width - (n * BAR_SPEED) % width).saturating_sub(config.active_video_start) % width;
    let (y, c1, c2) = BARS[offset * BARS.len() / width];
    let ire = config.irescale();
    (config.black_level as f32 + y * ire, c1 * ire, c2 * ire)
}

struct BarSource {
    config: Configuration,
    frames: usize,
}

impl BarSource {
    fn ntsc_field(&self, n: usize, parity: usize) -> Field {
        let c = &self.config;
        let phase_id = if n % 2 == 0 { 1 + parity as u8 } else { 3 + parity as u8 };
        let mut samples = vec![c.black_level; c.field_width * c.field_height];
        for l in 0..c.field_height {
            let lp = line_phase(phase_id, l);
            for x in c.active_video_start..c.active_video_end {
                let (y, i, q) = bar_at(c, n, x);
                let chroma = QuadratureDemodulator::chroma_at(i, q, QuadratureDemodulator::sample_phase(x, lp));
                samples[l * c.field_width + x] = quantise((y + chroma) as f64);
            }
        }
        Field::new(c.field_width, c.field_height, samples, self.metadata(phase_id, parity))
    }

    fn pal_field(&self, n: usize, parity: usize) -> Field {
        let c = &self.config;
        let advance = 1.5 * PI + 2.0 * PI / 625.0;
        let burst = (c.system.nominal_burst_ire() * c.irescale()) as f64;
        let mut samples = vec![c.black_level; c.field_width * c.field_height];
        for l in 0..c.field_height {
            let line_number = (2 * n + parity) * c.field_height + l;
            let phi = line_number as f64 * advance;
            let v_switch = if line_number % 2 == 0 { 1.0 } else { -1.0 };
            let row = &mut samples[l * c.field_width..(l + 1) * c.field_width];
            for (x, s) in row
                .iter_mut()
                .enumerate()
                .take(c.colour_burst_end)
                .skip(c.colour_burst_start)
            {
                let arg = PI / 2.0 * x as f64 + phi + PI - v_switch * PI / 4.0;
                *s = quantise(c.black_level as f64 + burst * arg.sin());
            }
            for x in c.active_video_start..c.active_video_end {
                let (y, u, v) = bar_at(c, n, x);
                let arg = PI / 2.0 * x as f64 + phi;
                let chroma = u as f64 * arg.sin() + v_switch * v as f64 * arg.cos();
                row[x] = quantise(y as f64 + chroma);
            }
        }
        Field::new(c.field_width, c.field_height, samples, self.metadata(((2 * n + parity) % 8) as u8 + 1, parity))
    }

    fn metadata(&self, phase_id: u8, parity: usize) -> FieldMetadata {
        FieldMetadata {
            phase_id,
            burst_ire: self.config.system.nominal_burst_ire(),
            is_first_field: parity == 0,
        }
    }
}

fn quantise(v: f64) -> u16 {
    v.round().clamp(0.0, 65535.0) as u16
}

impl FieldSource for BarSource {
    fn len(&self) -> usize {
        self.frames
    }

    fn read_frame(&mut self, index: usize) -> ldchroma::Result<(Field, Field)> {
        Ok(match self.config.system {
            VideoSystem::Ntsc => (self.ntsc_field(index, 0), self.ntsc_field(index, 1)),
            VideoSystem::Pal => (self.pal_field(index, 0), self.pal_field(index, 1)),
        })
    }
}

/// Compares every frame against the encoded bars, then passes it on.
struct CheckSink {
    config: Configuration,
    geometry: OutputGeometry,
    converter: ColourConverter,
    out: Option<RgbWriter<BufWriter<File>>>,
    worst: f64,
}

impl FrameSink for CheckSink {
    fn write_frame(&mut self, frame: &DecodedFrame) -> io::Result<()> {
        let geo = &self.geometry;
        let rows = geo.y1 - geo.y0;
        let mut sum = 0.0f64;
        let mut max = 0.0f64;
        let mut count = 0usize;
        for r in EDGE_MARGIN..rows.saturating_sub(EDGE_MARGIN) {
            for x in EDGE_MARGIN..geo.width().saturating_sub(EDGE_MARGIN) {
                let (y, c1, c2) = bar_at(&self.config, frame.index, geo.x0 + x);
                let expected = self.converter.convert(y, c1, c2);
                let got = frame.rgb.pixel(x, geo.top_pad + r);
                for c in 0..3 {
                    let err = (got[c] as f64 - expected[c] as f64).abs();
                    sum += err;
                    max = max.max(err);
                    count += 1;
                }
            }
        }
        let mean = sum / count.max(1) as f64;
        self.worst = self.worst.max(mean);
        println!(
            "  frame {:>4} : mean abs error {:>8.1}   max {:>8.0}",
            frame.index, mean, max
        );

        if let Some(out) = self.out.as_mut() {
            out.write_frame(frame)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.out.as_mut() {
            Some(out) => out.finish(),
            None => Ok(()),
        }
    }
}

fn main() -> Result<()> {
    let _logger = setup_logging("info")?;

    let mut args = std::env::args().skip(1);
    let preset_name = args.next().unwrap_or_else(|| Preset::default().name().to_string());
    let preset = Preset::from_name(&preset_name)
        .with_context(|| format!("unknown preset '{preset_name}'"))?;
    let frames = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid frame count '{s}'"))?,
        None => 8,
    };
    let threads = match args.next() {
        Some(s) => s.parse().with_context(|| format!("invalid thread count '{s}'"))?,
        None => std::thread::available_parallelism().map_or(1, |n| n.get()),
    };
    let output = args.next().map(PathBuf::from);

    let config = PresetManager::shared().configuration(preset);
    let out = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output '{}'", path.display()))?;
            Some(RgbWriter::new(BufWriter::new(file)))
        }
        None => None,
    };
    let mut sink = CheckSink {
        geometry: OutputGeometry::new(&config),
        converter: ColourConverter::new(&config, config.system.nominal_burst_ire()),
        config: config.clone(),
        out,
        worst: 0.0,
    };
    let source = BarSource {
        config: config.clone(),
        frames,
    };

    println!("Decoding {} frames with preset '{}':", frames, preset.name());
    let written = match config.system {
        VideoSystem::Ntsc => {
            let decoder = NtscDecoder::new(config)?;
            DecoderPool::new(&decoder, threads).run(source, &mut sink)?
        }
        VideoSystem::Pal => {
            let decoder = PalDecoder::new(config)?;
            DecoderPool::new(&decoder, threads).run(source, &mut sink)?
        }
    };

    println!("Validation summary:");
    println!("  frames written       : {}", written);
    println!("  worst mean abs error : {:.1}", sink.worst);
    if let Some(path) = output {
        println!("  RGB48 output         : {}", path.display());
    }
    Ok(())
}
