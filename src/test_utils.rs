//! Synthetic composite signals for unit tests.

use crate::config::{Configuration, Dimensions};
use crate::dsp::QuadratureDemodulator;
use crate::frame::{Field, FieldMetadata, Plane};
use crate::ntsc::line_phase;
use std::f64::consts::PI;

/// 128x41 NTSC fields: 96 active columns, 72 active frame lines.
pub fn small_ntsc_config() -> Configuration {
    Configuration {
        field_width: 128,
        field_height: 41,
        active_video_start: 16,
        active_video_end: 112,
        first_active_line: 4,
        last_active_line: 76,
        colour_burst_start: 4,
        colour_burst_end: 12,
        ..Configuration::ntsc()
    }
}

pub fn small_ntsc_config_with(dimensions: Dimensions) -> Configuration {
    Configuration {
        dimensions,
        ..small_ntsc_config()
    }
}

/// 200x61 PAL fields: 152 active columns, 112 active frame lines.
pub fn small_pal_config() -> Configuration {
    Configuration {
        field_width: 200,
        field_height: 61,
        active_video_start: 40,
        active_video_end: 192,
        first_active_line: 4,
        last_active_line: 116,
        colour_burst_start: 8,
        colour_burst_end: 32,
        ..Configuration::pal()
    }
}

fn metadata(phase_id: u8, first: bool, system_burst: f32) -> FieldMetadata {
    FieldMetadata {
        phase_id,
        burst_ire: system_burst,
        is_first_field: first,
    }
}

fn quantise(v: f32) -> u16 {
    v.round().clamp(0.0, 65535.0) as u16
}

/// Field pair of NTSC frame `frame_index` carrying flat `luma` and flat
/// `i`/`q` chroma on every column.
pub fn ntsc_fields(config: &Configuration, frame_index: usize, luma: f32, i: f32, q: f32) -> (Field, Field) {
    ntsc_fields_with(config, frame_index, |_, _| (luma, i, q))
}

/// Field pair whose frame pixel `(x, y)` carries `pattern(x, y)` as
/// `(luma, i, q)`.
pub fn ntsc_fields_with<F>(config: &Configuration, frame_index: usize, pattern: F) -> (Field, Field)
where
    F: Fn(usize, usize) -> (f32, f32, f32),
{
    let ids = if frame_index % 2 == 0 { (1, 2) } else { (3, 4) };
    let (w, h) = (config.field_width, config.field_height);
    let burst = config.system.nominal_burst_ire();
    let make = |parity: usize, phase_id: u8| {
        let mut samples = vec![0u16; w * h];
        for l in 0..h {
            let lp = line_phase(phase_id, l);
            let y = 2 * l + parity;
            for x in 0..w {
                let (luma, i, q) = pattern(x, y);
                let c = QuadratureDemodulator::chroma_at(i, q, QuadratureDemodulator::sample_phase(x, lp));
                samples[l * w + x] = quantise(luma + c);
            }
        }
        Field::new(w, h, samples, metadata(phase_id, parity == 0, burst))
    };
    (make(0, ids.0), make(1, ids.1))
}

/// PAL frame raster with flat `y`, `u` and `v` in the active area, colour
/// burst on every line and black elsewhere. Returns the raster, the exact
/// chroma of the active area and the V-switch of every frame line.
pub fn pal_chroma(config: &Configuration, y: f32, u: f32, v: f32) -> (Plane, Plane, Vec<f32>) {
    let width = config.field_width;
    let height = config.frame_height();
    let mut raw = Plane::new(width, height);
    let mut chroma = Plane::new(width, height);
    let mut vsw = vec![0.0f32; height];
    let black = config.black_level as f64;
    let burst_amp = (config.system.nominal_burst_ire() * config.irescale()) as f64;
    let line_advance = 1.5 * PI + 2.0 * PI / 625.0;
    let field_offset = [0.25, 1.9];

    for row in 0..height {
        let (f, l) = (row % 2, row / 2);
        let phi = field_offset[f] + l as f64 * line_advance;
        let s = if (l + f) % 2 == 0 { 1.0 } else { -1.0 };
        vsw[row] = s as f32;

        let line = raw.row_mut(row);
        line.iter_mut().for_each(|p| *p = black as f32);
        for x in config.colour_burst_start..config.colour_burst_end {
            let arg = PI / 2.0 * x as f64 + phi + PI - s * PI / 4.0;
            line[x] = (black + burst_amp * arg.sin()) as f32;
        }
        for x in config.active_video_start..config.active_video_end {
            let arg = PI / 2.0 * x as f64 + phi;
            let c = u as f64 * arg.sin() + s * v as f64 * arg.cos();
            line[x] = (y as f64 + c) as f32;
            chroma.set(x, row, c as f32);
        }
    }
    (raw, chroma, vsw)
}

/// Field pair carrying [`pal_chroma`], quantised to 16 bits.
pub fn pal_fields(config: &Configuration, y: f32, u: f32, v: f32) -> (Field, Field) {
    let (raw, _, _) = pal_chroma(config, y, u, v);
    let (w, h) = (config.field_width, config.field_height);
    let burst = config.system.nominal_burst_ire();
    let make = |parity: usize, phase_id: u8| {
        let mut samples = vec![config.black_level; w * h];
        for l in 0..h {
            let row = 2 * l + parity;
            if row >= raw.height {
                continue;
            }
            for (d, &s) in samples[l * w..(l + 1) * w].iter_mut().zip(raw.row(row)) {
                *d = quantise(s);
            }
        }
        Field::new(w, h, samples, metadata(phase_id, parity == 0, burst))
    };
    (make(0, 1), make(1, 2))
}
