//! Media probing via ffprobe.

use std::path::Path;

use ffprobe::{FfProbe, Stream, ffprobe};
use log::debug;

use crate::error::{CoreError, Result};
use crate::media::MediaDescriptor;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u32 = 2;
const DEFAULT_BITRATE: u32 = 128_000;

/// Probes one input file into a [`MediaDescriptor`].
pub fn probe_media(path: &Path) -> Result<MediaDescriptor> {
    debug!("probing {}", path.display());
    let info = ffprobe(path).map_err(|e| CoreError::Probe {
        file: path.to_path_buf(),
        reason: format!("{e:?}"),
    })?;
    descriptor_from_probe(path, &info)
}

fn descriptor_from_probe(path: &Path, info: &FfProbe) -> Result<MediaDescriptor> {
    let stream = info
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| CoreError::Probe {
            file: path.to_path_buf(),
            reason: "no audio stream".to_string(),
        })?;

    let duration_secs = stream
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            info.format
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
        })
        .filter(|d| *d > 0.0)
        .ok_or_else(|| CoreError::Probe {
            file: path.to_path_buf(),
            reason: "could not determine duration".to_string(),
        })?;

    let sample_rate = stream
        .sample_rate
        .as_deref()
        .and_then(|r| r.parse::<u32>().ok())
        .unwrap_or(DEFAULT_SAMPLE_RATE);

    let channels = stream
        .channels
        .filter(|c| *c > 0)
        .map(|c| c as u32)
        .unwrap_or(DEFAULT_CHANNELS);

    // stream bitrate is often absent for lossless inputs; fall back to the
    // container-level figure
    let bitrate = parse_bitrate(stream)
        .or_else(|| {
            info.format
                .bit_rate
                .as_deref()
                .and_then(|b| b.parse::<u32>().ok())
        })
        .unwrap_or(DEFAULT_BITRATE);

    Ok(MediaDescriptor::new(
        path.to_path_buf(),
        (duration_secs * 1000.0).round() as u64,
        sample_rate,
        channels,
        bitrate,
    ))
}

fn parse_bitrate(stream: &Stream) -> Option<u32> {
    stream.bit_rate.as_deref().and_then(|b| b.parse::<u32>().ok())
}
