//! Output parameter unification.
//!
//! The merge stage concatenates chunks byte-for-byte, so every chunk must
//! share identical audio parameters. Before scheduling, the set-wide maximum
//! sample rate, channel count and bitrate are written back onto every
//! descriptor. Runs single-threaded before any concurrency begins.

use crate::media::MediaDescriptor;

/// Rewrites every descriptor with the maximum sample rate, channel count and
/// bitrate observed across the set. A no-op on an empty slice; callers
/// reject empty media sets upstream.
pub fn unify_parameters(media: &mut [MediaDescriptor]) {
    let sample_rate = media.iter().map(|m| m.sample_rate).max().unwrap_or(0);
    let channels = media.iter().map(|m| m.channels).max().unwrap_or(0);
    let bitrate = media.iter().map(|m| m.bitrate).max().unwrap_or(0);

    for m in media {
        m.sample_rate = sample_rate;
        m.channels = channels;
        m.bitrate = bitrate;
    }
}
