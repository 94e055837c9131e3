//! Bounded polyline sampling. Some providers return hundreds of vertices per
//! candidate; scoring every consecutive pair would fan out an unbounded
//! number of external calls. Sampling caps the work at `SEGMENT_CAP` strided
//! segments plus the forced final one, so a route costs at most 51 segment
//! evaluations no matter how dense its geometry is.

use crate::geomath::{GeoPoint, Segment};

/// Maximum strided segments per route; the forced final segment can add one.
pub const SEGMENT_CAP: usize = 50;

/// Start indices of the sampled segments: 0, stride, 2·stride, … up to N−2,
/// with N−2 force-included so the approach to the destination is always
/// scored. The stride is the ceiling of (N−1)/cap; a floor here would blow
/// past the cap for N just above 100.
pub fn sample_indices(vertex_count: usize) -> Vec<usize> {
    if vertex_count < 2 {
        return Vec::new();
    }
    let last = vertex_count - 2;
    let stride = vertex_count.saturating_sub(1).div_ceil(SEGMENT_CAP).max(1);

    let mut indices: Vec<usize> = (0..=last).step_by(stride).collect();
    if indices.last() != Some(&last) {
        indices.push(last);
    }
    indices
}

/// Builds the sampled segments for a polyline, endpoints guaranteed.
pub fn sample_segments(polyline: &[GeoPoint]) -> Vec<Segment> {
    sample_indices(polyline.len())
        .into_iter()
        .map(|i| Segment::new(polyline[i], polyline[i + 1]))
        .collect()
}
