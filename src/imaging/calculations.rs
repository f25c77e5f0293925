//! Pure calculation functions for image dimensions and crop windows.
//!
//! All functions here are pure and testable without any I/O or images.

/// Height of a derived width that keeps the base `width:height` ratio.
///
/// Computed as `floor(base_height / base_width * width)` in integer
/// arithmetic, so the same inputs always truncate to the same pixel.
///
/// ```
/// # use simple_srcset::imaging::aspect_height;
/// assert_eq!(aspect_height(640, 360, 320), 180);
/// assert_eq!(aspect_height(640, 360, 1000), 562);
/// ```
pub fn aspect_height(base_width: u32, base_height: u32, width: u32) -> u32 {
    if base_width == 0 {
        return 0;
    }
    (u64::from(base_height) * u64::from(width) / u64::from(base_width)) as u32
}

/// Height of `width` at the source's natural aspect ratio (rounded, at least 1).
pub fn natural_height(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    if src_w == 0 {
        return 1;
    }
    ((src_h as f64 * width as f64 / src_w as f64).round() as u32).max(1)
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let w = (tgt_h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), tgt_h)
    } else {
        // Source is taller: width will match, height will exceed
        let h = (tgt_w as f64 / src_aspect).round() as u32;
        (tgt_w, h.max(tgt_h))
    }
}

/// Top-left corner of a `target` window inside a `fill` image for a
/// directional anchor.
///
/// `anchor` components are `0` (start edge), `1` (middle) or `2` (end edge).
pub fn anchored_offset(fill: (u32, u32), target: (u32, u32), anchor: (u8, u8)) -> (u32, u32) {
    let excess_x = fill.0.saturating_sub(target.0);
    let excess_y = fill.1.saturating_sub(target.1);
    (
        excess_x * u32::from(anchor.0) / 2,
        excess_y * u32::from(anchor.1) / 2,
    )
}

/// Start index of the `window`-long run of `profile` with the largest sum.
///
/// Ties keep the earliest run. A window at least as long as the profile
/// starts at zero.
pub fn best_window(profile: &[f64], window: usize) -> usize {
    if window == 0 || window >= profile.len() {
        return 0;
    }
    let mut sum: f64 = profile[..window].iter().sum();
    let mut best = (0, sum);
    for start in 1..=profile.len() - window {
        sum += profile[start + window - 1] - profile[start - 1];
        if sum > best.1 {
            best = (start, sum);
        }
    }
    best.0
}

/// Shannon entropy (bits) of a 256-bucket luminance histogram.
pub fn histogram_entropy(histogram: &[u32; 256]) -> f64 {
    let total: u64 = histogram.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return 0.0;
    }
    histogram
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// Candidate offsets for an exhaustive-but-bounded window search.
///
/// Returns at most `steps + 1` evenly spaced offsets from `0` to `excess`
/// inclusive, without duplicates.
pub fn candidate_offsets(excess: u32, steps: u32) -> Vec<u32> {
    if excess == 0 || steps == 0 {
        return vec![0];
    }
    let mut offsets: Vec<u32> = (0..=steps)
        .map(|i| (u64::from(excess) * u64::from(i) / u64::from(steps)) as u32)
        .collect();
    offsets.dedup();
    offsets
}
