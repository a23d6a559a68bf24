use super::statistics::{interp, mean, min_max};

/// Equal-width histogram spanning the value range.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub counts: Vec<usize>,
    pub bin_centers: Vec<f64>,
}

/// Bins `values` into `nbins` equal-width bins over `[min, max]`.
///
/// Constant input yields a single bin centred on the value.
pub fn histogram(values: &[f64], nbins: usize) -> Histogram {
    assert!(nbins > 0, "nbins must be positive");
    let (lo, hi) = min_max(values);
    if values.is_empty() || hi <= lo {
        return Histogram {
            counts: vec![values.len()],
            bin_centers: vec![if values.is_empty() { 0.0 } else { lo }],
        };
    }

    let width = (hi - lo) / nbins as f64;
    let mut counts = vec![0usize; nbins];
    for &v in values {
        let bin = (((v - lo) / width) as usize).min(nbins - 1);
        counts[bin] += 1;
    }
    let bin_centers = (0..nbins)
        .map(|i| lo + width * (i as f64 + 0.5))
        .collect();

    Histogram {
        counts,
        bin_centers,
    }
}

/// Ridler-Calvard (isodata) threshold.
///
/// Returns the lowest bin centre `t` for which `t` lies within one bin width
/// below the average of the mean intensities under and above it.
pub fn threshold_isodata(values: &[f64], nbins: usize) -> f64 {
    let hist = histogram(values, nbins);
    if hist.bin_centers.len() == 1 {
        return hist.bin_centers[0];
    }

    let n = hist.counts.len();
    let bin_width = hist.bin_centers[1] - hist.bin_centers[0];
    let total_count: f64 = hist.counts.iter().map(|&c| c as f64).sum();
    let total_intensity: f64 = hist
        .counts
        .iter()
        .zip(&hist.bin_centers)
        .map(|(&c, &b)| c as f64 * b)
        .sum();

    let mut count_low = 0.0;
    let mut intensity_low = 0.0;
    for i in 0..n - 1 {
        count_low += hist.counts[i] as f64;
        intensity_low += hist.counts[i] as f64 * hist.bin_centers[i];
        let count_high = total_count - count_low;
        if count_low == 0.0 || count_high == 0.0 {
            continue;
        }
        let lower = intensity_low / count_low;
        let higher = (total_intensity - intensity_low) / count_high;
        let distance = (lower + higher) * 0.5 - hist.bin_centers[i];
        if distance >= 0.0 && distance < bin_width {
            return hist.bin_centers[i];
        }
    }

    tracing::debug!("isodata found no stable bin, falling back to the mean");
    mean(values)
}

/// Maps values through their cumulative distribution, giving output in `[0, 1]`.
pub fn equalize_histogram(values: &[f64], nbins: usize) -> Vec<f64> {
    let hist = histogram(values, nbins);
    let total = values.len() as f64;
    let mut running = 0usize;
    let cdf: Vec<f64> = hist
        .counts
        .iter()
        .map(|&c| {
            running += c;
            running as f64 / total
        })
        .collect();
    values
        .iter()
        .map(|&v| interp(v, &hist.bin_centers, &cdf))
        .collect()
}
