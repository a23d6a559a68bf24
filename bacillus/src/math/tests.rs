use super::*;

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_median_odd_and_even() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
}

#[test]
fn test_std_dev_is_population() {
    let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    assert!((std_dev(&values) - 2.0).abs() < 1e-12);
}

#[test]
fn test_percentile_interpolates() {
    let values = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(percentile(&values, 0.0), 1.0);
    assert_eq!(percentile(&values, 100.0), 5.0);
    assert!((percentile(&values, 25.0) - 2.0).abs() < 1e-12);
    assert!((percentile(&values, 10.0) - 1.4).abs() < 1e-12);
}

#[test]
fn test_linspace_hits_both_ends() {
    let v = linspace(-1.0, 1.0, 5);
    assert_eq!(v, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    assert_eq!(linspace(3.0, 7.0, 1), vec![3.0]);
    assert!(linspace(0.0, 1.0, 0).is_empty());
}

#[test]
fn test_interp_clamps_and_interpolates() {
    let xp = [0.0, 1.0, 2.0];
    let fp = [10.0, 20.0, 40.0];
    assert_eq!(interp(-1.0, &xp, &fp), 10.0);
    assert_eq!(interp(0.5, &xp, &fp), 15.0);
    assert_eq!(interp(1.5, &xp, &fp), 30.0);
    assert_eq!(interp(5.0, &xp, &fp), 40.0);
}

// ============================================================================
// Histogram
// ============================================================================

#[test]
fn test_histogram_counts_everything() {
    let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
    let hist = histogram(&values, 10);
    assert_eq!(hist.counts.len(), 10);
    assert_eq!(hist.counts.iter().sum::<usize>(), 100);
    assert!(hist.counts.iter().all(|&c| c == 10));
    assert!((hist.bin_centers[0] - 4.95).abs() < 1e-9);
}

#[test]
fn test_isodata_splits_bimodal_values() {
    let mut values = vec![100.0; 500];
    values.extend(vec![900.0; 300]);
    let t = threshold_isodata(&values, 256);
    assert!(t > 100.0 && t < 900.0, "threshold {} should separate modes", t);
}

#[test]
fn test_isodata_constant_returns_value() {
    assert_eq!(threshold_isodata(&[5.0; 20], 256), 5.0);
}

#[test]
fn test_equalize_is_monotonic_and_bounded() {
    let values = vec![0.0, 1.0, 1.0, 2.0, 10.0, 50.0];
    let eq = equalize_histogram(&values, 256);
    for pair in eq.windows(2) {
        if pair[0] > pair[1] {
            panic!("equalized values must keep ordering: {:?}", eq);
        }
    }
    assert!(eq.iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(*eq.last().unwrap(), 1.0);
}
