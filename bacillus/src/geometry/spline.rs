//! Smoothing spline approximation of open and closed point sequences.
//!
//! The curve is parameterized by normalized chord length. A positive
//! smoothing factor `s` bounds the residual sum of squares: the points are
//! low-passed by keeping the fewest harmonics whose reconstruction stays
//! within `s` of the data (a Fourier series for closed curves, a sine series
//! of the end-to-end detrended points for open ones). The smoothed points are
//! then interpolated by a natural (open) or periodic (closed) cubic spline and
//! resampled at `n` uniform parameter values.

use glam::DVec2;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::math::linspace;

/// Resamples `points` to `n` points along a smoothing spline.
///
/// Open curves keep their end points exactly; closed curves return the
/// first point repeated as the last.
pub fn spline_approximation(
    points: &[DVec2],
    n: usize,
    smooth_factor: f64,
    closed: bool,
) -> Vec<DVec2> {
    let mut data: Vec<DVec2> = Vec::with_capacity(points.len());
    for &p in points {
        if data.last() != Some(&p) {
            data.push(p);
        }
    }
    if closed && data.len() > 1 && data.first() == data.last() {
        data.pop();
    }

    if n == 0 || data.is_empty() {
        return Vec::new();
    }
    if data.len() == 1 {
        return vec![data[0]; n];
    }
    if data.len() == 2 || (closed && data.len() < 4) {
        if closed {
            data.push(data[0]);
        }
        return resample_linear(&data, n);
    }

    let params = chord_parameters(&data, closed);
    let smoothed = if smooth_factor > 0.0 {
        if closed {
            smooth_periodic(&data, smooth_factor)
        } else {
            smooth_open(&data, smooth_factor)
        }
    } else {
        data
    };

    let mut out = if closed {
        let mut knots = params;
        knots.push(1.0);
        let mut values = smoothed.clone();
        values.push(smoothed[0]);
        let moments = periodic_moments(&knots, &values);
        evaluate(&knots, &values, &moments, n)
    } else {
        let moments = natural_moments(&params, &smoothed);
        evaluate(&params, &smoothed, &moments, n)
    };

    if closed {
        out[n - 1] = out[0];
    } else {
        out[0] = smoothed[0];
        out[n - 1] = smoothed[smoothed.len() - 1];
    }
    out
}

/// Normalized cumulative chord length; a closed curve includes the closing chord.
fn chord_parameters(points: &[DVec2], closed: bool) -> Vec<f64> {
    let mut params = Vec::with_capacity(points.len());
    let mut total = 0.0;
    params.push(0.0);
    for w in points.windows(2) {
        total += w[0].distance(w[1]);
        params.push(total);
    }
    if closed {
        total += points[points.len() - 1].distance(points[0]);
    }
    for t in &mut params {
        *t /= total;
    }
    params
}

/// `n` points evenly spaced by arc length along a polyline.
fn resample_linear(points: &[DVec2], n: usize) -> Vec<DVec2> {
    let params = chord_parameters(points, false);
    linspace(0.0, 1.0, n)
        .into_iter()
        .map(|u| {
            let hi = params.partition_point(|&t| t < u).clamp(1, points.len() - 1);
            let lo = hi - 1;
            let span = params[hi] - params[lo];
            let f = if span > 0.0 { (u - params[lo]) / span } else { 0.0 };
            points[lo].lerp(points[hi], f)
        })
        .collect()
}

// ============================================================================
// Harmonic truncation
// ============================================================================

/// Signed frequency of bin `k` of an `n`-point transform.
#[inline]
fn signed_frequency(k: usize, n: usize) -> usize {
    k.min(n - k)
}

/// Keeps the lowest harmonics of a complex signal (`x + iy`) such that the
/// discarded energy is at most `budget`. The discarded energy is scaled by
/// `energy_scale` before the comparison.
fn truncate_harmonics(
    signal: &[Complex<f64>],
    budget: f64,
    energy_scale: f64,
) -> Vec<Complex<f64>> {
    let n = signal.len();
    let mut planner = FftPlanner::new();
    let mut spectrum = signal.to_vec();
    planner.plan_fft_forward(n).process(&mut spectrum);

    // energy per frequency, by Parseval
    let max_freq = n / 2;
    let mut energy = vec![0.0; max_freq + 1];
    for (k, c) in spectrum.iter().enumerate() {
        energy[signed_frequency(k, n)] += c.norm_sqr() / n as f64 * energy_scale;
    }
    // lowest cutoff whose discarded energy still fits the budget
    let mut cutoff = max_freq;
    let mut discarded = 0.0;
    while cutoff > 0 && discarded + energy[cutoff] <= budget {
        discarded += energy[cutoff];
        cutoff -= 1;
    }

    for (k, c) in spectrum.iter_mut().enumerate() {
        if signed_frequency(k, n) > cutoff {
            *c = Complex::new(0.0, 0.0);
        }
    }
    planner.plan_fft_inverse(n).process(&mut spectrum);
    spectrum.iter().map(|&c| c / n as f64).collect()
}

fn smooth_periodic(data: &[DVec2], budget: f64) -> Vec<DVec2> {
    let signal: Vec<Complex<f64>> = data.iter().map(|p| Complex::new(p.x, p.y)).collect();
    truncate_harmonics(&signal, budget, 1.0)
        .into_iter()
        .map(|c| DVec2::new(c.re, c.im))
        .collect()
}

/// Removes the end-to-end line, smooths the odd extension, adds the line back.
fn smooth_open(data: &[DVec2], budget: f64) -> Vec<DVec2> {
    let m = data.len();
    let first = data[0];
    let last = data[m - 1];
    let trend = |i: usize| first.lerp(last, i as f64 / (m - 1) as f64);

    let mut signal: Vec<Complex<f64>> = Vec::with_capacity(2 * (m - 1));
    for (i, p) in data.iter().enumerate() {
        let r = *p - trend(i);
        signal.push(Complex::new(r.x, r.y));
    }
    for i in (1..m - 1).rev() {
        let c = signal[i];
        signal.push(-c);
    }
    // the odd extension holds every interior residual twice
    let smoothed = truncate_harmonics(&signal, budget, 0.5);

    let mut out: Vec<DVec2> = (0..m)
        .map(|i| trend(i) + DVec2::new(smoothed[i].re, smoothed[i].im))
        .collect();
    out[0] = first;
    out[m - 1] = last;
    out
}

// ============================================================================
// Cubic interpolation
// ============================================================================

/// Second derivatives of the natural cubic spline through `(t, z)`.
fn natural_moments(t: &[f64], z: &[DVec2]) -> Vec<DVec2> {
    let m = t.len();
    let mut moments = vec![DVec2::ZERO; m];
    if m < 3 {
        return moments;
    }
    let inner = m - 2;
    let mut diag = vec![0.0; inner];
    let mut upper = vec![0.0; inner];
    let mut rhs = vec![DVec2::ZERO; inner];
    for r in 0..inner {
        let i = r + 1;
        let h0 = t[i] - t[i - 1];
        let h1 = t[i + 1] - t[i];
        diag[r] = 2.0 * (h0 + h1);
        upper[r] = h1;
        rhs[r] = 6.0 * ((z[i + 1] - z[i]) / h1 - (z[i] - z[i - 1]) / h0);
    }
    // lower[r] = h0 of row r, equal to upper[r - 1]
    for r in 1..inner {
        let w = upper[r - 1] / diag[r - 1];
        diag[r] -= w * upper[r - 1];
        rhs[r] = rhs[r] - w * rhs[r - 1];
    }
    let mut x = vec![DVec2::ZERO; inner];
    for r in (0..inner).rev() {
        let next = if r + 1 < inner { x[r + 1] } else { DVec2::ZERO };
        x[r] = (rhs[r] - upper[r] * next) / diag[r];
    }
    moments[1..m - 1].copy_from_slice(&x);
    moments
}

/// Second derivatives of the periodic cubic spline through `(t, z)`, where the
/// last knot closes the curve (`z[last] == z[0]`).
fn periodic_moments(t: &[f64], z: &[DVec2]) -> Vec<DVec2> {
    let m = t.len() - 1;
    let h: Vec<f64> = (0..m).map(|i| t[i + 1] - t[i]).collect();

    // cyclic tridiagonal system: a[i] M[i-1] + b[i] M[i] + c[i] M[i+1] = d[i]
    let mut a = vec![0.0; m];
    let mut b = vec![0.0; m];
    let mut c = vec![0.0; m];
    let mut d = vec![DVec2::ZERO; m];
    for i in 0..m {
        let hp = h[(i + m - 1) % m];
        let hn = h[i];
        let zp = z[(i + m - 1) % m];
        let zn = z[i + 1];
        a[i] = hp;
        b[i] = 2.0 * (hp + hn);
        c[i] = hn;
        d[i] = 6.0 * ((zn - z[i]) / hn - (z[i] - zp) / hp);
    }

    // Sherman-Morrison: A = T + u v', with the corners folded into T's diagonal
    let gamma = -b[0];
    let alpha = c[m - 1];
    let beta = a[0];
    let mut bb = b.clone();
    bb[0] -= gamma;
    bb[m - 1] -= alpha * beta / gamma;

    let y = solve_tridiagonal(&a, &bb, &c, &d);
    let mut u = vec![DVec2::ZERO; m];
    u[0] = DVec2::splat(gamma);
    u[m - 1] = DVec2::splat(alpha);
    let q = solve_tridiagonal(&a, &bb, &c, &u);

    let factor = (y[0] + y[m - 1] * (beta / gamma)) / (DVec2::ONE + q[0] + q[m - 1] * (beta / gamma));
    let mut moments: Vec<DVec2> = y.iter().zip(&q).map(|(&yi, &qi)| yi - factor * qi).collect();
    moments.push(moments[0]);
    moments
}

/// Thomas algorithm; `a[0]` and `c[last]` are ignored.
fn solve_tridiagonal(a: &[f64], b: &[f64], c: &[f64], d: &[DVec2]) -> Vec<DVec2> {
    let n = b.len();
    let mut cp = vec![0.0; n];
    let mut dp = vec![DVec2::ZERO; n];
    cp[0] = c[0] / b[0];
    dp[0] = d[0] / b[0];
    for i in 1..n {
        let denom = b[i] - a[i] * cp[i - 1];
        cp[i] = if i + 1 < n { c[i] / denom } else { 0.0 };
        dp[i] = (d[i] - a[i] * dp[i - 1]) / denom;
    }
    let mut x = vec![DVec2::ZERO; n];
    x[n - 1] = dp[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = dp[i] - cp[i] * x[i + 1];
    }
    x
}

fn evaluate(t: &[f64], z: &[DVec2], moments: &[DVec2], n: usize) -> Vec<DVec2> {
    let last = t.len() - 1;
    linspace(t[0], t[last], n)
        .into_iter()
        .map(|u| {
            let hi = t.partition_point(|&v| v < u).clamp(1, last);
            let lo = hi - 1;
            let h = t[hi] - t[lo];
            let a = t[hi] - u;
            let b = u - t[lo];
            moments[lo] * (a * a * a / (6.0 * h))
                + moments[hi] * (b * b * b / (6.0 * h))
                + (z[lo] / h - moments[lo] * (h / 6.0)) * a
                + (z[hi] / h - moments[hi] * (h / 6.0)) * b
        })
        .collect()
}
