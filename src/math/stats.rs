//! Descriptive statistics over plain `f64` slices.
//!
//! Shared by the event detector (baseline mean/volatility) and the dashboard
//! analytics (12-month stats, correlation, trend line, axis clipping).

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator). `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let n = values.len() as f64;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Round to `decimals` places; exact ties go to the even neighbour.
///
/// Ties are judged on the exact product `value * 10^decimals`: the rounding
/// error of the multiplication (recovered with a fused multiply-add) decides
/// whether an apparent `.5` is really above or below the midpoint.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let scaled = value * scale;
    if !scaled.is_finite() {
        return value;
    }
    let residual = value.mul_add(scale, -scaled);
    let floor = scaled.floor();

    let rounded = if scaled - floor != 0.5 {
        scaled.round()
    } else if residual > 0.0 {
        floor + 1.0
    } else if residual < 0.0 {
        floor
    } else if floor % 2.0 == 0.0 {
        floor
    } else {
        floor + 1.0
    };
    rounded / scale
}

/// Pearson correlation of two equally long slices.
///
/// `None` when the lengths differ, fewer than two pairs exist, or either side
/// has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }

    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());
    if r.is_finite() { Some(r) } else { None }
}

/// Trailing moving average. Entries before the first full window are `None`.
pub fn moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if window == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        if i + 1 >= window {
            out.push(Some(sum / window as f64));
        } else {
            out.push(None);
        }
    }
    out
}

/// Quantile with linear interpolation between closest ranks (`q` in `[0, 1]`).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !q.is_finite() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_std_matches_hand_computation() {
        // mean = 5, squared deviations sum = 32, n-1 = 7
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = sample_std(&v).unwrap();
        assert!((sd - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn round_to_sends_exact_ties_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(2.125, 2), 2.12);
        assert_eq!(round_to(-0.125, 2), -0.12);
        assert_eq!(round_to(-1.25, 1), -1.2);
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
    }

    #[test]
    fn round_to_non_ties_round_to_nearest() {
        assert_eq!(round_to(3.14159, 3), 3.142);
        // 2.675 is stored just below the midpoint.
        assert_eq!(round_to(2.675, 2), 2.67);
        assert_eq!(round_to(-0.4375, 2), -0.44);
        assert_eq!(round_to(0.1, 2), 0.1);
    }

    #[test]
    fn pearson_detects_perfect_and_degenerate_cases() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&xs, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).unwrap() + 1.0).abs() < 1e-12);
        assert!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&xs, &up[..3]).is_none());
    }

    #[test]
    fn moving_average_fills_after_window() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(ma, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn quantile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
        assert!((quantile(&v, 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert!(quantile(&[], 0.5).is_none());
    }
}
