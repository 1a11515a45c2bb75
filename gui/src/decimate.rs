//! Min/max decimation for plotting
//!
//! A one-second frame at 100 kHz has far more points than the plot has
//! pixels. Each bucket keeps its minimum and maximum, in the order they
//! occur, so pulse edges and spikes survive.

/// Pair `xs` with `ys`, reducing to at most `max_points` points
pub fn min_max_decimate(xs: &[f64], ys: &[f64], max_points: usize) -> Vec<[f64; 2]> {
    let len = xs.len().min(ys.len());
    if len <= max_points || max_points < 2 {
        return xs.iter().zip(ys).map(|(&x, &y)| [x, y]).collect();
    }

    let buckets = max_points / 2;
    let mut points = Vec::with_capacity(buckets * 2);

    for bucket in 0..buckets {
        let start = bucket * len / buckets;
        let end = ((bucket + 1) * len / buckets).min(len);
        if start >= end {
            continue;
        }

        let mut min_idx = start;
        let mut max_idx = start;
        for i in start..end {
            if ys[i] < ys[min_idx] {
                min_idx = i;
            }
            if ys[i] > ys[max_idx] {
                max_idx = i;
            }
        }

        let (first, second) = if min_idx <= max_idx {
            (min_idx, max_idx)
        } else {
            (max_idx, min_idx)
        };
        points.push([xs[first], ys[first]]);
        if second != first {
            points.push([xs[second], ys[second]]);
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input_passes_through() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [5.0, -1.0, 3.0];
        assert_eq!(
            min_max_decimate(&xs, &ys, 10),
            vec![[0.0, 5.0], [1.0, -1.0], [2.0, 3.0]]
        );
    }

    #[test]
    fn test_keeps_spikes() {
        let xs: Vec<f64> = (0..10_000).map(|i| i as f64).collect();
        let mut ys = vec![0.0; 10_000];
        ys[1234] = 4.0;
        ys[8765] = -3.0;

        let points = min_max_decimate(&xs, &ys, 200);

        assert!(points.len() <= 200);
        assert!(points.contains(&[1234.0, 4.0]));
        assert!(points.contains(&[8765.0, -3.0]));
        // x stays monotonic
        assert!(points.windows(2).all(|w| w[0][0] < w[1][0]));
    }

    #[test]
    fn test_mismatched_lengths_use_shorter() {
        let xs = [0.0, 1.0];
        let ys = [1.0, 2.0, 3.0];
        assert_eq!(min_max_decimate(&xs, &ys, 10).len(), 2);
    }
}
