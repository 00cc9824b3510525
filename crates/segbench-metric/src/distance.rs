//! Exact Euclidean distance transform on 3-D grids.
//!
//! Felzenszwalb & Huttenlocher's lower envelope of parabolas, applied
//! separably along each axis. Distances are squared until the caller takes
//! the root.

/// Squared distance transform of one line of sample values.
///
/// `f[q]` is the cost at site `q` (0 on features, infinity elsewhere).
/// Writes `min_p (q - p)^2 + f[p]` into `out[q]`.
fn squared_edt_1d(f: &[f64], out: &mut [f64], sites: &mut Vec<usize>, bounds: &mut Vec<f64>) {
    sites.clear();
    bounds.clear();

    for (q, &fq) in f.iter().enumerate() {
        if !fq.is_finite() {
            continue;
        }
        let offset_q = fq + (q * q) as f64;
        while let Some(&p) = sites.last() {
            let offset_p = f[p] + (p * p) as f64;
            let s = (offset_q - offset_p) / (2.0 * (q - p) as f64);
            if bounds.last().is_some_and(|&z| s <= z) {
                sites.pop();
                bounds.pop();
                continue;
            }
            sites.push(q);
            bounds.push(s);
            break;
        }
        if sites.is_empty() {
            sites.push(q);
            bounds.push(f64::NEG_INFINITY);
        }
    }

    if sites.is_empty() {
        out.fill(f64::INFINITY);
        return;
    }

    let mut k = 0;
    for (q, value) in out.iter_mut().enumerate() {
        while k + 1 < sites.len() && bounds[k + 1] < q as f64 {
            k += 1;
        }
        let p = sites[k];
        let delta = q.abs_diff(p) as f64;
        *value = delta * delta + f[p];
    }
}

/// Squared Euclidean distance from every voxel to the nearest feature voxel.
///
/// `features` is laid out row-major over `dims = [depth, height, width]`.
/// Voxels are infinitely far away when there is no feature at all.
pub fn squared_distance_to(features: &[bool], dims: [usize; 3]) -> Vec<f64> {
    let [depth, height, width] = dims;
    let mut grid: Vec<f64> = features
        .iter()
        .map(|&feature| if feature { 0.0 } else { f64::INFINITY })
        .collect();

    let longest = depth.max(height).max(width);
    let mut line = vec![0.0; longest];
    let mut out = vec![0.0; longest];
    let mut sites = Vec::with_capacity(longest);
    let mut bounds = Vec::with_capacity(longest);

    let strides = [height * width, width, 1];
    for axis in (0..3).rev() {
        let len = dims[axis];
        let stride = strides[axis];
        for start in line_starts(dims, axis) {
            for i in 0..len {
                line[i] = grid[start + i * stride];
            }
            squared_edt_1d(&line[..len], &mut out[..len], &mut sites, &mut bounds);
            for i in 0..len {
                grid[start + i * stride] = out[i];
            }
        }
    }
    grid
}

/// Flat index of the first voxel of every line parallel to `axis`.
fn line_starts(dims: [usize; 3], axis: usize) -> Vec<usize> {
    let [depth, height, width] = dims;
    let mut starts = Vec::new();
    for d in 0..depth {
        for h in 0..height {
            for w in 0..width {
                let coords = [d, h, w];
                if coords[axis] == 0 {
                    starts.push((d * height + h) * width + w);
                }
            }
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    fn brute_force(features: &[bool], dims: [usize; 3]) -> Vec<f64> {
        let [depth, height, width] = dims;
        let coords = |i: usize| {
            let w = i % width;
            let h = (i / width) % height;
            let d = i / (width * height);
            [d as f64, h as f64, w as f64]
        };
        (0..depth * height * width)
            .map(|i| {
                let a = coords(i);
                features
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| **f)
                    .map(|(j, _)| {
                        let b = coords(j);
                        (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
                    })
                    .fold(f64::INFINITY, f64::min)
            })
            .collect()
    }

    #[test]
    fn one_dimensional_line() {
        let features = [false, false, true, false, false, false, true];
        let dt = squared_distance_to(&features, [1, 1, 7]);

        assert_eq!(dt, vec![4.0, 1.0, 0.0, 1.0, 4.0, 1.0, 0.0]);
    }

    #[rstest]
    #[case([1, 5, 6], &[7, 20])]
    #[case([3, 4, 5], &[0, 59])]
    #[case([2, 6, 6], &[14, 40, 71])]
    fn matches_brute_force(#[case] dims: [usize; 3], #[case] seeds: &[usize]) {
        let len = dims.iter().product();
        let mut features = vec![false; len];
        for &seed in seeds {
            features[seed] = true;
        }

        let fast = squared_distance_to(&features, dims);
        let slow = brute_force(&features, dims);

        for (a, b) in fast.iter().zip(&slow) {
            assert_relative_eq!(*a, *b);
        }
    }

    #[test]
    fn no_features_is_infinitely_far() {
        let dt = squared_distance_to(&[false; 4], [1, 2, 2]);

        assert!(dt.iter().all(|d| d.is_infinite()));
    }
}
