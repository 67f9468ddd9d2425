//! Color quantization: bilateral smoothing followed by k-means clustering.
//!
//! The bilateral pass suppresses noise (including the grain added earlier in
//! the pipeline) while keeping edges, so that clusters form around the
//! flat color regions of the illustration instead of around noise.
//!
//! Clustering is deterministic: the seed is fixed, and all reductions that
//! feed back into the centers run sequentially. Only the per-point nearest
//! center search is parallel.

use std::collections::VecDeque;
use std::hash::{DefaultHasher, Hasher};

use log::{debug, trace};
use ndarray::{Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::core::{ensure_rgb, reflect_101};
use crate::error::{CorrectionError, Result};

/// Neighborhood diameter of the pre-clustering bilateral filter.
pub const BILATERAL_DIAMETER: usize = 3;
/// Color sigma of the pre-clustering bilateral filter.
pub const BILATERAL_SIGMA_COLOR: f64 = 15.0;
/// Spatial sigma of the pre-clustering bilateral filter.
pub const BILATERAL_SIGMA_SPACE: f64 = 15.0;

// ============================================================================
// Bilateral Filter
// ============================================================================

/// Edge-preserving bilateral filter - u8 version.
///
/// Neighbors are weighted by `exp(-r² / 2σs²)` for their distance `r` from
/// the center (only neighbors with `r <= diameter / 2` contribute) and by
/// `exp(-d² / 2σc²)` where `d` is the sum of absolute channel differences to
/// the center pixel. Borders are mirrored.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `diameter` - Neighborhood diameter in pixels
/// * `sigma_color` - Color similarity sigma
/// * `sigma_space` - Spatial sigma
///
/// # Returns
/// Filtered image with same dimensions
pub fn bilateral_filter_u8(
    input: ArrayView3<u8>,
    diameter: usize,
    sigma_color: f64,
    sigma_space: f64,
) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;
    let radius = (diameter / 2).max(1) as isize;

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    // Color weights indexed by L1 distance (0..=765)
    let color_weight: Vec<f64> = (0..256 * 3)
        .map(|i| ((i * i) as f64 * color_coeff).exp())
        .collect();

    let mut offsets: Vec<(isize, isize, f64)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r = ((dy * dy + dx * dx) as f64).sqrt();
            if r > radius as f64 {
                continue;
            }
            offsets.push((dy, dx, (r * r * space_coeff).exp()));
        }
    }

    let rows: Vec<Vec<u8>> = (0..height)
        .into_par_iter()
        .map(|y| {
            let mut row = Vec::with_capacity(width * 3);
            for x in 0..width {
                let center = [input[[y, x, 0]], input[[y, x, 1]], input[[y, x, 2]]];
                let mut sum = [0.0f64; 3];
                let mut weight_sum = 0.0f64;

                for &(dy, dx, space_w) in &offsets {
                    let sy = reflect_101(y as isize + dy, height);
                    let sx = reflect_101(x as isize + dx, width);
                    let neighbor = [input[[sy, sx, 0]], input[[sy, sx, 1]], input[[sy, sx, 2]]];

                    let dist: usize = (0..3)
                        .map(|c| (neighbor[c] as i32 - center[c] as i32).unsigned_abs() as usize)
                        .sum();
                    let w = space_w * color_weight[dist];

                    for c in 0..3 {
                        sum[c] += neighbor[c] as f64 * w;
                    }
                    weight_sum += w;
                }

                for c in 0..3 {
                    row.push((sum[c] / weight_sum).round().clamp(0.0, 255.0) as u8);
                }
            }
            row
        })
        .collect();

    Ok(Array3::from_shape_vec((height, width, 3), rows.concat())?)
}

// ============================================================================
// K-Means
// ============================================================================

/// A point in RGB space.
pub type Color = [f64; 3];

#[inline]
fn dist_sq(a: &Color, b: &Color) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

/// Index of the nearest center and the squared distance to it.
/// Ties go to the lowest index.
#[inline]
fn nearest(point: &Color, centers: &[Color]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = dist_sq(point, center);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    (best, best_dist)
}

/// K-means settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansConfig {
    pub k: usize,
    /// Lloyd iterations per run.
    pub max_iter: usize,
    /// Independent seeded runs; the lowest-inertia run wins.
    pub n_init: usize,
    /// Convergence threshold, relative to the mean per-channel variance.
    pub tol: f64,
    pub seed: u64,
}

impl KMeansConfig {
    /// Settings used by the color quantizer.
    pub fn new(k: usize) -> Self {
        KMeansConfig {
            k,
            max_iter: 200,
            n_init: 5,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// Fitted clustering.
#[derive(Debug, Clone)]
pub struct KMeansResult {
    pub centers: Vec<Color>,
    /// Cluster index of each input point.
    pub labels: Vec<usize>,
    /// Sum of squared distances of points to their center.
    pub inertia: f64,
    /// Lloyd iterations used by the winning run.
    pub iterations: usize,
}

/// Mean of the per-channel variances, scaled by `tol`.
fn absolute_tolerance(points: &[Color], tol: f64) -> f64 {
    let n = points.len() as f64;
    let mut mean = [0.0f64; 3];
    for p in points {
        for c in 0..3 {
            mean[c] += p[c];
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }
    let mut var = [0.0f64; 3];
    for p in points {
        for c in 0..3 {
            let d = p[c] - mean[c];
            var[c] += d * d;
        }
    }
    (var.iter().sum::<f64>() / n / 3.0) * tol
}

/// Greedy k-means++ seeding.
///
/// Each new center is the best of `2 + ln(k)` candidates sampled with
/// probability proportional to their squared distance to the nearest
/// existing center; "best" meaning the one that lowers the total potential
/// the most.
fn kmeans_plusplus<R: Rng>(points: &[Color], k: usize, rng: &mut R) -> Vec<Color> {
    let n = points.len();
    let n_local_trials = 2 + (k as f64).ln().floor() as usize;

    let mut centers = Vec::with_capacity(k);
    let first = points[rng.random_range(0..n)];
    centers.push(first);

    let mut closest: Vec<f64> = points.par_iter().map(|p| dist_sq(p, &first)).collect();
    let mut potential: f64 = closest.iter().sum();

    for _ in 1..k {
        let mut cumulative = Vec::with_capacity(n);
        let mut acc = 0.0f64;
        for &d in &closest {
            acc += d;
            cumulative.push(acc);
        }

        let candidates: Vec<usize> = (0..n_local_trials)
            .map(|_| {
                let target = rng.random::<f64>() * potential;
                cumulative.partition_point(|&c| c < target).min(n - 1)
            })
            .collect();

        let mut best: Option<(usize, f64, Vec<f64>)> = None;
        for &candidate in &candidates {
            let cand = points[candidate];
            let dists: Vec<f64> = points
                .par_iter()
                .zip(closest.par_iter())
                .map(|(p, &d)| dist_sq(p, &cand).min(d))
                .collect();
            let pot: f64 = dists.iter().sum();
            if best.as_ref().map_or(true, |(_, best_pot, _)| pot < *best_pot) {
                best = Some((candidate, pot, dists));
            }
        }

        if let Some((index, pot, dists)) = best {
            centers.push(points[index]);
            potential = pot;
            closest = dists;
        }
    }

    centers
}

fn assign(points: &[Color], centers: &[Color]) -> Vec<usize> {
    points.par_iter().map(|p| nearest(p, centers).0).collect()
}

/// New centers as the mean of their members. Empty clusters are moved onto
/// the points farthest from their current center.
fn update_centers(points: &[Color], labels: &[usize], old: &[Color]) -> Vec<Color> {
    let k = old.len();
    let mut sums = vec![[0.0f64; 3]; k];
    let mut counts = vec![0usize; k];
    for (p, &l) in points.iter().zip(labels) {
        for c in 0..3 {
            sums[l][c] += p[c];
        }
        counts[l] += 1;
    }

    let empty: Vec<usize> = (0..k).filter(|&i| counts[i] == 0).collect();
    let mut centers: Vec<Color> = sums
        .iter()
        .zip(&counts)
        .zip(old)
        .map(|((s, &n), o)| {
            if n == 0 {
                *o
            } else {
                let n = n as f64;
                [s[0] / n, s[1] / n, s[2] / n]
            }
        })
        .collect();

    if !empty.is_empty() {
        debug!("k-means: relocating {} empty cluster(s)", empty.len());
        let mut far: Vec<(usize, f64)> = points
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (p, &l))| (i, dist_sq(p, &old[l])))
            .collect();
        // Farthest first, lowest index on ties
        far.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        for (cluster, (point, _)) in empty.iter().zip(far.iter()) {
            centers[*cluster] = points[*point];
        }
    }

    centers
}

fn lloyd(
    points: &[Color],
    mut centers: Vec<Color>,
    max_iter: usize,
    tol: f64,
) -> KMeansResult {
    let mut labels: Vec<usize> = Vec::new();
    let mut iterations = 0;

    for iter in 0..max_iter {
        iterations = iter + 1;
        let new_labels = assign(points, &centers);
        if new_labels == labels {
            trace!("k-means: labels stable after {} iterations", iterations);
            break;
        }
        labels = new_labels;

        let new_centers = update_centers(points, &labels, &centers);
        let shift: f64 = centers
            .iter()
            .zip(&new_centers)
            .map(|(a, b)| dist_sq(a, b))
            .sum();
        centers = new_centers;

        if shift <= tol {
            trace!("k-means: center shift {:.3e} within tolerance after {} iterations", shift, iterations);
            break;
        }
    }

    // Final assignment against the final centers
    let mut inertia = 0.0f64;
    let mut final_labels = Vec::with_capacity(points.len());
    for p in points {
        let (l, d) = nearest(p, &centers);
        final_labels.push(l);
        inertia += d;
    }

    KMeansResult {
        centers,
        labels: final_labels,
        inertia,
        iterations,
    }
}

/// Cluster `points` into `config.k` groups.
///
/// Runs `n_init` seeded k-means++ / Lloyd fits and keeps the one with the
/// lowest inertia.
pub fn kmeans(points: &[Color], config: &KMeansConfig) -> Result<KMeansResult> {
    if config.k == 0 || points.len() < config.k {
        return Err(CorrectionError::TooFewPixels {
            pixels: points.len(),
            clusters: config.k,
        });
    }

    let tol = absolute_tolerance(points, config.tol);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansResult> = None;

    for run in 0..config.n_init.max(1) {
        let init = kmeans_plusplus(points, config.k, &mut rng);
        let result = lloyd(points, init, config.max_iter, tol);
        trace!(
            "k-means run {}: inertia {:.3} after {} iterations",
            run,
            result.inertia,
            result.iterations
        );
        if best.as_ref().map_or(true, |b| result.inertia < b.inertia) {
            best = Some(result);
        }
    }

    best.ok_or(CorrectionError::TooFewPixels {
        pixels: points.len(),
        clusters: config.k,
    })
}

// ============================================================================
// Color Quantization
// ============================================================================

/// Reduce the image to at most `k` colors.
///
/// Bilateral smoothing (d=3, σc=15, σs=15), then k-means over the pixel
/// colors; every pixel is replaced by its rounded cluster centroid.
///
/// # Arguments
/// * `input` - RGB image (height, width, 3)
/// * `k` - Number of clusters
///
/// # Returns
/// Quantized image with same dimensions
pub fn quantize_colors_u8(input: ArrayView3<u8>, k: usize) -> Result<Array3<u8>> {
    let (height, width) = ensure_rgb(&input)?;

    let filtered = bilateral_filter_u8(
        input,
        BILATERAL_DIAMETER,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPACE,
    )?;

    let points: Vec<Color> = filtered
        .into_raw_vec_and_offset()
        .0
        .chunks_exact(3)
        .map(|px| [px[0] as f64, px[1] as f64, px[2] as f64])
        .collect();

    let fit = kmeans(&points, &KMeansConfig::new(k))?;
    debug!(
        "quantized {}x{} image to {} clusters (inertia {:.1}, {} iterations)",
        height, width, k, fit.inertia, fit.iterations
    );

    let palette: Vec<[u8; 3]> = fit
        .centers
        .iter()
        .map(|c| {
            [
                c[0].round().clamp(0.0, 255.0) as u8,
                c[1].round().clamp(0.0, 255.0) as u8,
                c[2].round().clamp(0.0, 255.0) as u8,
            ]
        })
        .collect();

    let data: Vec<u8> = fit.labels.iter().flat_map(|&l| palette[l]).collect();
    Ok(Array3::from_shape_vec((height, width, 3), data)?)
}

// ============================================================================
// Quantization Cache
// ============================================================================

/// Identity of one quantization request.
///
/// Fields compare in declaration order, so the pixel bytes are only scanned
/// when the digest, dimensions and `k` already match.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    digest: u64,
    height: usize,
    width: usize,
    k: usize,
    pixels: Vec<u8>,
}

impl CacheKey {
    fn new(input: &ArrayView3<u8>, k: usize) -> Self {
        let (height, width, _) = input.dim();
        let pixels: Vec<u8> = input.iter().copied().collect();
        let mut hasher = DefaultHasher::new();
        hasher.write(&pixels);
        CacheKey {
            digest: hasher.finish(),
            height,
            width,
            k,
            pixels,
        }
    }
}

/// Memoizes [`quantize_colors_u8`] by (pixel content, k).
///
/// Keys are derived from the stage's inputs, so a changed upstream image or
/// a different `k` always misses. The oldest entry is evicted once the
/// capacity is reached.
#[derive(Debug, Clone)]
pub struct QuantizationCache {
    capacity: usize,
    entries: VecDeque<(CacheKey, Array3<u8>)>,
}

impl Default for QuantizationCache {
    fn default() -> Self {
        Self::with_capacity(8)
    }
}

impl QuantizationCache {
    pub fn with_capacity(capacity: usize) -> Self {
        QuantizationCache {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Return the cached quantization of `input` with `k` clusters, computing
    /// and storing it on a miss.
    pub fn get_or_quantize(&mut self, input: ArrayView3<u8>, k: usize) -> Result<Array3<u8>> {
        let key = CacheKey::new(&input, k);
        if let Some((_, cached)) = self.entries.iter().find(|(entry, _)| entry == &key) {
            debug!("quantization cache hit (k={})", k);
            return Ok(cached.clone());
        }

        let result = quantize_colors_u8(input, k)?;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((key, result.clone()));
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn gradient(height: usize, width: usize) -> Array3<u8> {
        let mut img = Array3::<u8>::zeros((height, width, 3));
        for y in 0..height {
            for x in 0..width {
                img[[y, x, 0]] = (x * 255 / width.max(1)) as u8;
                img[[y, x, 1]] = (y * 255 / height.max(1)) as u8;
                img[[y, x, 2]] = ((x + y) * 127 / (width + height)) as u8;
            }
        }
        img
    }

    fn distinct_colors(img: &Array3<u8>) -> usize {
        let (h, w, _) = img.dim();
        let mut set = HashSet::new();
        for y in 0..h {
            for x in 0..w {
                set.insert([img[[y, x, 0]], img[[y, x, 1]], img[[y, x, 2]]]);
            }
        }
        set.len()
    }

    #[test]
    fn test_bilateral_uniform_unchanged() {
        let img = Array3::<u8>::from_elem((10, 10, 3), 123);
        let result = bilateral_filter_u8(img.view(), 3, 15.0, 15.0).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_bilateral_preserves_hard_edge() {
        let mut img = Array3::<u8>::zeros((8, 8, 3));
        for y in 0..8 {
            for x in 4..8 {
                for c in 0..3 {
                    img[[y, x, c]] = 255;
                }
            }
        }
        let result = bilateral_filter_u8(img.view(), 3, 15.0, 15.0).unwrap();
        // A 765 L1 step has negligible color weight
        assert_eq!(result[[4, 3, 0]], 0);
        assert_eq!(result[[4, 4, 0]], 255);
    }

    #[test]
    fn test_bilateral_smooths_small_noise() {
        let mut img = Array3::<u8>::from_elem((5, 5, 3), 100);
        img[[2, 2, 0]] = 106;
        let result = bilateral_filter_u8(img.view(), 3, 15.0, 15.0).unwrap();
        assert!(result[[2, 2, 0]] < 106);
        assert!(result[[2, 2, 0]] >= 100);
    }

    #[test]
    fn test_kmeans_separates_obvious_clusters() {
        let mut points = Vec::new();
        for i in 0..20 {
            let j = i as f64 * 0.1;
            points.push([10.0 + j, 10.0, 10.0]);
            points.push([200.0, 200.0 - j, 200.0]);
        }
        let fit = kmeans(&points, &KMeansConfig::new(2)).unwrap();
        assert_eq!(fit.labels.len(), 40);
        assert_ne!(fit.labels[0], fit.labels[1]);
        for pair in fit.labels.chunks(2) {
            assert_eq!(pair[0], fit.labels[0]);
            assert_eq!(pair[1], fit.labels[1]);
        }
        assert!(fit.inertia < 40.0);
    }

    #[test]
    fn test_kmeans_too_few_points() {
        let points = vec![[0.0, 0.0, 0.0]; 3];
        assert!(matches!(
            kmeans(&points, &KMeansConfig::new(8)),
            Err(CorrectionError::TooFewPixels { pixels: 3, clusters: 8 })
        ));
    }

    #[test]
    fn test_kmeans_fewer_distinct_colors_than_k() {
        let mut points = vec![[0.0, 0.0, 0.0]; 30];
        points.extend(vec![[255.0, 255.0, 255.0]; 30]);
        let fit = kmeans(&points, &KMeansConfig::new(8)).unwrap();
        assert_eq!(fit.centers.len(), 8);
        assert_eq!(fit.inertia, 0.0);
    }

    #[test]
    fn test_quantize_limits_palette() {
        let img = gradient(32, 32);
        for k in [8, 12] {
            let result = quantize_colors_u8(img.view(), k).unwrap();
            assert_eq!(result.dim(), img.dim());
            assert!(distinct_colors(&result) <= k);
        }
    }

    #[test]
    fn test_quantize_is_deterministic() {
        let img = gradient(24, 40);
        let a = quantize_colors_u8(img.view(), 8).unwrap();
        let b = quantize_colors_u8(img.view(), 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_quantize_accepts_non_contiguous_view() {
        let img = gradient(18, 26);
        let transposed = img.view().permuted_axes([1, 0, 2]);
        assert!(transposed.as_slice().is_none());

        let from_view = quantize_colors_u8(transposed, 8).unwrap();
        let from_owned = quantize_colors_u8(transposed.to_owned().view(), 8).unwrap();
        assert_eq!(from_view.dim(), (26, 18, 3));
        assert_eq!(from_view, from_owned);
        assert!(distinct_colors(&from_view) <= 8);
    }

    #[test]
    fn test_cache_hits_and_invalidates() {
        let img = gradient(16, 16);
        let mut cache = QuantizationCache::with_capacity(2);

        let first = cache.get_or_quantize(img.view(), 8).unwrap();
        assert_eq!(cache.len(), 1);
        let second = cache.get_or_quantize(img.view(), 8).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(first, second);

        // Different k is a different entry
        cache.get_or_quantize(img.view(), 9).unwrap();
        assert_eq!(cache.len(), 2);

        // Changed pixels miss; capacity evicts the oldest
        let mut changed = img.clone();
        changed[[0, 0, 0]] ^= 0xff;
        cache.get_or_quantize(changed.view(), 8).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_compares_pixels_behind_equal_digests() {
        let img = gradient(16, 16);
        let mut changed = img.clone();
        changed[[3, 3, 1]] ^= 0x0f;

        // An entry whose digest collides with `img` but holds other pixels
        let real = CacheKey::new(&img.view(), 8);
        let forged = CacheKey {
            pixels: changed.iter().copied().collect(),
            ..real.clone()
        };
        assert_ne!(forged, real);

        let stale = Array3::<u8>::zeros(img.raw_dim());
        let mut cache = QuantizationCache::with_capacity(4);
        cache.entries.push_back((forged, stale.clone()));

        let result = cache.get_or_quantize(img.view(), 8).unwrap();
        assert_ne!(result, stale);
        assert_eq!(result, quantize_colors_u8(img.view(), 8).unwrap());
        assert_eq!(cache.len(), 2);
    }
}
