//! Seeded k-means over RGB pixels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const CLUSTER_COUNT: usize = 5;
pub const CLUSTER_SEED: u64 = 42;

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-4;

pub type Color = [f64; 3];

fn distance_sq(a: &Color, b: &Color) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest(centers: &[Color], point: &Color) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance_sq(c, point)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// k-means++ seeding with a seeded RNG.
fn initial_centers(points: &[Color], k: usize, rng: &mut StdRng) -> Vec<Color> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.random_range(0..points.len())]);

    let mut closest: Vec<f64> = points.iter().map(|p| distance_sq(p, &centers[0])).collect();
    while centers.len() < k {
        let total: f64 = closest.iter().sum();
        let next = if total <= 0.0 {
            // Fewer distinct colours than clusters.
            centers[0]
        } else {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = points.len() - 1;
            for (i, d) in closest.iter().enumerate() {
                acc += d;
                if acc >= target {
                    chosen = i;
                    break;
                }
            }
            points[chosen]
        };

        centers.push(next);
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(distance_sq(p, &next));
        }
    }
    centers
}

/// Lloyd iterations from the given starting centers. Returns the final
/// centers and their inertia.
fn refine(points: &[Color], mut centers: Vec<Color>) -> (Vec<Color>, f64) {
    let k = centers.len();
    let mut labels = vec![usize::MAX; points.len()];

    for iteration in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (label, point) in labels.iter_mut().zip(points) {
            let (best, _) = nearest(&centers, point);
            if *label != best {
                *label = best;
                changed = true;
            }
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (&label, point) in labels.iter().zip(points) {
            for c in 0..3 {
                sums[label][c] += point[c];
            }
            counts[label] += 1;
        }

        let mut shift = 0.0f64;
        for i in 0..k {
            // Empty clusters keep their previous center.
            if counts[i] == 0 {
                continue;
            }
            let n = counts[i] as f64;
            let updated = [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n];
            shift = shift.max(distance_sq(&updated, &centers[i]));
            centers[i] = updated;
        }

        if !changed || shift < TOLERANCE {
            tracing::trace!(iterations = iteration + 1, "k-means converged");
            break;
        }
    }

    let inertia = points.iter().map(|p| nearest(&centers, p).1).sum();
    (centers, inertia)
}

/// Cluster every pixel into `k` groups and return the cluster centers.
///
/// One k-means++ seeding followed by Lloyd iterations. Identical input and
/// seed always produce identical centers.
pub fn cluster_centers(pixels: &[[u8; 3]], k: usize, seed: u64) -> Vec<Color> {
    if pixels.is_empty() || k == 0 {
        return Vec::new();
    }

    let points: Vec<Color> = pixels
        .iter()
        .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let seeded = initial_centers(&points, k, &mut rng);
    let (centers, inertia) = refine(&points, seeded);
    tracing::trace!(points = points.len(), inertia, "k-means fitted");
    centers
}
