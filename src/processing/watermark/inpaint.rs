//! Mask-driven inpainting.
//!
//! Both algorithms treat non-zero mask pixels as unknown and rebuild them
//! from the surrounding known pixels. Pixels outside the mask are never
//! modified.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::{GrayImage, Rgb, RgbImage};

const KNOWN: u8 = 0;
const BAND: u8 = 1;
const INSIDE: u8 = 2;

const UNREACHED: f32 = 1.0e6;

/// Jacobi passes used to relax the Navier-Stokes fill.
const DIFFUSION_ITERATIONS: usize = 60;

/// Edge-stopping constant for the diffusion conductance.
const DIFFUSION_EDGE_SCALE: f32 = 12.0;

#[derive(Debug, PartialEq)]
struct Candidate {
    dist: f32,
    index: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    // Reversed so the max-heap pops the smallest distance first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Field {
    width: usize,
    height: usize,
    flags: Vec<u8>,
    dist: Vec<f32>,
    pixels: Vec<[f32; 3]>,
}

impl Field {
    fn new(img: &RgbImage, mask: &GrayImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let flags: Vec<u8> = mask
            .pixels()
            .map(|p| if p.0[0] > 0 { INSIDE } else { KNOWN })
            .collect();
        let dist = flags
            .iter()
            .map(|&f| if f == INSIDE { UNREACHED } else { 0.0 })
            .collect();
        let pixels = img
            .pixels()
            .map(|p| [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32])
            .collect();
        Self {
            width,
            height,
            flags,
            dist,
            pixels,
        }
    }

    fn coords(&self, index: usize) -> (i64, i64) {
        ((index % self.width) as i64, (index / self.width) as i64)
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            None
        } else {
            Some(y as usize * self.width + x as usize)
        }
    }

    fn neighbours4(&self, index: usize) -> [Option<usize>; 4] {
        let (x, y) = self.coords(index);
        [
            self.index(x - 1, y),
            self.index(x + 1, y),
            self.index(x, y - 1),
            self.index(x, y + 1),
        ]
    }

    fn is_known(&self, index: Option<usize>) -> bool {
        index.is_some_and(|i| self.flags[i] != INSIDE)
    }

    fn has_unknown(&self) -> bool {
        self.flags.iter().any(|&f| f == INSIDE)
    }

    fn into_image(self, source: &RgbImage) -> RgbImage {
        let mut out = source.clone();
        for (px, value) in out.pixels_mut().zip(self.pixels) {
            *px = Rgb(value.map(|c| c.round().clamp(0.0, 255.0) as u8));
        }
        out
    }

    /// Eikonal update from two orthogonal neighbours.
    fn solve(&self, a: Option<usize>, b: Option<usize>) -> f32 {
        let ta = a.filter(|&i| self.flags[i] != INSIDE).map(|i| self.dist[i]);
        let tb = b.filter(|&i| self.flags[i] != INSIDE).map(|i| self.dist[i]);
        match (ta, tb) {
            (Some(t1), Some(t2)) => {
                let d = t1 - t2;
                let r = (2.0 - d * d).max(0.0).sqrt();
                let s = (t1 + t2 - r) / 2.0;
                if s >= t1 && s >= t2 {
                    s
                } else if s + r >= t1 && s + r >= t2 {
                    s + r
                } else {
                    1.0 + t1.min(t2)
                }
            }
            (Some(t), None) | (None, Some(t)) => 1.0 + t,
            (None, None) => UNREACHED,
        }
    }

    fn arrival_time(&self, index: usize) -> f32 {
        let [left, right, up, down] = self.neighbours4(index);
        self.solve(up, left)
            .min(self.solve(up, right))
            .min(self.solve(down, left))
            .min(self.solve(down, right))
    }

    fn distance_gradient(&self, index: usize) -> (f32, f32) {
        let [left, right, up, down] = self.neighbours4(index);
        let t = self.dist[index];
        let axis = |lo: Option<usize>, hi: Option<usize>| match (self.is_known(lo), self.is_known(hi)) {
            (true, true) => (self.dist[hi.unwrap_or(index)] - self.dist[lo.unwrap_or(index)]) / 2.0,
            (false, true) => self.dist[hi.unwrap_or(index)] - t,
            (true, false) => t - self.dist[lo.unwrap_or(index)],
            (false, false) => 0.0,
        };
        (axis(left, right), axis(up, down))
    }

    /// Weighted average of known pixels within `radius`, favouring pixels
    /// along the marching direction and at a similar distance from the mask
    /// boundary.
    fn paint(&mut self, index: usize, radius: i64) {
        let (x, y) = self.coords(index);
        let (gx, gy) = self.distance_gradient(index);
        let t = self.dist[index];

        let mut acc = [0.0f32; 3];
        let mut total = 0.0f32;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let len_sq = (dx * dx + dy * dy) as f32;
                if len_sq == 0.0 || len_sq > (radius * radius) as f32 {
                    continue;
                }
                let Some(q) = self.index(x + dx, y + dy) else {
                    continue;
                };
                if self.flags[q] == INSIDE {
                    continue;
                }

                let len = len_sq.sqrt();
                let mut direction = (-(dx as f32) * gx - (dy as f32) * gy) / len;
                if direction.abs() <= 0.01 {
                    direction = 1.0e-6;
                }
                let geometric = 1.0 / (len_sq * len);
                let level = 1.0 / (1.0 + (self.dist[q] - t).abs());
                let weight = (direction * geometric * level).abs();

                for c in 0..3 {
                    acc[c] += weight * self.pixels[q][c];
                }
                total += weight;
            }
        }

        if total > 0.0 {
            self.pixels[index] = acc.map(|v| v / total);
        }
    }
}

/// Fast marching inpainting after Telea (2004).
///
/// Unknown pixels are filled in order of their distance from the mask
/// boundary, each from a weighted neighbourhood of `radius` pixels.
pub fn inpaint_telea(img: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage {
    let mut field = Field::new(img, mask);
    if !field.has_unknown() {
        return img.clone();
    }
    let radius = radius.max(1) as i64;

    let mut heap = BinaryHeap::new();
    for index in 0..field.flags.len() {
        if field.flags[index] == KNOWN
            && field
                .neighbours4(index)
                .iter()
                .flatten()
                .any(|&n| field.flags[n] == INSIDE)
        {
            field.flags[index] = BAND;
            heap.push(Candidate { dist: 0.0, index });
        }
    }

    while let Some(Candidate { index, .. }) = heap.pop() {
        if field.flags[index] == KNOWN {
            continue;
        }
        field.flags[index] = KNOWN;

        for neighbour in field.neighbours4(index).into_iter().flatten() {
            if field.flags[neighbour] != INSIDE {
                continue;
            }
            field.flags[neighbour] = BAND;
            field.dist[neighbour] = field.arrival_time(neighbour);
            field.paint(neighbour, radius);
            heap.push(Candidate {
                dist: field.dist[neighbour],
                index: neighbour,
            });
        }
    }

    field.into_image(img)
}

/// PDE-based inpainting in the spirit of Bertalmio's Navier-Stokes method.
///
/// The hole is first filled layer by layer from its boundary, then relaxed
/// with edge-preserving diffusion so isophotes arriving at the boundary are
/// carried into the hole instead of being blurred across it.
pub fn inpaint_navier_stokes(img: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage {
    let mut field = Field::new(img, mask);
    if !field.has_unknown() {
        return img.clone();
    }
    let radius = radius.max(1) as i64;
    let unknown: Vec<usize> = (0..field.flags.len())
        .filter(|&i| field.flags[i] == INSIDE)
        .collect();
    if unknown.len() == field.flags.len() {
        return img.clone();
    }

    // Onion-peel initial fill.
    let mut layer: Vec<usize> = unknown
        .iter()
        .copied()
        .filter(|&i| field.neighbours4(i).iter().any(|&n| field.is_known(n)))
        .collect();
    while !layer.is_empty() {
        let values: Vec<Option<[f32; 3]>> =
            layer.iter().map(|&i| layer_average(&field, i, radius)).collect();
        for (&index, value) in layer.iter().zip(values) {
            if let Some(value) = value {
                field.pixels[index] = value;
            }
            field.flags[index] = BAND;
        }

        let mut next = Vec::new();
        for &index in &layer {
            for neighbour in field.neighbours4(index).into_iter().flatten() {
                if field.flags[neighbour] == INSIDE {
                    field.flags[neighbour] = BAND;
                    next.push(neighbour);
                }
            }
        }
        for &index in &next {
            field.flags[index] = INSIDE;
        }
        layer = next;
    }

    // Edge-preserving relaxation restricted to the hole.
    for _ in 0..DIFFUSION_ITERATIONS {
        let updated: Vec<[f32; 3]> = unknown.iter().map(|&i| diffuse(&field, i)).collect();
        for (&index, value) in unknown.iter().zip(updated) {
            field.pixels[index] = value;
        }
    }

    field.into_image(img)
}

fn layer_average(field: &Field, index: usize, radius: i64) -> Option<[f32; 3]> {
    let (x, y) = field.coords(index);
    let mut acc = [0.0f32; 3];
    let mut total = 0.0f32;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let len_sq = (dx * dx + dy * dy) as f32;
            if len_sq == 0.0 || len_sq > (radius * radius) as f32 {
                continue;
            }
            let Some(q) = field.index(x + dx, y + dy) else {
                continue;
            };
            if field.flags[q] == INSIDE {
                continue;
            }
            let weight = 1.0 / len_sq;
            for c in 0..3 {
                acc[c] += weight * field.pixels[q][c];
            }
            total += weight;
        }
    }
    (total > 0.0).then(|| acc.map(|v| v / total))
}

fn luminance(px: &[f32; 3]) -> f32 {
    0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2]
}

fn diffuse(field: &Field, index: usize) -> [f32; 3] {
    let centre = field.pixels[index];
    let centre_luma = luminance(&centre);
    let mut acc = [0.0f32; 3];
    let mut total = 0.0f32;
    for neighbour in field.neighbours4(index).into_iter().flatten() {
        let px = field.pixels[neighbour];
        let gradient = (luminance(&px) - centre_luma) / DIFFUSION_EDGE_SCALE;
        let conductance = 1.0 / (1.0 + gradient * gradient);
        for c in 0..3 {
            acc[c] += conductance * px[c];
        }
        total += conductance;
    }
    if total > 0.0 {
        acc.map(|v| v / total)
    } else {
        centre
    }
}

/// Per-pixel weighted sum of two images, rounded and saturated.
pub fn blend(a: &RgbImage, b: &RgbImage, weight_a: f32, weight_b: f32) -> RgbImage {
    RgbImage::from_fn(a.width(), a.height(), |x, y| {
        let Rgb(pa) = *a.get_pixel(x, y);
        let Rgb(pb) = *b.get_pixel(x, y);
        let mut px = [0u8; 3];
        for c in 0..3 {
            px[c] = (pa[c] as f32 * weight_a + pb[c] as f32 * weight_b)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
        Rgb(px)
    })
}
