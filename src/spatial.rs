//! Real-space image operations
//!
//! Rotation, blurring, block averaging and the binary morphology used to
//! locate an edge in a micrograph.
//! Samples outside of an image are taken as zero for [rotate], [downscale_local_mean]
//! and [binary_dilation], and mirrored (`d c b a | a b c d`) for [gaussian_blur] and [sobel].
//!
//! The binary operations run on `imageproc` gray images. [gaussian_blur] and
//! [rotate] stay on `f64` arrays: `imageproc` only blurs `f32` images with
//! clamped borders and rotates into a fixed default pixel.

use image::{GrayImage, Luma};
use imageproc::{distance_transform::Norm, gradients, morphology};
use ndarray::{Array2, ArrayView2, Axis};

fn to_gray(mask: &Array2<bool>) -> GrayImage {
    let (rows, cols) = mask.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([if mask[[y as usize, x as usize]] { 1 } else { 0 }])
    })
}

/// Rotates an image by `angle` degrees counter-clockwise around its centre
///
/// The output has the shape of the input, pixel values are bilinearly interpolated.
pub fn rotate(image: ArrayView2<f64>, angle: f64) -> Array2<f64> {
    let (rows, cols) = image.dim();
    let (sin, cos) = angle.to_radians().sin_cos();
    let (c_row, c_col) = ((rows as f64 - 1.) / 2., (cols as f64 - 1.) / 2.);
    let sample = |r: isize, c: isize| -> f64 {
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            0f64
        } else {
            image[[r as usize, c as usize]]
        }
    };
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (x, y) = (c as f64 - c_col, r as f64 - c_row);
        let src_col = x * cos - y * sin + c_col;
        let src_row = x * sin + y * cos + c_row;
        let (r0, c0) = (src_row.floor(), src_col.floor());
        let (dr, dc) = (src_row - r0, src_col - c0);
        let (r0, c0) = (r0 as isize, c0 as isize);
        sample(r0, c0) * (1. - dr) * (1. - dc)
            + sample(r0, c0 + 1) * (1. - dr) * dc
            + sample(r0 + 1, c0) * dr * (1. - dc)
            + sample(r0 + 1, c0 + 1) * dr * dc
    })
}

/// Rotates an image by 90 degrees `k` times, counter-clockwise
pub fn rot90(image: ArrayView2<f64>, k: usize) -> Array2<f64> {
    (0..k % 4).fold(image.to_owned(), |rotated, _| {
        let (rows, cols) = rotated.dim();
        Array2::from_shape_fn((cols, rows), |(i, j)| rotated[[j, cols - 1 - i]])
    })
}

fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let i = i.rem_euclid(period);
    (if i < n { i } else { period - 1 - i }) as usize
}

fn correlate1d(image: &Array2<f64>, weights: &[f64], axis: Axis) -> Array2<f64> {
    let radius = (weights.len() / 2) as isize;
    let mut output = Array2::<f64>::zeros(image.dim());
    for (lane, mut out) in image.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        let n = lane.len();
        for (i, o) in out.iter_mut().enumerate() {
            *o = weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * lane[reflect(i as isize + k as isize - radius, n)])
                .sum();
        }
    }
    output
}

/// Gaussian blur of standard deviation `sigma`, the kernel is truncated at `4*sigma`
pub fn gaussian_blur(image: ArrayView2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0f64 {
        return image.to_owned();
    }
    let radius = (4f64 * sigma + 0.5) as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    let kernel: Vec<f64> = kernel.into_iter().map(|k| k / sum).collect();
    let blurred = correlate1d(&image.to_owned(), &kernel, Axis(0));
    correlate1d(&blurred, &kernel, Axis(1))
}

/// Averages non-overlapping `factor x factor` blocks
///
/// Images whose sides are not a multiple of `factor` are zero padded.
pub fn downscale_local_mean(image: ArrayView2<f64>, factor: usize) -> Array2<f64> {
    if factor <= 1 {
        return image.to_owned();
    }
    let (rows, cols) = image.dim();
    let shape = ((rows + factor - 1) / factor, (cols + factor - 1) / factor);
    let mut binned = Array2::<f64>::zeros(shape);
    for ((r, c), &v) in image.indexed_iter() {
        binned[[r / factor, c / factor]] += v;
    }
    binned /= (factor * factor) as f64;
    binned
}

/// Mean of the image as a binarization threshold, `None` for a constant image
pub fn threshold_mean(image: ArrayView2<f64>) -> Option<f64> {
    let mean = image.mean()?;
    if image.iter().any(|&v| v > mean) {
        Some(mean)
    } else {
        None
    }
}

/// Binary dilation with the cross structuring element, repeated `iterations` times
///
/// `iterations` cross dilations are a single dilation by the L1 ball of that radius.
pub fn binary_dilation(mask: &Array2<bool>, iterations: usize) -> Array2<bool> {
    if iterations == 0 {
        return mask.clone();
    }
    let radius = iterations.min(u8::MAX as usize) as u8;
    let dilated = morphology::dilate(&to_gray(mask), Norm::L1, radius);
    Array2::from_shape_fn(mask.dim(), |(r, c)| {
        dilated.get_pixel(c as u32, r as u32)[0] != 0
    })
}

/// Sobel derivative of a mask along the columns (horizontal gradient)
///
/// With a 3x3 kernel the clamped border of `imageproc` is the mirrored one.
pub fn sobel(mask: &Array2<bool>) -> Array2<f64> {
    let gradient = gradients::horizontal_sobel(&to_gray(mask));
    Array2::from_shape_fn(mask.dim(), |(r, c)| {
        f64::from(gradient.get_pixel(c as u32, r as u32)[0])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rotation_by_zero_is_identity() {
        let image = Array2::from_shape_fn((7, 9), |(r, c)| (r * 9 + c) as f64);
        let rotated = rotate(image.view(), 0.);
        image
            .iter()
            .zip(rotated.iter())
            .for_each(|(a, b)| assert_abs_diff_eq!(a, b, epsilon = 1e-12));
    }

    #[test]
    fn quarter_turn_matches_rot90() {
        let image = Array2::from_shape_fn((9, 9), |(r, c)| ((r * 3 + c * 7) % 5) as f64);
        let rotated = rotate(image.view(), 90.);
        let expected = rot90(image.view(), 1);
        rotated
            .iter()
            .zip(expected.iter())
            .for_each(|(a, b)| assert_abs_diff_eq!(a, b, epsilon = 1e-9));
    }

    #[test]
    fn rot90_layout() {
        let image = ndarray::array![[1., 2., 3.], [4., 5., 6.]];
        assert_eq!(rot90(image.view(), 1), ndarray::array![[3., 6.], [2., 5.], [1., 4.]]);
        assert_eq!(rot90(image.view(), 4), image);
    }

    #[test]
    fn gaussian_blur_preserves_flat_images_and_mass() {
        let flat = Array2::from_elem((16, 16), 2.5);
        gaussian_blur(flat.view(), 1.5)
            .iter()
            .for_each(|&v| assert_abs_diff_eq!(v, 2.5, epsilon = 1e-12));
        let mut impulse = Array2::<f64>::zeros((21, 21));
        impulse[[10, 10]] = 1.;
        let blurred = gaussian_blur(impulse.view(), 1.);
        assert_abs_diff_eq!(blurred.sum(), 1., epsilon = 1e-12);
        assert!(blurred[[10, 10]] > blurred[[10, 11]]);
        assert_abs_diff_eq!(blurred[[9, 10]], blurred[[10, 11]], epsilon = 1e-15);
    }

    #[test]
    fn block_means() {
        let image = Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f64);
        let binned = downscale_local_mean(image.view(), 2);
        assert_eq!(binned.dim(), (2, 3));
        assert_abs_diff_eq!(binned[[0, 0]], (0. + 1. + 5. + 6.) / 4.);
        assert_abs_diff_eq!(binned[[1, 2]], (14. + 19.) / 4.);
    }

    #[test]
    fn constant_image_has_no_threshold() {
        assert!(threshold_mean(Array2::from_elem((3, 3), 1.).view()).is_none());
        let image = ndarray::array![[0., 0.], [1., 3.]];
        assert_eq!(threshold_mean(image.view()), Some(1.));
    }

    #[test]
    fn dilation_grows_a_cross() {
        let mut mask = Array2::from_elem((7, 7), false);
        mask[[3, 3]] = true;
        let dilated = binary_dilation(&mask, 2);
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 13);
        assert!(dilated[[1, 3]] && dilated[[2, 2]] && !dilated[[1, 2]]);
    }

    #[test]
    fn sobel_finds_vertical_edges_only() {
        let mask = Array2::from_shape_fn((6, 8), |(_, c)| c >= 4);
        let edges = sobel(&mask);
        for r in 0..6 {
            for c in 0..8 {
                if c == 3 || c == 4 {
                    assert_eq!(edges[[r, c]].abs(), 4.);
                } else {
                    assert_eq!(edges[[r, c]], 0.);
                }
            }
        }
        let horizontal = Array2::from_shape_fn((6, 8), |(r, _)| r >= 3);
        assert!(sobel(&horizontal).iter().all(|&v| v == 0.));
    }

    #[test]
    fn dilation_at_the_border() {
        let mut mask = Array2::from_elem((4, 5), false);
        mask[[0, 0]] = true;
        let dilated = binary_dilation(&mask, 1);
        assert_eq!(dilated.iter().filter(|&&v| v).count(), 3);
        assert!(dilated[[0, 1]] && dilated[[1, 0]] && !dilated[[1, 1]]);
        assert_eq!(binary_dilation(&mask, 0), mask);
    }
}
