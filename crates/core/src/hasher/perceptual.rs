use std::path::Path;

use fast_image_resize::{self as fir, images::Image as FirImage};

use crate::error::{Error, Result};

/// Side of the square the image is reduced to before the DCT.
const DCT_SIZE: usize = 32;
/// Side of the low-frequency block that becomes the hash.
const HASH_SIZE: usize = 8;

/// Compute the DCT perceptual hash (pHash) of an image file.
///
/// Pipeline: decode → grayscale (ITU-R 601-2 luma) → resize to 32x32 →
/// 2-D DCT-II → keep the top-left 8x8 coefficients → one bit per
/// coefficient, set when it is above the block's median.
///
/// The 64 bits are read row-major, first bit most significant, and returned
/// as 16 lowercase hex digits. Fails if the file cannot be read or decoded.
pub fn compute_phash(path: &Path) -> Result<String> {
    let pixels = load_32x32_grayscale(path)?;
    let bits = phash_bits(&pixels);
    Ok(format!("{:016x}", bits))
}

/// Decode with the `image` crate, convert to grayscale at full size, then
/// resize to 32x32.
fn load_32x32_grayscale(path: &Path) -> Result<Vec<f64>> {
    let img = image::open(path)?;
    let gray = img.to_luma8();
    let (w, h) = (gray.width(), gray.height());

    let src = FirImage::from_vec_u8(w, h, gray.into_raw(), fir::PixelType::U8)
        .map_err(|e| Error::Resize(e.to_string()))?;
    let mut dst = FirImage::new(DCT_SIZE as u32, DCT_SIZE as u32, fir::PixelType::U8);
    fir::Resizer::new()
        .resize(&src, &mut dst, None)
        .map_err(|e| Error::Resize(e.to_string()))?;

    Ok(dst.buffer().iter().map(|&p| p as f64).collect())
}

/// Hash bits from a 32x32 row-major grayscale buffer.
fn phash_bits(pixels: &[f64]) -> u64 {
    let coeffs = dct_2d(pixels, DCT_SIZE);

    let mut low = [0f64; HASH_SIZE * HASH_SIZE];
    for row in 0..HASH_SIZE {
        for col in 0..HASH_SIZE {
            low[row * HASH_SIZE + col] = coeffs[row * DCT_SIZE + col];
        }
    }
    let med = median(&low);

    let mut hash: u64 = 0;
    for &c in &low {
        hash = (hash << 1) | u64::from(c > med);
    }
    hash
}

/// Unnormalized DCT-II along columns, then along rows, of an `n`x`n` matrix.
/// The missing scale factors are uniform, so median comparisons are unaffected.
fn dct_2d(input: &[f64], n: usize) -> Vec<f64> {
    let cos_table: Vec<f64> = (0..n * n)
        .map(|i| {
            let (k, x) = (i / n, i % n);
            (std::f64::consts::PI * k as f64 * (2 * x + 1) as f64 / (2 * n) as f64).cos()
        })
        .collect();

    // Columns
    let mut tmp = vec![0f64; n * n];
    for col in 0..n {
        for k in 0..n {
            tmp[k * n + col] = (0..n)
                .map(|row| input[row * n + col] * cos_table[k * n + row])
                .sum();
        }
    }

    // Rows
    let mut out = vec![0f64; n * n];
    for row in 0..n {
        for k in 0..n {
            out[row * n + k] = (0..n)
                .map(|col| tmp[row * n + col] * cos_table[k * n + col])
                .sum();
        }
    }
    out
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
