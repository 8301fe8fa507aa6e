//! Cubemap face splitting.
//!
//! Projects an equirectangular panorama onto the six cube faces and cuts
//! each face into JPEG tiles named by the viewer contract:
//!
//! ```text
//! {build}_{face}_{level}_{x}_{y}.jpg      face ∈ {l, r, u, d, f, b}
//! ```
//!
//! Only level 0 is produced; LOD pyramids are out of scope.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};

use crate::error::SplitError;

/// Default JPEG quality for published tiles.
pub const DEFAULT_TILE_JPEG_QUALITY: u8 = 85;

/// Cube face letters in emission order.
pub const CUBE_FACES: [char; 6] = ['l', 'r', 'u', 'd', 'f', 'b'];

/// Collaborator contract: turn a composed image into tile files.
///
/// Implementations write their tiles under `output_dir` and return the
/// paths they produced; the caller owns uploading and cleanup.
pub trait TileSplitter: Send + Sync {
    fn split(
        &self,
        image: &RgbImage,
        output_dir: &Path,
        tile_size: u32,
        level: u32,
        build: &str,
    ) -> Result<Vec<PathBuf>, SplitError>;
}

/// Equirectangular → cubemap splitter.
#[derive(Debug, Clone)]
pub struct CubemapSplitter {
    jpeg_quality: u8,
}

impl CubemapSplitter {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    fn write_tile(&self, tile: &RgbImage, path: &Path) -> Result<(), SplitError> {
        let mut data = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut data, self.jpeg_quality);
        encoder
            .encode_image(tile)
            .map_err(|e| SplitError::Encode {
                message: e.to_string(),
            })?;
        std::fs::write(path, &data).map_err(|e| SplitError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for CubemapSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_JPEG_QUALITY)
    }
}

impl TileSplitter for CubemapSplitter {
    fn split(
        &self,
        image: &RgbImage,
        output_dir: &Path,
        tile_size: u32,
        level: u32,
        build: &str,
    ) -> Result<Vec<PathBuf>, SplitError> {
        let face_size = (image.width() / 4).max(1);
        let mut paths = Vec::new();

        for face in CUBE_FACES {
            let rendered = project_face(image, face, face_size);
            let tiles_per_side = face_size.div_ceil(tile_size);

            for ty in 0..tiles_per_side {
                for tx in 0..tiles_per_side {
                    let x0 = tx * tile_size;
                    let y0 = ty * tile_size;
                    let width = tile_size.min(face_size - x0);
                    let height = tile_size.min(face_size - y0);

                    let tile = imageops::crop_imm(&rendered, x0, y0, width, height).to_image();
                    let path =
                        output_dir.join(format!("{build}_{face}_{level}_{tx}_{ty}.jpg"));
                    self.write_tile(&tile, &path)?;
                    paths.push(path);
                }
            }
        }

        Ok(paths)
    }
}

/// Render one cube face by inverse projection.
///
/// Each output pixel maps to a direction on the unit cube, converted to
/// spherical coordinates and sampled bilinearly from the panorama
/// (wrapping in longitude, clamping in latitude).
fn project_face(pano: &RgbImage, face: char, face_size: u32) -> RgbImage {
    let mut out = RgbImage::new(face_size, face_size);

    for py in 0..face_size {
        for px in 0..face_size {
            // Face-plane coordinates in [-1, 1], pixel centers
            let a = 2.0 * (px as f64 + 0.5) / face_size as f64 - 1.0;
            let b = 2.0 * (py as f64 + 0.5) / face_size as f64 - 1.0;

            let (x, y, z) = match face {
                'f' => (a, -b, 1.0),
                'b' => (-a, -b, -1.0),
                'l' => (-1.0, -b, a),
                'r' => (1.0, -b, -a),
                'u' => (a, 1.0, b),
                'd' => (a, -1.0, -b),
                _ => unreachable!("unknown cube face"),
            };

            let theta = x.atan2(z); // longitude, 0 at +Z
            let phi = (y / (x * x + y * y + z * z).sqrt()).asin(); // latitude

            let sx = (theta / std::f64::consts::TAU + 0.5) * pano.width() as f64;
            let sy = (0.5 - phi / std::f64::consts::PI) * pano.height() as f64;

            out.put_pixel(px, py, sample_bilinear(pano, sx - 0.5, sy - 0.5));
        }
    }

    out
}

/// Bilinear sample with longitude wrap and latitude clamp.
fn sample_bilinear(pano: &RgbImage, x: f64, y: f64) -> image::Rgb<u8> {
    let (width, height) = (pano.width() as i64, pano.height() as i64);

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let fetch = |ix: i64, iy: i64| -> [f64; 3] {
        let wrapped_x = ix.rem_euclid(width) as u32;
        let clamped_y = iy.clamp(0, height - 1) as u32;
        let pixel = pano.get_pixel(wrapped_x, clamped_y).0;
        [pixel[0] as f64, pixel[1] as f64, pixel[2] as f64]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut blended = [0u8; 3];
    for channel in 0..3 {
        let top = p00[channel] * (1.0 - fx) + p10[channel] * fx;
        let bottom = p01[channel] * (1.0 - fx) + p11[channel] * fx;
        blended[channel] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    image::Rgb(blended)
}
