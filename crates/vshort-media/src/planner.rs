//! Pure 9:16 crop/trim planning.
//!
//! `plan` is a deterministic function of the probed asset and the options; it never
//! touches the filesystem.

use vshort_models::{CropRect, ProcessingOptions, ProcessingPlan, TrimWindow, VideoAsset};
use vshort_models::{TARGET_ASPECT, TARGET_HEIGHT_MAX};

use crate::error::{MediaError, MediaResult};

/// Output heights are multiples of this so that `height * 9 / 16` is an even integer.
const HEIGHT_STEP: u32 = 32;

/// Compute the processing plan for an asset.
pub fn plan(asset: &VideoAsset, options: &ProcessingOptions) -> MediaResult<ProcessingPlan> {
    if asset.is_degenerate() {
        return Err(degenerate(asset));
    }

    let ratio = asset.aspect_ratio();
    let vertical = options.is_vertical(ratio);
    let too_long = asset.duration > options.max_duration();

    if vertical && !too_long {
        return Ok(ProcessingPlan::passthrough(asset.width, asset.height));
    }

    let crop = if vertical {
        CropRect::full_frame(asset.width, asset.height)
    } else {
        center_crop(asset.width, asset.height)
    };

    let trim = too_long.then(|| TrimWindow::leading(options.max_duration()));

    let (target_width, target_height) = target_resolution(crop.height);
    if target_height == 0 || !crop.fits_within(asset.width, asset.height) {
        return Err(degenerate(asset));
    }

    Ok(ProcessingPlan {
        needs_transform: true,
        crop: Some(crop),
        trim,
        target_width,
        target_height,
    })
}

/// Largest centered 9:16 rectangle inside a `width` x `height` frame.
fn center_crop(width: u32, height: u32) -> CropRect {
    let (w, h) = (width as u64, height as u64);

    if (width as f64 / height as f64) > TARGET_ASPECT {
        // Wider: keep full height
        let crop_w = (h * 9 / 16) as u32;
        CropRect::new((width - crop_w) / 2, 0, crop_w, height)
    } else {
        // Narrower: keep full width
        let crop_h = (w * 16 / 9) as u32;
        CropRect::new(0, (height - crop_h) / 2, width, crop_h)
    }
}

/// Exact 9:16 output size no taller than the crop or `TARGET_HEIGHT_MAX`.
fn target_resolution(crop_height: u32) -> (u32, u32) {
    let height = (crop_height / HEIGHT_STEP * HEIGHT_STEP).min(TARGET_HEIGHT_MAX);
    (height / 16 * 9, height)
}

fn degenerate(asset: &VideoAsset) -> MediaError {
    MediaError::DegenerateGeometry {
        width: asset.width,
        height: asset.height,
        duration: asset.duration,
    }
}
