//! FFmpeg filter strings for the 9:16 transform.

use vshort_models::{CropRect, ProcessingPlan};

/// Pixel format accepted by every Shorts player.
pub const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

/// `crop=` filter for a rectangle.
pub fn crop_filter(rect: &CropRect) -> String {
    format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y)
}

/// Build the `-vf` chain for a plan on a `source_width` x `source_height` frame.
///
/// A full-frame crop is omitted. Returns `None` for a passthrough plan.
pub fn build_video_filter(plan: &ProcessingPlan, source_width: u32, source_height: u32) -> Option<String> {
    if !plan.needs_transform {
        return None;
    }

    let mut parts = Vec::with_capacity(3);
    if let Some(crop) = plan.crop.as_ref() {
        if !crop.is_full_frame(source_width, source_height) {
            parts.push(crop_filter(crop));
        }
    }
    parts.push(format!("scale={}:{}", plan.target_width, plan.target_height));
    parts.push("setsar=1".to_string());

    Some(parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vshort_models::TrimWindow;

    #[test]
    fn test_landscape_filter() {
        let plan = ProcessingPlan {
            needs_transform: true,
            crop: Some(CropRect::new(656, 0, 607, 1080)),
            trim: Some(TrimWindow::leading(60.0)),
            target_width: 594,
            target_height: 1056,
        };
        assert_eq!(
            build_video_filter(&plan, 1920, 1080).unwrap(),
            "crop=607:1080:656:0,scale=594:1056,setsar=1"
        );
    }

    #[test]
    fn test_full_frame_crop_is_skipped() {
        let plan = ProcessingPlan {
            needs_transform: true,
            crop: Some(CropRect::full_frame(1080, 1920)),
            trim: Some(TrimWindow::leading(60.0)),
            target_width: 1080,
            target_height: 1920,
        };
        assert_eq!(build_video_filter(&plan, 1080, 1920).unwrap(), "scale=1080:1920,setsar=1");
    }

    #[test]
    fn test_passthrough_has_no_filter() {
        assert!(build_video_filter(&ProcessingPlan::passthrough(1080, 1920), 1080, 1920).is_none());
    }
}
