//! Frame annotation.
//!
//! Renders a detection batch onto a copy of the frame: zone outlines,
//! detection boxes colored by kind, and centroid dots. The annotated frame
//! is what alert sinks persist and what the shared store exposes to
//! external viewers.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detect::{Detection, DetectionKind};
use crate::frame::Frame;
use crate::geometry::{Zone, ZoneFilter, ZoneRole};

const VIOLATION: Rgb<u8> = Rgb([220, 40, 40]);
const COMPLIANT: Rgb<u8> = Rgb([40, 180, 60]);
const OBSTACLE: Rgb<u8> = Rgb([240, 150, 30]);
const SUBJECT: Rgb<u8> = Rgb([60, 90, 220]);
const INCLUSION_ZONE: Rgb<u8> = Rgb([90, 200, 255]);
const EXCLUSION_ZONE: Rgb<u8> = Rgb([160, 160, 160]);

/// Render zones and detections over `frame`.
pub fn annotate(frame: &Frame, zones: &ZoneFilter, detections: &[Detection]) -> Frame {
    let captured_at = frame.captured_at;
    let mut image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .unwrap_or_else(|| RgbImage::new(frame.width, frame.height));

    for zone in zones.zones() {
        draw_zone(&mut image, zone);
    }
    for detection in detections {
        draw_detection(&mut image, detection);
    }

    let (width, height) = image.dimensions();
    Frame::new(image.into_raw(), width, height, captured_at)
}

fn draw_zone(image: &mut RgbImage, zone: &Zone) {
    let color = match zone.role {
        ZoneRole::Inclusion => INCLUSION_ZONE,
        ZoneRole::Exclusion => EXCLUSION_ZONE,
    };
    let points = &zone.points;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        draw_line_segment_mut(
            image,
            (a.x as f32, a.y as f32),
            (b.x as f32, b.y as f32),
            color,
        );
    }
}

fn draw_detection(image: &mut RgbImage, detection: &Detection) {
    let color = match detection.kind {
        DetectionKind::Obstacle => OBSTACLE,
        DetectionKind::Subject => SUBJECT,
        DetectionKind::Item if detection.is_violation => VIOLATION,
        DetectionKind::Item => COMPLIANT,
    };

    let bbox = &detection.bbox;
    let w = bbox.width().max(1) as u32;
    let h = bbox.height().max(1) as u32;
    draw_hollow_rect_mut(image, Rect::at(bbox.x1, bbox.y1).of_size(w, h), color);

    let centroid = bbox.centroid();
    draw_filled_circle_mut(image, (centroid.x, centroid.y), 3, color);
}
