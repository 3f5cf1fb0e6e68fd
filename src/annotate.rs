//! Detection overlay and per-frame label statistics.
//!
//! Both operations are pure: `annotate` draws onto a copy of the frame and
//! `count_labels` builds a fresh snapshot every call.

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::detect::Detection;
use crate::font;
use crate::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
/// Gap between the label baseline and the top edge of its box.
const LABEL_OFFSET: i32 = 5;

/// Draw one 1px box and one `"{label} {confidence:.2}"` caption per detection
/// onto a copy of `frame`.
///
/// Boxes are drawn first so captions stay readable where boxes overlap.
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut canvas = frame.to_image();
    let (width, height) = (frame.width(), frame.height());

    for det in detections {
        let bbox = det.bbox.clamp_to(width, height);
        let x1 = bbox.x1 as i32;
        let y1 = bbox.y1 as i32;
        let w = (bbox.x2 as i32 - x1).max(1) as u32;
        let h = (bbox.y2 as i32 - y1).max(1) as u32;
        draw_hollow_rect_mut(&mut canvas, Rect::at(x1, y1).of_size(w, h), BOX_COLOR);
    }

    for det in detections {
        let bbox = det.bbox.clamp_to(width, height);
        let caption = caption(det);
        let top = bbox.y1 as i32 - LABEL_OFFSET - font::GLYPH_HEIGHT as i32;
        let right_limit = width as i32 - font::text_width(&caption) as i32;
        let left = (bbox.x1 as i32).min(right_limit).max(0);
        font::draw_text(&mut canvas, left, top.max(0), &caption, TEXT_COLOR);
    }

    Frame::from_image(canvas).with_index(frame.index())
}

/// Caption drawn above a detection box.
pub fn caption(det: &Detection) -> String {
    format!("{} {:.2}", det.label, det.confidence)
}

/// Group detections by label. The result replaces any previous snapshot.
pub fn count_labels(detections: &[Detection]) -> LabelCounts {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.label.clone()).or_insert(0) += 1;
    }
    LabelCounts { counts }
}

/// Per-frame label frequencies, ordered by label.
///
/// The sum of all counts equals the number of detections counted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    counts: BTreeMap<String, usize>,
}

impl LabelCounts {
    pub fn get(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// `"label: count"` per label, then `"Total: N"`.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .iter()
            .map(|(label, count)| format!("{}: {}", label, count))
            .collect();
        lines.push(format!("Total: {}", self.total()));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn frame(width: u32, height: u32) -> Frame {
        Frame::from_rgb(width, height, vec![10u8; (width * height * 3) as usize]).unwrap()
    }

    fn det(label: &str, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Detection {
        Detection::new(label, confidence, BoundingBox::new(x1, y1, x2, y2))
    }

    #[test]
    fn annotate_leaves_input_untouched() {
        let original = frame(64, 48);
        let before = original.pixels().to_vec();
        let annotated = annotate(&original, &[det("car", 0.87, 10.0, 20.0, 40.0, 40.0)]);

        assert_eq!(original.pixels(), before.as_slice());
        assert_ne!(annotated.pixels(), before.as_slice());
    }

    #[test]
    fn annotate_draws_green_box_edges() {
        let annotated = annotate(&frame(64, 48), &[det("car", 0.5, 10.0, 20.0, 40.0, 40.0)]);
        let image = annotated.image();
        assert_eq!(image.get_pixel(10, 30).0, [0, 255, 0]);
        assert_eq!(image.get_pixel(25, 39).0, [0, 255, 0]);
        assert_eq!(image.get_pixel(25, 30).0, [10, 10, 10]);
    }

    #[test]
    fn annotate_survives_boxes_outside_the_frame() {
        let annotated = annotate(
            &frame(16, 16),
            &[
                det("kite", 0.3, -50.0, -50.0, -10.0, -10.0),
                det("kite", 0.3, 100.0, 100.0, 200.0, 200.0),
            ],
        );
        assert_eq!((annotated.width(), annotated.height()), (16, 16));
    }

    #[test]
    fn caption_uses_two_decimals() {
        assert_eq!(caption(&det("person", 0.876, 0.0, 0.0, 1.0, 1.0)), "person 0.88");
    }

    #[test]
    fn counts_sum_to_detection_count() {
        let detections = vec![
            det("person", 0.9, 0.0, 0.0, 1.0, 1.0),
            det("car", 0.8, 0.0, 0.0, 1.0, 1.0),
            det("person", 0.7, 0.0, 0.0, 1.0, 1.0),
        ];
        let counts = count_labels(&detections);
        assert_eq!(counts.total(), detections.len());
        assert_eq!(counts.get("person"), 2);
        assert_eq!(counts.get("dog"), 0);
        assert_eq!(counts.summary_lines(), vec!["car: 1", "person: 2", "Total: 3"]);
    }

    #[test]
    fn empty_detections_give_zero_total() {
        let counts = count_labels(&[]);
        assert!(counts.is_empty());
        assert_eq!(counts.summary_lines(), vec!["Total: 0"]);
    }
}
