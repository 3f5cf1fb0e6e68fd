//! Presentation collaborator.
//!
//! The controller publishes every annotated frame together with its label
//! counts. Rendering is up to the implementation; the summary text layout is
//! shared so every front end shows the same lines.

use crate::annotate::LabelCounts;
use crate::frame::Frame;

pub const SUMMARY_HEADER: &str = "Label Counts:";

/// Receives display-ready output once per tick.
pub trait DisplaySink {
    fn publish(&mut self, frame: &Frame, counts: &LabelCounts);
}

/// `Label Counts:` header, a blank line, `label: count` lines, a blank line,
/// then `Total: N`.
pub fn summary_text(counts: &LabelCounts) -> String {
    let mut text = format!("{}\n\n", SUMMARY_HEADER);
    for (label, count) in counts.iter() {
        text.push_str(&format!("{}: {}\n", label, count));
    }
    text.push_str(&format!("\nTotal: {}", counts.total()));
    text
}

/// Writes each summary to the log. Used by the headless player.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogDisplay;

impl DisplaySink for LogDisplay {
    fn publish(&mut self, frame: &Frame, counts: &LabelCounts) {
        log::info!(
            "frame {} ({}x{}): {}",
            frame.index(),
            frame.width(),
            frame.height(),
            counts.summary_lines().join(", ")
        );
        log::debug!("{}", summary_text(counts));
    }
}

/// Keeps the latest publication. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct LatestFrame {
    pub frame: Option<Frame>,
    pub counts: LabelCounts,
    pub published: u64,
}

impl DisplaySink for LatestFrame {
    fn publish(&mut self, frame: &Frame, counts: &LabelCounts) {
        self.frame = Some(frame.clone());
        self.counts = counts.clone();
        self.published += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::count_labels;
    use crate::detect::{BoundingBox, Detection};

    #[test]
    fn summary_lists_labels_in_order_then_total() {
        let bbox = BoundingBox::new(0.0, 0.0, 4.0, 4.0);
        let counts = count_labels(&[
            Detection::new("truck", 0.9, bbox),
            Detection::new("bus", 0.8, bbox),
            Detection::new("truck", 0.7, bbox),
        ]);
        assert_eq!(
            summary_text(&counts),
            "Label Counts:\n\nbus: 1\ntruck: 2\n\nTotal: 3"
        );
    }

    #[test]
    fn empty_summary_still_has_total() {
        assert_eq!(summary_text(&LabelCounts::default()), "Label Counts:\n\n\nTotal: 0");
    }
}
