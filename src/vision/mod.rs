//! Vision layer
//!
//! Wraps the object detector and the marking recognizer behind narrow traits
//! and provides the per-frame pipeline: inference, best-per-class reduction,
//! and region OCR for resistor markings.

pub mod detector;
pub mod ocr;
pub mod preprocess;

pub use detector::{
    display_label, reduce_best_per_class, BoundingBox, Detection, Detector, YoloDetector,
};
pub use ocr::{best_reading, clean_marking, MarkingReader, OcrReading, OnnxMarkingReader};

use anyhow::Result;

use crate::capture::frame::CapturedFrame;

/// A cleaned-up marking read from one detection region.
#[derive(Debug, Clone)]
pub struct MarkingRead {
    /// Alphanumeric-only text; empty when the read failed.
    pub text: String,
    pub confidence: f32,
}

/// Detector plus optional marking recognizer for one inspection run.
pub struct VisionPipeline {
    detector: Box<dyn Detector>,
    reader: Option<Box<dyn MarkingReader>>,
    ocr_margin: u32,
}

impl VisionPipeline {
    pub fn new(
        detector: Box<dyn Detector>,
        reader: Option<Box<dyn MarkingReader>>,
        ocr_margin: u32,
    ) -> Self {
        Self {
            detector,
            reader,
            ocr_margin,
        }
    }

    /// Run inference and collapse to the best detection per class.
    pub fn detect(&mut self, frame: &CapturedFrame) -> Result<Vec<Detection>> {
        let raw = self.detector.infer(frame)?;
        Ok(reduce_best_per_class(raw))
    }

    pub fn class_name(&self, class_id: usize) -> String {
        self.detector.class_name(class_id)
    }

    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    /// OCR the region under a detection box.
    ///
    /// `None` when no recognizer is configured or the region is degenerate;
    /// a read that produced no text comes back with an empty string so the
    /// failure is surfaced rather than swallowed.
    pub fn read_marking(
        &mut self,
        frame: &CapturedFrame,
        bbox: &BoundingBox,
    ) -> Result<Option<MarkingRead>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let Some(region) = preprocess::crop_with_margin(frame, bbox, self.ocr_margin) else {
            return Ok(None);
        };

        let prepared = preprocess::prepare_for_ocr(&region);
        let readings = reader.read(&prepared)?;

        let read = match best_reading(readings) {
            Some(reading) => MarkingRead {
                text: clean_marking(&reading.text),
                confidence: reading.confidence,
            },
            None => MarkingRead {
                text: String::new(),
                confidence: 0.0,
            },
        };

        Ok(Some(read))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    struct StubDetector {
        detections: Vec<Detection>,
    }

    impl Detector for StubDetector {
        fn infer(&mut self, _frame: &CapturedFrame) -> Result<Vec<Detection>> {
            Ok(self.detections.clone())
        }

        fn class_name(&self, class_id: usize) -> String {
            format!("class-{}", class_id)
        }
    }

    struct StubReader {
        readings: Vec<OcrReading>,
    }

    impl MarkingReader for StubReader {
        fn read(&mut self, _region: &GrayImage) -> Result<Vec<OcrReading>> {
            Ok(self.readings.clone())
        }
    }

    fn frame() -> CapturedFrame {
        CapturedFrame::new(vec![0; 100 * 100 * 3], 100, 100)
    }

    fn det(class_id: usize, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: BoundingBox::new(10.0, 10.0, 40.0, 40.0),
        }
    }

    #[test]
    fn test_detect_applies_best_per_class_reduction() {
        let detector = StubDetector {
            detections: vec![det(0, 0.5), det(0, 0.9), det(1, 0.7)],
        };
        let mut pipeline = VisionPipeline::new(Box::new(detector), None, 5);

        let detections = pipeline.detect(&frame()).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence, 0.9);
    }

    #[test]
    fn test_read_marking_cleans_best_candidate() {
        let reader = StubReader {
            readings: vec![
                OcrReading {
                    text: "1O-0:3".to_string(),
                    confidence: 0.3,
                },
                OcrReading {
                    text: " 100.3 ".to_string(),
                    confidence: 0.9,
                },
            ],
        };
        let detector = StubDetector { detections: vec![] };
        let mut pipeline = VisionPipeline::new(Box::new(detector), Some(Box::new(reader)), 5);

        let read = pipeline
            .read_marking(&frame(), &BoundingBox::new(10.0, 10.0, 40.0, 40.0))
            .unwrap()
            .unwrap();
        assert_eq!(read.text, "1003");
        assert_eq!(read.confidence, 0.9);
    }

    #[test]
    fn test_read_marking_without_reader_is_none() {
        let detector = StubDetector { detections: vec![] };
        let mut pipeline = VisionPipeline::new(Box::new(detector), None, 5);

        let read = pipeline
            .read_marking(&frame(), &BoundingBox::new(10.0, 10.0, 40.0, 40.0))
            .unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_failed_read_surfaces_empty_text() {
        let reader = StubReader { readings: vec![] };
        let detector = StubDetector { detections: vec![] };
        let mut pipeline = VisionPipeline::new(Box::new(detector), Some(Box::new(reader)), 5);

        let read = pipeline
            .read_marking(&frame(), &BoundingBox::new(10.0, 10.0, 40.0, 40.0))
            .unwrap()
            .unwrap();
        assert!(read.text.is_empty());
    }
}
