//! Marking recognition (OCR)
//!
//! Reads the text printed on a cropped component region. The recognizer is a
//! black box behind [`MarkingReader`]; the core only relies on getting back
//! candidate strings with confidences, picking the best one and stripping
//! everything non-alphanumeric before decoding.

use anyhow::{Context, Result};
use image::GrayImage;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// One candidate text reading from the recognizer.
#[derive(Debug, Clone)]
pub struct OcrReading {
    pub text: String,
    pub confidence: f32,
}

/// Black-box text recognizer over a preprocessed grayscale region.
/// Returns zero or more candidate readings; empty means the read failed.
pub trait MarkingReader: Send {
    fn read(&mut self, region: &GrayImage) -> Result<Vec<OcrReading>>;
}

/// Pick the highest-confidence reading, if any.
pub fn best_reading(readings: Vec<OcrReading>) -> Option<OcrReading> {
    readings.into_iter().fold(None, |best, reading| match best {
        Some(b) if b.confidence >= reading.confidence => Some(b),
        _ => Some(reading),
    })
}

/// Strip everything but ASCII letters and digits from an OCR result.
pub fn clean_marking(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// CRNN-style recognition model via ONNX Runtime with CTC decoding.
pub struct OnnxMarkingReader {
    session: Session,
    charset: Vec<char>,
    input_height: u32,
    max_width: u32,
}

impl OnnxMarkingReader {
    /// Load the recognition model and its character dictionary
    /// (one character per line; index 0 in the output is the CTC blank).
    pub fn new(model_path: &Path, dict_path: &Path) -> Result<Self> {
        info!("Loading marking recognition model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(2)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(model_path)
            .context("Failed to load recognition model")?;

        let dict = std::fs::read_to_string(dict_path)
            .with_context(|| format!("Failed to read character dictionary {:?}", dict_path))?;
        let charset: Vec<char> = dict
            .lines()
            .filter_map(|line| line.chars().next())
            .collect();

        info!("Recognition model loaded: {} characters", charset.len());

        Ok(Self {
            session,
            charset,
            input_height: 48,
            max_width: 320,
        })
    }

    /// Resize to the model's input height (aspect preserved, width capped)
    /// and normalize to [-1, 1], replicated across three channels.
    fn preprocess(&self, region: &GrayImage) -> (Vec<f32>, usize) {
        let (w, h) = region.dimensions();
        let target_h = self.input_height;
        let target_w = ((w as f32 * target_h as f32 / h.max(1) as f32) as u32)
            .clamp(target_h, self.max_width);

        let resized = image::imageops::resize(
            region,
            target_w,
            target_h,
            image::imageops::FilterType::Triangle,
        );

        let mut input = Array4::<f32>::zeros((1, 3, target_h as usize, target_w as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let value = (pixel.0[0] as f32 / 255.0 - 0.5) / 0.5;
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] = value;
            }
        }

        let (data, _offset) = input.into_raw_vec_and_offset();
        (data, target_w as usize)
    }

    /// Greedy CTC decode: argmax per timestep, collapse repeats, drop blanks.
    fn ctc_decode(&self, probs: &[f32], steps: usize, classes: usize) -> OcrReading {
        let mut text = String::new();
        let mut confidences = Vec::new();
        let mut previous = 0usize;

        for step in 0..steps {
            let row = &probs[step * classes..(step + 1) * classes];
            let (index, &score) = row
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap_or((0, &0.0));

            // Index 0 is the CTC blank.
            if index != 0 && index != previous {
                if let Some(&c) = self.charset.get(index - 1) {
                    text.push(c);
                    confidences.push(score);
                }
            }
            previous = index;
        }

        let confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };

        OcrReading { text, confidence }
    }
}

impl MarkingReader for OnnxMarkingReader {
    fn read(&mut self, region: &GrayImage) -> Result<Vec<OcrReading>> {
        let start = Instant::now();

        let (input, width) = self.preprocess(region);
        let tensor = Tensor::from_array(([1usize, 3, self.input_height as usize, width], input))?;

        let outputs = self.session.run(ort::inputs![tensor])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let data = data.to_vec();
        drop(outputs);
        let (steps, classes) = match dims.as_slice() {
            [_, steps, classes] => (*steps, *classes),
            other => anyhow::bail!("Unexpected recognizer output shape {:?}", other),
        };

        let reading = self.ctc_decode(&data, steps, classes);
        debug!(
            "Marking read in {:?}: {:?} ({:.2})",
            start.elapsed(),
            reading.text,
            reading.confidence
        );

        if reading.text.is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![reading])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_reading_picks_highest_confidence() {
        let readings = vec![
            OcrReading {
                text: "1002".to_string(),
                confidence: 0.4,
            },
            OcrReading {
                text: "1003".to_string(),
                confidence: 0.9,
            },
            OcrReading {
                text: "1O03".to_string(),
                confidence: 0.7,
            },
        ];

        assert_eq!(best_reading(readings).unwrap().text, "1003");
    }

    #[test]
    fn test_best_reading_of_empty_is_none() {
        assert!(best_reading(vec![]).is_none());
    }

    #[test]
    fn test_best_reading_keeps_first_on_tie() {
        let readings = vec![
            OcrReading {
                text: "133".to_string(),
                confidence: 0.8,
            },
            OcrReading {
                text: "138".to_string(),
                confidence: 0.8,
            },
        ];

        assert_eq!(best_reading(readings).unwrap().text, "133");
    }

    #[test]
    fn test_clean_marking_strips_noise() {
        assert_eq!(clean_marking(" 10-03.\n"), "1003");
        assert_eq!(clean_marking("R100Ω"), "R100");
        assert_eq!(clean_marking("***"), "");
    }
}
