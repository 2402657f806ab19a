//! Frame acquisition layer
//!
//! The inspection worker pulls frames through the narrow [`FrameSource`]
//! trait. A live camera (OpenCV, behind the `camera` feature) and an
//! image-folder playback source both implement it, so the pipeline runs the
//! same way with or without a device attached.

pub mod frame;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use frame::CapturedFrame;

/// A source of frames: a camera device or a playback of still images.
///
/// `Ok(None)` signals end-of-stream; an `Err` is a read failure the caller
/// may retry once before giving up.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Option<CapturedFrame>>;

    /// Short description for status display.
    fn describe(&self) -> String;
}

/// Plays back still images from a directory in filename order.
///
/// Useful for bench runs and regression checks against captured boards.
pub struct FolderSource {
    paths: Vec<PathBuf>,
    next: usize,
    loop_playback: bool,
}

impl FolderSource {
    pub fn new(dir: &Path, loop_playback: bool) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read playback directory {:?}", dir))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("png") | Some("jpg") | Some("jpeg") | Some("bmp")
                )
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            anyhow::bail!("No images found in playback directory {:?}", dir);
        }

        info!("Playback source: {} images from {:?}", paths.len(), dir);

        Ok(Self {
            paths,
            next: 0,
            loop_playback,
        })
    }
}

impl FrameSource for FolderSource {
    fn read_frame(&mut self) -> Result<Option<CapturedFrame>> {
        if self.next >= self.paths.len() {
            if !self.loop_playback {
                return Ok(None);
            }
            self.next = 0;
        }

        let path = &self.paths[self.next];
        self.next += 1;

        let img = image::open(path)
            .with_context(|| format!("Failed to load frame image {:?}", path))?
            .to_rgb8();
        let (width, height) = img.dimensions();

        Ok(Some(CapturedFrame::new(img.into_raw(), width, height)))
    }

    fn describe(&self) -> String {
        format!("Playback ({} images)", self.paths.len())
    }
}

#[cfg(feature = "camera")]
pub use self::camera::{probe_cameras, CameraInfo, CameraSource};

#[cfg(feature = "camera")]
mod camera {
    use super::*;
    use opencv::core::Mat;
    use opencv::prelude::*;
    use opencv::videoio::{self, VideoCapture};

    /// Live camera via OpenCV videoio.
    pub struct CameraSource {
        capture: VideoCapture,
        index: i32,
    }

    impl CameraSource {
        pub fn open(index: i32) -> Result<Self> {
            let capture = VideoCapture::new(index, videoio::CAP_ANY)
                .with_context(|| format!("Failed to create capture for camera {}", index))?;

            if !capture.is_opened()? {
                anyhow::bail!("Cannot open camera {}", index);
            }

            info!("Camera {} opened", index);
            Ok(Self { capture, index })
        }
    }

    impl FrameSource for CameraSource {
        fn read_frame(&mut self) -> Result<Option<CapturedFrame>> {
            let mut bgr = Mat::default();
            if !self.capture.read(&mut bgr)? || bgr.empty() {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            opencv::imgproc::cvt_color_def(&bgr, &mut rgb, opencv::imgproc::COLOR_BGR2RGB)?;

            let width = rgb.cols() as u32;
            let height = rgb.rows() as u32;
            let data = rgb.data_bytes()?.to_vec();

            Ok(Some(CapturedFrame::new(data, width, height)))
        }

        fn describe(&self) -> String {
            format!("Camera {}", self.index)
        }
    }

    /// A camera index that opened and produced a frame.
    #[derive(Debug, Clone)]
    pub struct CameraInfo {
        pub index: i32,
        pub width: u32,
        pub height: u32,
    }

    /// Probe camera indices, keeping those that open and deliver a frame.
    pub fn probe_cameras(max_index: i32) -> Vec<CameraInfo> {
        let mut found = Vec::new();

        for index in 0..max_index {
            let Ok(mut source) = CameraSource::open(index) else {
                continue;
            };
            match source.read_frame() {
                Ok(Some(frame)) => {
                    info!("Camera {}: {}x{}", index, frame.width, frame.height);
                    found.push(CameraInfo {
                        index,
                        width: frame.width,
                        height: frame.height,
                    });
                }
                _ => info!("Camera {}: opened but cannot read a frame", index),
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_source_plays_images_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png"] {
            image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]))
                .save(dir.path().join(name))
                .unwrap();
        }

        let mut source = FolderSource::new(dir.path(), false).unwrap();
        assert!(source.read_frame().unwrap().is_some());
        assert!(source.read_frame().unwrap().is_some());
        // End of stream without looping.
        assert!(source.read_frame().unwrap().is_none());
    }

    #[test]
    fn test_folder_source_loops_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(dir.path().join("only.png"))
            .unwrap();

        let mut source = FolderSource::new(dir.path(), true).unwrap();
        for _ in 0..3 {
            assert!(source.read_frame().unwrap().is_some());
        }
    }

    #[test]
    fn test_folder_source_rejects_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FolderSource::new(dir.path(), false).is_err());
    }
}
