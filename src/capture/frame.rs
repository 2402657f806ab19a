//! Frame data structures for captured camera content

use std::time::Instant;

/// A captured frame from the camera (or playback source).
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw RGB8 pixel data, row-major.
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl CapturedFrame {
    /// Create a new captured frame
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_dimensions() {
        let frame = CapturedFrame::new(vec![0; 4 * 2 * 3], 4, 2);
        assert_eq!(frame.dimensions(), (4, 2));
    }
}
