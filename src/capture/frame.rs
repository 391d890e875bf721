/// Frame data from a capture source
#[derive(Debug, Clone, Default)]
pub struct CapturedFrame {
    /// Raw pixel data (BGRA format)
    pub data: Vec<u8>,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Timestamp in milliseconds (process time)
    pub timestamp_ms: f64,

    /// Bytes per row (may include padding)
    pub bytes_per_row: u32,
}

impl CapturedFrame {
    /// A zero-sized frame stamped with `timestamp_ms`, for sources that
    /// don't deliver pixels.
    pub fn empty(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
