//! Progress estimation for streamed HTML generation.
//!
//! There is no length oracle for the output, so progress is a heuristic over
//! elapsed wall-clock time, chunk count and character count, each with a
//! capped contribution. The estimate starts at a low floor, is monotonically
//! non-decreasing, and never exceeds [`PRE_COMPLETION_CAP`] until the stream
//! ends; the caller sets 100 only after successful persistence.

pub const PROGRESS_FLOOR: u8 = 8;
pub const PRE_COMPLETION_CAP: u8 = 94;

/// Tuning values, not correctness constraints.
const TIME_UNIT_MS: i64 = 900;
const TIME_CAP: u32 = 30;
const CHUNK_UNIT: u64 = 3;
const CHUNK_CAP: u32 = 25;
const CHAR_UNIT: u64 = 420;
const CHAR_CAP: u32 = 31;

#[derive(Debug)]
pub struct ProgressEstimator {
    started_at: i64,
    chunks: u64,
    chars: u64,
    /// Highest value handed out so far; keeps the estimate monotone even if
    /// a contribution formula were ever adjusted mid-stream.
    high_water: u8,
}

impl ProgressEstimator {
    pub fn start() -> Self {
        Self {
            started_at: chrono::Utc::now().timestamp_millis(),
            chunks: 0,
            chars: 0,
            high_water: PROGRESS_FLOOR,
        }
    }

    pub fn record_chunk(&mut self, chars: usize) {
        self.chunks += 1;
        self.chars += chars as u64;
    }

    pub fn estimate(&mut self) -> u8 {
        let elapsed = chrono::Utc::now().timestamp_millis() - self.started_at;
        let from_time = ((elapsed.max(0) / TIME_UNIT_MS) as u32).min(TIME_CAP);
        let from_chunks = ((self.chunks / CHUNK_UNIT) as u32).min(CHUNK_CAP);
        let from_chars = ((self.chars / CHAR_UNIT) as u32).min(CHAR_CAP);

        let raw = PROGRESS_FLOOR as u32 + from_time + from_chunks + from_chars;
        let clamped = raw.min(PRE_COMPLETION_CAP as u32) as u8;
        self.high_water = self.high_water.max(clamped);
        self.high_water
    }

    /// Stream finished: force the estimate to the pre-completion cap if it
    /// is not already there.
    pub fn complete(&mut self) -> u8 {
        self.high_water = self.high_water.max(PRE_COMPLETION_CAP);
        self.high_water
    }
}
