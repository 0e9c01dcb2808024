//! In-memory frame source.

use anyhow::Result;

use super::VideoSource;
use crate::frame::Frame;

/// Finite sequence of frames held in memory. Reads hand out copies.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the next frame `read` will return.
    pub fn position(&self) -> usize {
        self.cursor
    }
}

impl VideoSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_until_end_then_rewinds() -> Result<()> {
        let mut source = MemorySource::new(vec![
            Frame::filled(2, 2, [1, 1, 1]),
            Frame::filled(2, 2, [2, 2, 2]),
        ]);

        assert_eq!(source.read()?.map(|f| f.pixels()[0]), Some(1));
        assert_eq!(source.read()?.map(|f| f.pixels()[0]), Some(2));
        assert!(source.read()?.is_none());
        assert!(source.read()?.is_none());

        source.rewind()?;
        assert_eq!(source.position(), 0);
        assert_eq!(source.read()?.map(|f| f.pixels()[0]), Some(1));
        Ok(())
    }
}
