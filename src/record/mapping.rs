//! Column mapping
//!
//! Where the four logical fields live in each input record.

/// Positional indices of the start, end, word and link columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Column holding the start offset
    pub start: usize,
    /// Column holding the end offset
    pub end: usize,
    /// Column holding the spoken word
    pub word: usize,
    /// Column holding the image link
    pub link: usize,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        // capture,start,end,word,score,source,link
        Self::new(1, 2, 3, 6)
    }
}

impl ColumnMapping {
    /// Create a mapping from explicit indices
    pub const fn new(start: usize, end: usize, word: usize, link: usize) -> Self {
        Self {
            start,
            end,
            word,
            link,
        }
    }

    /// Highest index referenced by the mapping
    pub fn max(&self) -> usize {
        self.start.max(self.end).max(self.word).max(self.link)
    }

    /// Minimum number of fields a record needs to be decodable
    pub fn required_len(&self) -> usize {
        self.max() + 1
    }
}
