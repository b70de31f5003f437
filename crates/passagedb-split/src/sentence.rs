//! Generic sentence-boundary splitter with no structural awareness.

use passagedb_core::traits::Splitter;
use passagedb_core::Result;
use unicode_segmentation::UnicodeSegmentation;

/// Accumulates consecutive sentences into passages bounded by a soft size
/// target.
///
/// Sentences are segmented on UAX #29 boundaries. Whenever appending the
/// next sentence would push the buffer past `target_size`, the buffer is
/// emitted and a new one starts with that sentence. The trailing buffer is
/// emitted even when under the target. A single sentence longer than the
/// target becomes its own oversized passage; the target is a soft bound,
/// not a cap.
pub struct SentenceSplitter {
    target_size: usize,
}

impl SentenceSplitter {
    pub fn new(target_size: usize) -> Self {
        Self { target_size }
    }
}

impl Splitter for SentenceSplitter {
    fn split(&self, text: &str) -> Result<Vec<String>> {
        let mut passages = Vec::new();
        let mut buf = String::new();
        for sentence in text.split_sentence_bounds() {
            if !buf.is_empty() && buf.len() + sentence.len() > self.target_size {
                passages.push(std::mem::take(&mut buf));
            }
            buf.push_str(sentence);
        }
        if !buf.is_empty() {
            passages.push(buf);
        }
        Ok(passages)
    }
}
