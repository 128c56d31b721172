// Token Windowing
// Splits a token sequence into overlapping fixed-size windows for a
// bounded-length classifier.

use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use thiserror::Error;
use tracing::debug;

use crate::services::tokenizer::{TokenCodec, TokenizerError};

pub const DEFAULT_MAX_LEN: usize = 512;
pub const DEFAULT_STRIDE: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("window size must be positive")]
    ZeroMaxLen,
    #[error("stride must be positive")]
    ZeroStride,
    #[error("stride ({stride}) must be smaller than the window size ({max_len})")]
    StrideTooLarge { max_len: usize, stride: usize },
}

/// Window size and stride, validated so that `0 < stride < max_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawWindowParams")]
pub struct WindowParams {
    max_len: usize,
    stride: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWindowParams {
    max_len: usize,
    stride: usize,
}

impl TryFrom<RawWindowParams> for WindowParams {
    type Error = WindowError;

    fn try_from(raw: RawWindowParams) -> Result<Self, Self::Error> {
        Self::new(raw.max_len, raw.stride)
    }
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            stride: DEFAULT_STRIDE,
        }
    }
}

impl WindowParams {
    pub fn new(max_len: usize, stride: usize) -> Result<Self, WindowError> {
        if max_len == 0 {
            return Err(WindowError::ZeroMaxLen);
        }
        if stride == 0 {
            return Err(WindowError::ZeroStride);
        }
        if stride >= max_len {
            return Err(WindowError::StrideTooLarge { max_len, stride });
        }
        Ok(Self { max_len, stride })
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Tokens shared by two consecutive interior windows.
    pub fn overlap(&self) -> usize {
        self.max_len - self.stride
    }

    /// Number of windows a sequence of `len` tokens produces.
    pub fn window_count(&self, len: usize) -> usize {
        match len {
            0 => 0,
            n if n <= self.max_len => 1,
            n => (n - self.max_len).div_ceil(self.stride) + 1,
        }
    }
}

/// Half-open token range `[start, end)` of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpan {
    pub start: usize,
    pub end: usize,
}

impl WindowSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Lazy iterator over the windows of a token sequence.
///
/// Cloning the iterator (or calling [`token_windows`] again) restarts it
/// from the first window.
#[derive(Debug, Clone)]
pub struct TokenWindows<'a> {
    ids: &'a [u32],
    params: WindowParams,
    cursor: usize,
    done: bool,
}

pub fn token_windows(ids: &[u32], params: WindowParams) -> TokenWindows<'_> {
    TokenWindows {
        ids,
        params,
        cursor: 0,
        done: false,
    }
}

impl<'a> Iterator for TokenWindows<'a> {
    type Item = (WindowSpan, &'a [u32]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.ids.len();
        if self.done || self.cursor >= len {
            return None;
        }

        let start = self.cursor;
        let end = (start + self.params.max_len).min(len);
        if end == len {
            self.done = true;
        } else {
            self.cursor += self.params.stride;
        }

        Some((WindowSpan { start, end }, &self.ids[start..end]))
    }
}

impl FusedIterator for TokenWindows<'_> {}

/// A decoded window ready to be sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    pub span: WindowSpan,
    pub text: String,
}

/// Tokenize `text` and decode every window back to text.
///
/// Blank text yields no windows; the caller treats that as nothing to
/// classify, not as an error.
pub fn build_windows<C>(codec: &C, text: &str, params: WindowParams) -> Result<Vec<Window>, TokenizerError>
where
    C: TokenCodec + ?Sized,
{
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let ids = codec.encode(text)?;
    let mut windows = Vec::with_capacity(params.window_count(ids.len()));
    for (span, slice) in token_windows(&ids, params) {
        windows.push(Window {
            span,
            text: codec.decode(slice)?,
        });
    }

    debug!(
        tokens = ids.len(),
        windows = windows.len(),
        max_len = params.max_len,
        stride = params.stride,
        "[WINDOW] document split"
    );
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{document_of, WordCodec};
    use proptest::prelude::*;

    fn spans(len: usize, params: WindowParams) -> Vec<WindowSpan> {
        let ids: Vec<u32> = (0..len as u32).collect();
        token_windows(&ids, params).map(|(span, _)| span).collect()
    }

    #[test]
    fn test_rejects_invalid_params() {
        assert_eq!(WindowParams::new(0, 0), Err(WindowError::ZeroMaxLen));
        assert_eq!(WindowParams::new(8, 0), Err(WindowError::ZeroStride));
        assert_eq!(
            WindowParams::new(8, 8),
            Err(WindowError::StrideTooLarge { max_len: 8, stride: 8 })
        );
        assert!(WindowParams::new(8, 7).is_ok());
    }

    #[test]
    fn test_empty_sequence_has_no_windows() {
        assert!(spans(0, WindowParams::default()).is_empty());
    }

    #[test]
    fn test_short_sequence_is_one_window() {
        let s = spans(300, WindowParams::default());
        assert_eq!(s, vec![WindowSpan { start: 0, end: 300 }]);

        let s = spans(512, WindowParams::default());
        assert_eq!(s, vec![WindowSpan { start: 0, end: 512 }]);
    }

    #[test]
    fn test_thousand_tokens_default_params() {
        let s = spans(1000, WindowParams::default());
        let starts: Vec<usize> = s.iter().map(|w| w.start).collect();
        assert_eq!(starts, vec![0, 256, 512]);
        assert_eq!(s.last().unwrap().end, 1000);
        assert_eq!(s[1], WindowSpan { start: 256, end: 768 });
        assert_eq!(WindowParams::default().window_count(1000), 3);
    }

    #[test]
    fn test_stops_once_end_is_reached() {
        // 768 tokens: the window at 256 already ends at 768, so 512 is never emitted.
        let s = spans(768, WindowParams::default());
        assert_eq!(s.len(), 2);
        assert_eq!(s[1], WindowSpan { start: 256, end: 768 });
    }

    #[test]
    fn test_iterator_is_restartable() {
        let ids: Vec<u32> = (0..20).collect();
        let params = WindowParams::new(8, 4).unwrap();
        let windows = token_windows(&ids, params);
        let first: Vec<_> = windows.clone().collect();
        let second: Vec<_> = windows.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_windows_decodes_each_slice() {
        let params = WindowParams::new(4, 2).unwrap();
        let windows = build_windows(&WordCodec, &document_of(7), params).unwrap();
        let texts: Vec<&str> = windows.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["t0 t1 t2 t3", "t2 t3 t4 t5", "t4 t5 t6"]);
    }

    #[test]
    fn test_build_windows_blank_text() {
        let windows = build_windows(&WordCodec, "  \n\t ", WindowParams::default()).unwrap();
        assert!(windows.is_empty());
    }

    fn params_strategy() -> impl Strategy<Value = WindowParams> {
        (2usize..600)
            .prop_flat_map(|max_len| (Just(max_len), 1..max_len))
            .prop_map(|(max_len, stride)| WindowParams::new(max_len, stride).unwrap())
    }

    proptest! {
        #[test]
        fn windows_cover_sequence(len in 0usize..4000, params in params_strategy()) {
            let s = spans(len, params);
            prop_assert_eq!(s.len(), params.window_count(len));

            if len == 0 {
                prop_assert!(s.is_empty());
                return Ok(());
            }

            prop_assert_eq!(s[0].start, 0);
            prop_assert_eq!(s.last().unwrap().end, len);
            for w in &s {
                prop_assert!(!w.is_empty());
                prop_assert!(w.len() <= params.max_len());
            }
            for pair in s.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                // No gaps between consecutive windows.
                prop_assert!(b.start <= a.end);
                prop_assert_eq!(b.start - a.start, params.stride());
                prop_assert_eq!(a.len(), params.max_len());
            }
            for pair in s.windows(2) {
                prop_assert_eq!(pair[0].end - pair[1].start, params.overlap());
            }
        }
    }
}
