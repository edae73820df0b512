//! Token estimation: converts character counts into approximate token counts.

/// Default characters-per-token ratio (~4 characters per token).
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Approximates token counts from character counts using a fixed ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl TokenEstimator {
    /// Create an estimator with the given ratio.
    ///
    /// Non-positive or non-finite ratios fall back to [`DEFAULT_CHARS_PER_TOKEN`].
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token.is_finite() && chars_per_token > 0.0 {
            chars_per_token
        } else {
            DEFAULT_CHARS_PER_TOKEN
        };
        Self { chars_per_token }
    }

    /// The configured characters-per-token ratio.
    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }

    /// Estimate tokens for a number of characters, rounding up.
    pub fn estimate_chars(&self, chars: usize) -> u32 {
        let tokens = (chars as f64 / self.chars_per_token).ceil();
        if tokens >= u32::MAX as f64 {
            u32::MAX
        } else {
            tokens as u32
        }
    }

    /// Estimate tokens for a string.
    pub fn estimate(&self, text: &str) -> u32 {
        self.estimate_chars(text.chars().count())
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_TOKEN)
    }
}
