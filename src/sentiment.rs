// =============================================================================
// Sentiment Classifier — RSI value to discrete bucket
// =============================================================================
//
//   rsi > 70         => Overbought
//   50 < rsi <= 70   => Elevated
//   30 <= rsi <= 50  => Neutral
//   rsi < 30         => Oversold
//
// Exactly 70.0 is Elevated, exactly 50.0 is Neutral, exactly 30.0 is Neutral.
// =============================================================================

/// Qualitative momentum label derived from an RSI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Overbought,
    Elevated,
    Neutral,
    Oversold,
}

/// Lower edge of a bucket.
#[derive(Debug, Clone, Copy)]
enum Edge {
    Above(f64),
    AtLeast(f64),
}

impl Edge {
    fn admits(self, rsi: f64) -> bool {
        match self {
            Self::Above(bound) => rsi > bound,
            Self::AtLeast(bound) => rsi >= bound,
        }
    }
}

/// Ordered `(lower edge, bucket)` pairs, highest first.  A value belongs to
/// the first bucket whose edge admits it; Oversold catches the rest.
const THRESHOLDS: [(Edge, Bucket); 3] = [
    (Edge::Above(70.0), Bucket::Overbought),
    (Edge::Above(50.0), Bucket::Elevated),
    (Edge::AtLeast(30.0), Bucket::Neutral),
];

impl Bucket {
    /// Glyph shown in front of each report line.
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Overbought => "🔴",
            Self::Elevated => "🟠",
            Self::Neutral => "🟡",
            Self::Oversold => "🟢",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Overbought => "Overbought",
            Self::Elevated => "Elevated",
            Self::Neutral => "Neutral",
            Self::Oversold => "Oversold",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify an RSI value into its [`Bucket`].
///
/// Total over all `f64`: anything below 30 (including NaN) is Oversold.
pub fn classify(rsi: f64) -> Bucket {
    THRESHOLDS
        .iter()
        .find(|(edge, _)| edge.admits(rsi))
        .map(|&(_, bucket)| bucket)
        .unwrap_or(Bucket::Oversold)
}
