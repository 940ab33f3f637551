//! Chart projection: candle list -> chart data model.
//!
//! The projector owns the single chart model for the lifetime of the view.
//! Each render replaces the data wholesale; nothing is carried over between
//! renders, so redraw cost depends only on the current window.

use crate::shared::types::Candle;

/// Relative padding applied above and below the candle span
const SPAN_PADDING: f64 = 0.08;
/// Relative padding of the minimum price when the span is zero
const FLAT_PADDING: f64 = 0.02;

/// Vertical axis bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalRange {
    pub min: f64,
    pub max: f64,
}

impl VerticalRange {
    pub fn height(&self) -> f64 {
        self.max - self.min
    }

    pub fn as_bounds(&self) -> [f64; 2] {
        [self.min, self.max]
    }
}

impl Default for VerticalRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Padded vertical range for a candle set.
///
/// - empty set: `[0, 1]`
/// - non-zero span: both ends padded by 8% of `max_high - min_low`
/// - zero span: both ends padded by 2% of `|min_low|`; a flat series at
///   exactly zero falls back to a padding of 1.0 so the range never collapses
pub fn vertical_range(candles: &[Candle]) -> VerticalRange {
    if candles.is_empty() {
        return VerticalRange::default();
    }

    let (low, high) = candles.iter().fold((f64::MAX, f64::MIN), |(low, high), c| {
        (low.min(c.low), high.max(c.high))
    });

    let span = high - low;
    let pad = if span > 0.0 {
        span * SPAN_PADDING
    } else {
        let pad = low.abs() * FLAT_PADDING;
        if pad > 0.0 {
            pad
        } else {
            1.0
        }
    };

    VerticalRange {
        min: low - pad,
        max: high + pad,
    }
}

/// One plotted candle
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcPoint {
    /// Position on the x axis (candle index, oldest first)
    pub x: f64,
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcPoint {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Data model handed to the chart widget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartModel {
    /// Symbol of the data being shown (not necessarily the selected one)
    pub title: String,
    pub points: Vec<OhlcPoint>,
    pub range: VerticalRange,
    /// Bumped on every render so the widget knows to redraw
    pub revision: u64,
}

impl ChartModel {
    pub fn x_bounds(&self) -> [f64; 2] {
        [0.0, self.points.len().max(1) as f64]
    }

    pub fn last_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }
}

/// Owns the chart model and replaces it on each render
#[derive(Debug, Default)]
pub struct ChartProjector {
    model: ChartModel,
}

impl ChartProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the chart contents with `candles` for `symbol`
    pub fn render(&mut self, symbol: &str, candles: &[Candle]) {
        let points = candles
            .iter()
            .enumerate()
            .map(|(index, c)| OhlcPoint {
                x: index as f64 + 0.5,
                timestamp: c.timestamp.clone(),
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
            })
            .collect();

        self.model = ChartModel {
            title: symbol.to_string(),
            points,
            range: vertical_range(candles),
            revision: self.model.revision.wrapping_add(1),
        };
    }

    pub fn model(&self) -> &ChartModel {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timestamp: "2025-01-01T00:00:00+00:00".to_string(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_empty_range_is_unit() {
        assert_eq!(vertical_range(&[]), VerticalRange { min: 0.0, max: 1.0 });
    }

    #[test]
    fn test_range_padding() {
        struct TestCase {
            input: Vec<Candle>,
            expected: VerticalRange,
        }

        let tests = vec![
            TestCase {
                // TC0: span 100 padded by 8 each side
                input: vec![candle(100.0, 150.0, 100.0, 140.0), candle(140.0, 200.0, 120.0, 190.0)],
                expected: VerticalRange { min: 92.0, max: 208.0 },
            },
            TestCase {
                // TC1: single flat candle padded by 2% of its price
                input: vec![candle(50.0, 50.0, 50.0, 50.0)],
                expected: VerticalRange { min: 49.0, max: 51.0 },
            },
            TestCase {
                // TC2: flat at zero never collapses
                input: vec![candle(0.0, 0.0, 0.0, 0.0)],
                expected: VerticalRange { min: -1.0, max: 1.0 },
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = vertical_range(&test.input);
            assert!(
                (actual.min - test.expected.min).abs() < 1e-9
                    && (actual.max - test.expected.max).abs() < 1e-9,
                "TC{} failed: {:?}",
                index,
                actual
            );
        }
    }

    #[test]
    fn test_range_encloses_every_candle() {
        let sets = vec![
            vec![candle(1.0, 1.5, 0.5, 1.2)],
            vec![candle(10.0, 12.0, 9.0, 11.0), candle(11.0, 30.0, 10.5, 25.0), candle(25.0, 26.0, 2.0, 3.0)],
            vec![candle(0.0001, 0.0002, 0.00005, 0.00015); 50],
        ];

        for (index, set) in sets.into_iter().enumerate() {
            let low = set.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let high = set.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let range = vertical_range(&set);
            assert!(range.min < low, "set {} min not padded", index);
            assert!(range.max > high, "set {} max not padded", index);
        }
    }

    #[test]
    fn test_single_point_has_positive_height() {
        let range = vertical_range(&[candle(0.37, 0.37, 0.37, 0.37)]);
        assert!(range.height() > 0.0);
        assert!((range.height() - 0.37 * 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_render_replaces_wholesale() {
        let mut projector = ChartProjector::new();
        projector.render("BTCUSDT", &[candle(1.0, 2.0, 0.5, 1.5), candle(1.5, 2.5, 1.0, 2.0)]);
        assert_eq!(projector.model().points.len(), 2);
        assert_eq!(projector.model().title, "BTCUSDT");
        let first_revision = projector.model().revision;

        projector.render("ETHUSDT", &[candle(3.0, 4.0, 2.0, 3.5)]);
        let model = projector.model();
        assert_eq!(model.title, "ETHUSDT");
        assert_eq!(model.points.len(), 1);
        assert_eq!(model.last_close(), Some(3.5));
        assert_eq!(model.revision, first_revision + 1);

        projector.render("ETHUSDT", &[]);
        assert!(projector.model().points.is_empty());
        assert_eq!(projector.model().range, VerticalRange::default());
    }
}
