//! Supervised windows over a univariate series

/// A fixed-length input window and the value that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Input values in time order
    pub inputs: Vec<f64>,
    /// The observation immediately after `inputs`
    pub target: f64,
}

/// Ordered windows for one item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSet {
    windows: Vec<Window>,
    window_len: usize,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Length of every input window in the set
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Window> {
        self.windows.iter()
    }

    /// Every value that appears as an input or a target
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.windows
            .iter()
            .flat_map(|w| w.inputs.iter().copied().chain(std::iter::once(w.target)))
    }
}

impl<'a> IntoIterator for &'a TrainingSet {
    type Item = &'a Window;
    type IntoIter = std::slice::Iter<'a, Window>;

    fn into_iter(self) -> Self::IntoIter {
        self.windows.iter()
    }
}

/// Slice `series` into `(series[i..i + window], series[i + window])` pairs.
///
/// Only a horizon of one is supported, so a series of length `L` yields
/// `L - window` pairs, or none when `L <= window`. Windows follow time order.
pub fn make_windows(series: &[f64], window: usize) -> TrainingSet {
    const HORIZON: usize = 1;

    if window == 0 || series.len() < window + HORIZON {
        return TrainingSet {
            windows: Vec::new(),
            window_len: window,
        };
    }

    let windows = series
        .windows(window + HORIZON)
        .map(|chunk| Window {
            inputs: chunk[..window].to_vec(),
            target: chunk[window],
        })
        .collect();

    TrainingSet {
        windows,
        window_len: window,
    }
}

/// The most recent `window` values, or `None` if the series is shorter.
pub fn last_window(series: &[f64], window: usize) -> Option<&[f64]> {
    series.len().checked_sub(window).map(|start| &series[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_count_and_targets() {
        let series = [10.0, 12.0, 11.0, 13.0, 15.0, 14.0, 16.0, 18.0];
        let set = make_windows(&series, 5);

        assert_eq!(set.len(), 3);
        assert_eq!(set.window_len(), 5);
        for (i, w) in set.iter().enumerate() {
            assert_eq!(w.inputs.len(), 5);
            assert_eq!(w.inputs, series[i..i + 5].to_vec());
            assert_eq!(w.target, series[5 + i]);
        }
    }

    #[test]
    fn test_short_series_yields_nothing() {
        assert!(make_windows(&[1.0, 2.0, 3.0], 5).is_empty());
        assert!(make_windows(&[1.0, 2.0, 3.0, 4.0, 5.0], 5).is_empty());
        assert_eq!(make_windows(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 5).len(), 1);
    }

    #[test]
    fn test_values_cover_inputs_and_targets() {
        let set = make_windows(&[1.0, 2.0, 3.0, 4.0], 2);
        let values: Vec<f64> = set.values().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_last_window() {
        let series = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(last_window(&series, 5), Some(&series[1..]));
        assert_eq!(last_window(&series[..3], 5), None);
    }
}
