use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Precomputed statistics of one attribute. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeStatistics {
    pub count: Option<i64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub variance: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatisticKind {
    Count,
    Minimum,
    Maximum,
    Mean,
    StdDev,
    Variance,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StatisticValue {
    Int(i64),
    Float(f64),
}

impl StatisticValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(value) => Some(value),
            Self::Float(_) => None,
        }
    }
}

impl fmt::Display for StatisticValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

impl AttributeStatistics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn get(&self, kind: StatisticKind) -> Option<StatisticValue> {
        match kind {
            StatisticKind::Count => self.count.map(StatisticValue::Int),
            StatisticKind::Minimum => self.minimum.map(StatisticValue::Float),
            StatisticKind::Maximum => self.maximum.map(StatisticValue::Float),
            StatisticKind::Mean => self.mean.map(StatisticValue::Float),
            StatisticKind::StdDev => self.std_dev.map(StatisticValue::Float),
            StatisticKind::Variance => self.variance.map(StatisticValue::Float),
        }
    }
}

/// Per attribute statistics, keyed by attribute name.
pub type StatisticsMap = HashMap<String, AttributeStatistics>;

/// Class value to point count for one categorical attribute.
pub type ClassificationHistogram = BTreeMap<i64, i64>;

/// Histograms keyed by attribute name.
pub type HistogramMap = HashMap<String, ClassificationHistogram>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_statistic_is_none() {
        let stats = AttributeStatistics {
            count: Some(10),
            minimum: Some(-1.5),
            ..Default::default()
        };

        assert_eq!(stats.get(StatisticKind::Count), Some(StatisticValue::Int(10)));
        assert_eq!(stats.get(StatisticKind::Minimum), Some(StatisticValue::Float(-1.5)));
        assert_eq!(stats.get(StatisticKind::Mean), None);
        assert_eq!(stats.get(StatisticKind::Variance), None);
        assert!(!stats.is_empty());
        assert!(AttributeStatistics::default().is_empty());
    }

    #[test]
    fn value_conversions() {
        assert_eq!(StatisticValue::Int(4).as_f64(), 4.0);
        assert_eq!(StatisticValue::Int(4).as_i64(), Some(4));
        assert_eq!(StatisticValue::Float(2.5).as_i64(), None);
        assert_eq!(StatisticValue::Float(2.5).to_string(), "2.5");
    }
}
