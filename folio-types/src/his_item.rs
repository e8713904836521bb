use crate::value::Value;

/// One point in a record's time series: a timestamp (epoch milliseconds,
/// always interpreted in the host record's `tz`) and a value.
#[derive(Clone, Debug, PartialEq)]
pub struct HisItem {
    pub ts: i64,
    pub val: Value,
}

impl HisItem {
    pub fn new(ts: i64, val: Value) -> Self {
        HisItem { ts, val }
    }
}

impl PartialOrd for HisItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.ts.cmp(&other.ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_by_timestamp_only() {
        let a = HisItem::new(10, Value::number(1.0));
        let b = HisItem::new(20, Value::number(0.0));
        assert!(a < b);
    }
}
