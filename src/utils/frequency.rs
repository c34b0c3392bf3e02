use std::collections::BTreeMap;

use serde::Serialize;

use super::time::iso_date;

/// An arbitrarily nested sequence. `Absent` stands for a value that wasn't there at all, like a
/// multi select property missing from a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Item(T),
    Seq(Vec<Nested<T>>),
    Absent,
}

impl<T> From<Vec<T>> for Nested<T> {
    fn from(value: Vec<T>) -> Self {
        Nested::Seq(value.into_iter().map(Nested::Item).collect())
    }
}

impl<T> From<Option<Vec<T>>> for Nested<T> {
    fn from(value: Option<Vec<T>>) -> Self {
        value.map_or(Nested::Absent, Nested::from)
    }
}

/// Flattens nested sequences into one sequence, keeping order. Absent entries are skipped.
pub fn flatten<T>(items: impl IntoIterator<Item = Nested<T>>) -> Vec<T> {
    fn walk<T>(item: Nested<T>, out: &mut Vec<T>) {
        match item {
            Nested::Item(v) => out.push(v),
            Nested::Seq(values) => values.into_iter().for_each(|v| walk(v, out)),
            Nested::Absent => {}
        }
    }

    let mut out = Vec::new();
    for item in items {
        walk(item, &mut out);
    }
    out
}

/// Maps every distinct item to the number of times it occurs.
pub fn count_frequencies<T: Ord>(items: impl IntoIterator<Item = T>) -> BTreeMap<T, u32> {
    let mut frequencies = BTreeMap::new();
    for item in items {
        *frequencies.entry(item).or_insert(0) += 1;
    }
    frequencies
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingDays {
    pub count: usize,
    pub missing_days: Vec<String>,
}

/// Days `1..=number_of_days` of the month that no entry of `present_dates` starts with. Entries
/// may carry a time part, only the `YYYY-MM-DD` prefix matters.
pub fn count_missing_days(
    present_dates: &[impl AsRef<str>],
    year: i32,
    month: u32,
    number_of_days: u32,
) -> MissingDays {
    let missing_days = (1..=number_of_days)
        .map(|day| iso_date(year, month, day))
        .filter(|day| {
            !present_dates
                .iter()
                .any(|date| date.as_ref().starts_with(day.as_str()))
        })
        .collect::<Vec<_>>();

    MissingDays {
        count: missing_days.len(),
        missing_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested() {
        let nested = vec![
            Nested::Seq(vec![
                Nested::Item(1),
                Nested::Seq(vec![Nested::Item(2), Nested::Item(3)]),
            ]),
            Nested::Item(4),
        ];
        assert_eq!(flatten(nested), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_flatten_skips_absent() {
        let nested: Vec<Nested<&str>> = vec![
            Some(vec!["a", "b"]).into(),
            None.into(),
            Nested::Seq(vec![Nested::Absent, Nested::Item("c")]),
        ];
        assert_eq!(flatten(nested), vec!["a", "b", "c"]);
        assert!(flatten(Vec::<Nested<u8>>::new()).is_empty());
    }

    #[test]
    fn test_count_frequencies() {
        let frequencies = count_frequencies(["a", "b", "a"]);
        assert_eq!(frequencies.len(), 2);
        assert_eq!(frequencies["a"], 2);
        assert_eq!(frequencies["b"], 1);
        assert_eq!(count_frequencies(["b", "a", "a"]), frequencies);
    }

    #[test]
    fn test_count_missing_days_empty() {
        let missing = count_missing_days(&Vec::<String>::new(), 2023, 12, 31);
        assert_eq!(missing.count, 31);
        assert_eq!(missing.missing_days[0], "2023-12-01");
        assert_eq!(missing.missing_days[30], "2023-12-31");
    }

    #[test]
    fn test_count_missing_days_full_month() {
        let present = (1..=31)
            .map(|day| format!("2023-12-{day:02}T07:30:00.000+05:30"))
            .collect::<Vec<_>>();
        let missing = count_missing_days(&present, 2023, 12, 31);
        assert_eq!(missing.count, 0);
        assert!(missing.missing_days.is_empty());
    }

    #[test]
    fn test_count_missing_days_pads_single_digits() {
        let missing = count_missing_days(&["2024-01-02", "2024-01-02", "2024-01-03"], 2024, 1, 4);
        assert_eq!(missing.missing_days, vec!["2024-01-01", "2024-01-04"]);
        assert_eq!(missing.count, 2);
    }
}
