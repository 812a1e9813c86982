use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::profile::range::Range;

/// An ordered list of disjoint [`Range`]s.
///
/// Work units hold a `RangeList` with the resources allocated to them and
/// the availability profile keeps one per entry with the resources free at
/// that time. The list is kept canonical at all times: ranges are sorted by
/// their beginning and adjacent or overlapping neighbours are merged, so
/// every observation sees the sorted, merged form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeList {
    ranges: Vec<Range>,
}

impl RangeList {
    /// Creates an empty list.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a list holding the single contiguous range `[from..to]`.
    pub fn span(from: u32, to: u32) -> Self {
        Self { ranges: vec![Range::new(from, to)] }
    }

    /// The total number of resource indices in this list.
    pub fn num_items(&self) -> u32 {
        self.ranges.iter().map(Range::num_items).sum()
    }

    /// The number of ranges in this list.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Checks whether the list holds no resources at all.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The smallest resource index in this list.
    pub fn lowest(&self) -> Option<u32> {
        self.ranges.first().map(Range::begin)
    }

    /// The greatest resource index in this list.
    pub fn highest(&self) -> Option<u32> {
        self.ranges.last().map(Range::end)
    }

    /// Adds a range to this list, merging it with its neighbours
    /// where they touch or overlap.
    pub fn add(&mut self, range: Range) {
        self.ranges.push(range);
        self.merge_ranges();
    }

    /// Adds all ranges of `other` to this list (set union).
    pub fn add_all(&mut self, other: &RangeList) {
        self.ranges.extend_from_slice(&other.ranges);
        self.merge_ranges();
    }

    /// Removes all ranges from this list.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Restores the canonical form: sorted by beginning, with touching or
    /// overlapping neighbours merged. Idempotent; mutating operations call
    /// this themselves, so a canonical list stays canonical.
    pub fn merge_ranges(&mut self) {
        if self.ranges.len() < 2 {
            return;
        }
        self.ranges.sort();
        let mut merged: Vec<Range> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if r.begin() <= last.end().saturating_add(1) => {
                    if r.end() > last.end() {
                        *last = Range::new(last.begin(), r.end());
                    }
                }
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }

    /// Returns the intersection of this list with `other`.
    ///
    /// Two-pointer sweep over the sorted lists: a left range whose end is
    /// below the right range's beginning is skipped, and vice versa.
    pub fn intersection(&self, other: &RangeList) -> RangeList {
        let mut result = RangeList::empty();
        let (a, b) = (&self.ranges, &other.ranges);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i].end() < b[j].begin() {
                i += 1;
            } else if b[j].end() < a[i].begin() {
                j += 1;
            } else {
                // Both lists are disjoint internally, so overlaps never touch.
                result.ranges.push(a[i].intersection(b[j]).unwrap());
                if a[i].end() <= b[j].end() {
                    i += 1;
                } else {
                    j += 1;
                }
            }
        }
        result
    }

    /// Removes the indices of `other` from this list (set difference).
    pub fn remove(&mut self, other: &RangeList) {
        if self.ranges.is_empty() || other.ranges.is_empty() {
            return;
        }
        let mut result: Vec<Range> = Vec::with_capacity(self.ranges.len());
        let mut j = 0;
        for r in &self.ranges {
            while j < other.ranges.len() && other.ranges[j].end() < r.begin() {
                j += 1;
            }
            let mut begin = r.begin();
            let mut consumed = false;
            let mut k = j;
            while k < other.ranges.len() && other.ranges[k].begin() <= r.end() {
                let o = other.ranges[k];
                if o.begin() > begin {
                    result.push(Range::new(begin, o.begin() - 1));
                }
                if o.end() >= r.end() {
                    consumed = true;
                    break;
                }
                begin = begin.max(o.end() + 1);
                k += 1;
            }
            if !consumed && begin <= r.end() {
                result.push(Range::new(begin, r.end()));
            }
        }
        self.ranges = result;
    }

    /// Greedily selects the first `required` indices of this list.
    ///
    /// # Returns
    /// Returns a new canonical list with exactly `required` indices, or
    /// `None` if this list does not hold that many.
    pub fn select_resources(&self, required: u32) -> Option<RangeList> {
        if required == 0 || self.num_items() < required {
            return None;
        }
        let mut selected = RangeList::empty();
        let mut left = required;
        for r in &self.ranges {
            if r.num_items() >= left {
                selected.ranges.push(Range::new(r.begin(), r.begin() + left - 1));
                break;
            }
            selected.ranges.push(*r);
            left -= r.num_items();
        }
        Some(selected)
    }

    /// Checks whether every index of `other` is also in this list.
    pub fn contains_all(&self, other: &RangeList) -> bool {
        self.intersection(other).num_items() == other.num_items()
    }

    /// Iterates over the ranges of this list in sorted order.
    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.ranges.iter()
    }

    /// Iterates over the individual resource indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(Range::indices)
    }
}

impl From<Range> for RangeList {
    fn from(range: Range) -> Self {
        Self { ranges: vec![range] }
    }
}

impl FromIterator<Range> for RangeList {
    fn from_iter<T: IntoIterator<Item = Range>>(iter: T) -> Self {
        let mut list = RangeList { ranges: iter.into_iter().collect() };
        list.merge_ranges();
        list
    }
}

impl<'a> IntoIterator for &'a RangeList {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl PartialOrd for RangeList {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RangeList {
    /// Lexicographic ordering on (lowest item, highest item, total count).
    fn cmp(&self, other: &Self) -> Ordering {
        self.lowest()
            .cmp(&other.lowest())
            .then(self.highest().cmp(&other.highest()))
            .then(self.num_items().cmp(&other.num_items()))
    }
}

impl fmt::Display for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.is_empty() {
            return write!(f, "{{[]}}");
        }
        write!(f, "{{")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", r)?;
        }
        write!(f, "}}")
    }
}

impl FromStr for RangeList {
    type Err = Error;

    /// Parses a serialised list such as `{[0..3],[6..10]}`. The input does
    /// not have to be sorted; the result is canonical.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || Error::RangeParseError(s.to_string());
        let body = s
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(err)?;
        let mut list = RangeList::empty();
        if body == "[]" || body.is_empty() {
            return Ok(list);
        }
        for part in body.split(',') {
            let inner = part
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .ok_or_else(err)?;
            let (begin, end) = inner.split_once("..").ok_or_else(err)?;
            let begin: u32 = begin.parse().map_err(|_| err())?;
            let end: u32 = end.parse().map_err(|_| err())?;
            if begin > end {
                return Err(err());
            }
            list.ranges.push(Range::new(begin, end));
        }
        list.merge_ranges();
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_canonical_and_idempotent() {
        let list: RangeList = vec![
            Range::new(10, 20),
            Range::new(3, 5),
            Range::new(6, 8),
            Range::new(15, 25),
        ]
        .into_iter()
        .collect();
        assert_eq!(list.to_string(), "{[3..8],[10..25]}");

        let mut again = list.clone();
        again.merge_ranges();
        assert_eq!(again, list);
    }

    #[test]
    fn union_and_difference() {
        let mut full = RangeList::span(0, 99);
        let start = RangeList::span(0, 9);

        full.remove(&start);
        assert_eq!(full.to_string(), "{[10..99]}");

        full.add_all(&start);
        assert_eq!(full.to_string(), "{[0..99]}");

        let middle = RangeList::span(40, 59);
        full.remove(&middle);
        assert_eq!(full.to_string(), "{[0..39],[60..99]}");
        assert_eq!(full.num_items(), 80);
    }

    #[test]
    fn intersection_sweep() {
        let a: RangeList = vec![Range::new(0, 10), Range::new(20, 30), Range::new(50, 60)]
            .into_iter()
            .collect();
        let b: RangeList = vec![Range::new(5, 25), Range::new(58, 70)].into_iter().collect();
        let its = a.intersection(&b);
        assert_eq!(its.to_string(), "{[5..10],[20..25],[58..60]}");

        assert!(RangeList::span(0, 99).intersection(&RangeList::empty()).is_empty());
    }

    #[test]
    fn select_picks_lowest_indices_first() {
        let list: RangeList = vec![Range::new(2, 4), Range::new(8, 20)].into_iter().collect();
        let selected = list.select_resources(5).unwrap();
        assert_eq!(selected.to_string(), "{[2..4],[8..9]}");
        assert_eq!(selected.num_items(), 5);
        assert!(list.select_resources(17).is_none());
        assert!(list.contains_all(&selected));
    }

    #[test]
    fn parse_round_trip() {
        let list: RangeList = "{[40..59],[0..9]}".parse().unwrap();
        assert_eq!(list.to_string(), "{[0..9],[40..59]}");
        assert!("{0..9}".parse::<RangeList>().is_err());
        assert!("{[9..0]}".parse::<RangeList>().is_err());
        let empty: RangeList = "{[]}".parse().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn content_equality() {
        let a: RangeList = vec![Range::new(0, 4), Range::new(5, 9)].into_iter().collect();
        let b = RangeList::span(0, 9);
        assert_eq!(a, b);
    }
}
