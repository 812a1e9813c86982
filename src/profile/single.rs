use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};

use crate::profile::entry::ProfileEntry;
use crate::profile::range_list::RangeList;
use crate::profile::time_slot::TimeSlot;

/// The availability profile of a resource pool with a single partition.
///
/// The profile is an ordered mapping from simulation times to the ranges of
/// resources free from that instant until the next entry. An entry exists
/// at time `0` holding the full capacity; allocations insert or pin entries
/// at their start (anchor) and finish (cap) and subtract their ranges from
/// every entry in between.
#[derive(Debug, Clone)]
pub struct SingleProfile {
    avail: BTreeMap<i64, ProfileEntry>,
}

impl SingleProfile {
    /// Creates a profile for a pool with the given capacity. The initial
    /// entry at time `0` holds the range `[0..capacity - 1]`.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "Capacity must be > 0");
        let mut avail = BTreeMap::new();
        avail.insert(0, ProfileEntry::new(0, RangeList::span(0, capacity - 1)));
        Self { avail }
    }

    /// Returns an entry with the resources free at the given time: the
    /// entry at or immediately before `time`, cloned with its range set.
    pub fn availability_at(&self, time: i64) -> ProfileEntry {
        match self.avail.range(..=time).next_back() {
            Some((_, entry)) => entry.clone_at(time),
            None => ProfileEntry::new(time, RangeList::empty()),
        }
    }

    /// Checks whether `req_res` resources are free continuously over
    /// `[start_time, start_time + duration)`.
    ///
    /// With `accept_less`, the check never fails and the returned entry
    /// carries whatever intersection is available over the window.
    ///
    /// # Returns
    /// An entry at `start_time` holding the free ranges over the whole
    /// window, or `None` if fewer than `req_res` survive the window.
    pub fn check_availability(
        &self,
        req_res: u32,
        start_time: i64,
        duration: i64,
        accept_less: bool,
    ) -> Option<ProfileEntry> {
        let (prec_time, prec) = self.avail.range(..=start_time).next_back()?;
        let mut intersec = prec.ranges().clone();
        let finish_time = start_time + duration;

        for (time, entry) in self.avail.range((Excluded(*prec_time), Unbounded)) {
            if *time >= finish_time || (!accept_less && intersec.num_items() < req_res) {
                break;
            }
            intersec = intersec.intersection(entry.ranges());
        }

        if intersec.num_items() >= req_res || accept_less {
            Some(ProfileEntry::new(start_time, intersec))
        } else {
            None
        }
    }

    /// Finds the earliest time at or after `ready_time` at which `req_res`
    /// resources are free continuously for `duration`.
    ///
    /// The profile is swept from the entry at or before `ready_time`; each
    /// entry with enough local resources seeds a trial intersection over
    /// the window, and the sweep continues from the next entry on failure.
    pub fn find_start_time(
        &self,
        req_res: u32,
        ready_time: i64,
        duration: i64,
    ) -> Option<ProfileEntry> {
        let anchor_from = *self.avail.range(..=ready_time).next_back()?.0;

        for (anchor_time, anchor) in self.avail.range(anchor_from..) {
            if anchor.num_resources() < req_res {
                continue;
            }

            let pot_start = ready_time.max(*anchor_time);
            let pot_finish = pot_start + duration;
            let mut intersect = anchor.ranges().clone();
            let mut feasible = true;

            for (time, entry) in self.avail.range((Excluded(pot_start), Unbounded)) {
                if *time >= pot_finish {
                    break;
                }
                if entry.num_resources() < req_res {
                    feasible = false;
                    break;
                }
                intersect = intersect.intersection(entry.ranges());
                if intersect.num_items() < req_res {
                    feasible = false;
                    break;
                }
            }

            if feasible && intersect.num_items() >= req_res {
                return Some(ProfileEntry::new(pot_start, intersect));
            }
        }
        None
    }

    /// Allocates the selected ranges over `[start_time, finish_time)`.
    ///
    /// The caller must have established feasibility first: `selected` must
    /// be a subset of the free ranges at `start_time` over the whole
    /// window. The anchor and cap entries are pinned; a newly inserted cap
    /// keeps the pre-allocation ranges of its predecessor.
    pub fn allocate_resource_ranges(
        &mut self,
        selected: &RangeList,
        start_time: i64,
        finish_time: i64,
    ) {
        assert!(
            finish_time >= start_time,
            "Allocation window [{}, {}) is inverted",
            start_time,
            finish_time
        );
        debug_assert!(
            self.availability_at(start_time).ranges().contains_all(selected),
            "Allocation without a successful feasibility check"
        );

        let prec_time = *self
            .avail
            .range(..=start_time)
            .next_back()
            .expect("Profile has no entry at or before the allocation start")
            .0;

        if prec_time == start_time {
            self.avail.get_mut(&start_time).unwrap().pin();
        } else {
            let anchor = self.avail[&prec_time].clone_at(start_time);
            self.avail.insert(start_time, anchor);
        }

        let touched: Vec<i64> = self.avail.range(start_time..finish_time).map(|(k, _)| *k).collect();

        if let Some(cap) = self.avail.get_mut(&finish_time) {
            cap.pin();
        } else {
            // the cap keeps the predecessor's pre-allocation ranges
            let last_key = *touched.last().unwrap();
            let cap = self.avail[&last_key].clone_at(finish_time);
            self.avail.insert(finish_time, cap);
        }

        for key in touched {
            self.avail.get_mut(&key).unwrap().ranges_mut().remove(selected);
        }
    }

    /// Returns a time slot to the profile: the dual of
    /// [`allocate_resource_ranges`](Self::allocate_resource_ranges).
    ///
    /// The ranges are added back to every entry in `[start_time,
    /// finish_time)`. Anchor and cap entries are unpinned and removed once
    /// no work unit relies on them any more; the entry at time `0` is
    /// never removed.
    ///
    /// # Returns
    /// `false` if the window is empty or precedes the whole profile.
    pub fn add_time_slot(&mut self, start_time: i64, finish_time: i64, list: &RangeList) -> bool {
        if finish_time <= start_time {
            return false;
        }
        let prec_time = match self.avail.range(..=start_time).next_back() {
            Some((time, _)) => *time,
            None => return false,
        };
        let first_time = *self.avail.keys().next().unwrap();

        let mut unpin_anchor = false;
        if prec_time == start_time {
            unpin_anchor = true;
        } else {
            let anchor = self.avail[&prec_time].clone_at(start_time);
            self.avail.insert(start_time, anchor);
        }

        let touched: Vec<i64> = self.avail.range(start_time..finish_time).map(|(k, _)| *k).collect();

        let mut unpin_cap = false;
        if self.avail.contains_key(&finish_time) {
            unpin_cap = true;
        } else {
            // state from finish_time onwards is unaffected by the release
            let last_key = *touched.last().unwrap();
            let cap = self.avail[&last_key].clone_at(finish_time);
            self.avail.insert(finish_time, cap);
        }

        for key in touched {
            self.avail.get_mut(&key).unwrap().ranges_mut().add_all(list);
        }

        if unpin_anchor {
            let units = self.avail.get_mut(&start_time).unwrap().unpin();
            if units <= 0 && start_time != first_time {
                self.avail.remove(&start_time);
            }
        }
        if unpin_cap {
            let units = self.avail.get_mut(&finish_time).unwrap().unpin();
            if units <= 0 && finish_time != first_time {
                self.avail.remove(&finish_time);
            }
        }
        true
    }

    /// Returns the non-overlapping windows of availability between
    /// `start_time` and `finish_time`, sorted by start time. These are not
    /// the scheduling options of a job; see
    /// [`scheduling_options`](Self::scheduling_options) for those.
    pub fn time_slots(&self, start_time: i64, finish_time: i64) -> Vec<TimeSlot> {
        let sub_profile = self.sub_profile(start_time, finish_time);
        compute_time_slots(finish_time, sub_profile)
    }

    /// Returns the scheduling options between `start_time` and
    /// `finish_time`. In contrast to [`time_slots`](Self::time_slots) the
    /// returned slots overlap, as they are candidate placements for jobs.
    /// Slots shorter than `min_duration` or narrower than `min_resources`
    /// are filtered out.
    pub fn scheduling_options(
        &self,
        start_time: i64,
        finish_time: i64,
        min_duration: i64,
        min_resources: u32,
    ) -> Vec<TimeSlot> {
        let mut slots = Vec::new();
        let entries: Vec<(i64, RangeList)> = match self.avail.range(..=start_time).next_back() {
            Some((prec, _)) => self
                .avail
                .range(*prec..)
                .map(|(t, e)| (*t, e.ranges().clone()))
                .collect(),
            None => return slots,
        };

        for (ent_time, ent_ranges) in &entries {
            if *ent_time >= finish_time {
                break;
            }
            if ent_ranges.num_items() == 0 {
                continue;
            }

            let slot_start = (*ent_time).max(start_time);
            let mut current = ent_ranges.clone();

            loop {
                let mut changed = false;
                for (time, ranges) in &entries {
                    if *time <= slot_start {
                        continue;
                    }
                    if *time >= finish_time {
                        break;
                    }
                    let its = current.intersection(ranges);
                    if its.num_items() == current.num_items() {
                        continue;
                    }
                    let slot_end = (*time).min(finish_time);
                    if slot_end - slot_start >= min_duration && current.num_items() >= min_resources {
                        slots.push(TimeSlot::new(slot_start, slot_end, current.clone()));
                    }
                    current = its;
                    changed = true;
                    break;
                }
                if !changed {
                    if finish_time - slot_start >= min_duration
                        && current.num_items() >= min_resources
                        && !current.is_empty()
                    {
                        slots.push(TimeSlot::new(slot_start, finish_time, current.clone()));
                    }
                    break;
                }
                if current.is_empty() {
                    break;
                }
            }
        }
        slots
    }

    /// Returns clones of the profile entries over `[start_time,
    /// finish_time]`. The first returned entry is cut to `start_time`.
    pub fn availability(&self, start_time: i64, finish_time: i64) -> Vec<ProfileEntry> {
        self.sub_profile(start_time, finish_time)
    }

    /// Removes entries that precede the entry at or immediately before
    /// `ref_time`. Useful for keeping long-running simulations lean.
    pub fn remove_past_entries(&mut self, ref_time: i64) {
        if let Some((prec, _)) = self.avail.range(..=ref_time).next_back() {
            let prec = *prec;
            let stale: Vec<i64> = self.avail.range(..prec).map(|(k, _)| *k).collect();
            for key in stale {
                self.avail.remove(&key);
            }
        }
    }

    /// Iterates over the entries of this profile in time order.
    pub fn entries(&self) -> impl Iterator<Item = &ProfileEntry> {
        self.avail.values()
    }

    /// The number of entries currently in the profile.
    pub fn num_entries(&self) -> usize {
        self.avail.len()
    }

    fn sub_profile(&self, start_time: i64, finish_time: i64) -> Vec<ProfileEntry> {
        let mut sub = Vec::new();
        match self.avail.range(..=start_time).next_back() {
            Some((time, entry)) => {
                sub.push(ProfileEntry::new(start_time.max(*time), entry.ranges().clone()));
                for (t, e) in self.avail.range((Excluded(*time), Unbounded)) {
                    if *t > finish_time {
                        break;
                    }
                    sub.push(e.clone_at(*t));
                }
            }
            None => sub.push(ProfileEntry::new(start_time, RangeList::empty())),
        }
        sub
    }
}

/// Extracts the non-overlapping availability windows out of a cloned
/// sub-profile. Consumes the sub-profile: slot ranges are subtracted from
/// the entries they span, so each resource appears in exactly one slot.
pub(crate) fn compute_time_slots(finish_time: i64, mut sub: Vec<ProfileEntry>) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    let size = sub.len();

    for i in 0..size {
        if sub[i].num_resources() == 0 {
            continue;
        }
        let slot_start = sub[i].time();

        while sub[i].num_resources() > 0 {
            let mut slot_ranges = sub[i].ranges().clone();
            let mut its = slot_ranges.clone();
            let mut slot_end = finish_time;
            let mut end_idx = i;

            for j in (i + 1)..size {
                its = its.intersection(sub[j].ranges());
                if its.num_items() == 0 {
                    slot_end = sub[j].time();
                    break;
                }
                slot_ranges = its.clone();
                end_idx = j;
            }

            slots.push(TimeSlot::new(slot_start, slot_end, slot_ranges.clone()));
            for entry in sub.iter_mut().take(end_idx + 1).skip(i) {
                entry.ranges_mut().remove(&slot_ranges);
            }
        }
    }
    slots
}

impl fmt::Display for SingleProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Profile={{")?;
        for entry in self.avail.values() {
            writeln!(f, "  {}", entry)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_profile_is_fully_free() {
        let profile = SingleProfile::new(100);
        let e = profile.check_availability(10, 0, 100, false).unwrap();
        assert_eq!(e.num_resources(), 100);

        let e = profile.availability_at(0);
        assert_eq!(e.num_resources(), 100);
        assert_eq!(e.time(), 0);
    }

    #[test]
    fn allocation_and_find_start_time() {
        let mut profile = SingleProfile::new(100);

        profile.allocate_resource_ranges(&RangeList::span(0, 49), 0, 50);
        assert_eq!(profile.availability_at(0).num_resources(), 50);

        profile.allocate_resource_ranges(&RangeList::span(50, 99), 0, 50);
        assert_eq!(profile.availability_at(0).num_resources(), 0);

        // everything frees up again at t=50
        let e = profile.find_start_time(50, 0, 50).unwrap();
        assert_eq!(e.num_resources(), 100);
        assert_eq!(e.time(), 50);

        // a full-width blockade in the future
        profile.allocate_resource_ranges(&RangeList::span(0, 99), 60, 70);
        assert!(profile.check_availability(100, 50, 50, false).is_none());

        let e = profile.find_start_time(100, 0, 10).unwrap();
        assert_eq!(e.time(), 50);
        let e = profile.find_start_time(100, 0, 50).unwrap();
        assert_eq!(e.time(), 70);
    }

    #[test]
    fn accept_less_returns_partial_window() {
        let mut profile = SingleProfile::new(10);
        profile.allocate_resource_ranges(&RangeList::span(0, 7), 0, 100);
        assert!(profile.check_availability(5, 0, 10, false).is_none());
        let e = profile.check_availability(5, 0, 10, true).unwrap();
        assert_eq!(e.num_resources(), 2);
    }

    #[test]
    fn allocate_release_round_trip() {
        let mut profile = SingleProfile::new(64);
        profile.allocate_resource_ranges(&RangeList::span(0, 15), 10, 90);
        let snapshot = format!("{}", profile);

        let slice = RangeList::span(16, 47);
        profile.allocate_resource_ranges(&slice, 20, 60);
        profile.add_time_slot(20, 60, &slice);

        assert_eq!(format!("{}", profile), snapshot);
    }

    #[test]
    fn release_keeps_entries_pinned_by_others() {
        let mut profile = SingleProfile::new(8);
        // two jobs share the same anchor and cap
        profile.allocate_resource_ranges(&RangeList::span(0, 3), 10, 20);
        profile.allocate_resource_ranges(&RangeList::span(4, 7), 10, 20);

        profile.add_time_slot(10, 20, &RangeList::span(0, 3));
        // the second job still pins both entries
        assert_eq!(profile.availability_at(15).num_resources(), 4);
        assert_eq!(profile.num_entries(), 3);

        profile.add_time_slot(10, 20, &RangeList::span(4, 7));
        assert_eq!(profile.availability_at(15).num_resources(), 8);
        assert_eq!(profile.num_entries(), 1);
    }

    #[test]
    fn free_plus_allocated_is_capacity() {
        let mut profile = SingleProfile::new(32);
        profile.allocate_resource_ranges(&RangeList::span(0, 9), 0, 40);
        profile.allocate_resource_ranges(&RangeList::span(10, 19), 25, 60);

        for t in [0, 10, 30, 45, 70] {
            let free = profile.availability_at(t).num_resources();
            let allocated: u32 = [(0, 40, 10), (25, 60, 10)]
                .iter()
                .filter(|(s, f, _)| *s <= t && t < *f)
                .map(|(_, _, n)| *n)
                .sum();
            assert_eq!(free + allocated, 32, "at time {}", t);
        }
    }

    #[test]
    fn time_slots_do_not_overlap() {
        let mut profile = SingleProfile::new(10);
        profile.allocate_resource_ranges(&RangeList::span(0, 9), 0, 10);
        profile.allocate_resource_ranges(&RangeList::span(0, 4), 10, 20);

        let slots = profile.time_slots(0, 30);
        let total: i64 = slots
            .iter()
            .map(|s| s.duration() * i64::from(s.num_resources()))
            .sum();
        // free area: 5 resources over [10,20) + 10 over [20,30)
        assert_eq!(total, 5 * 10 + 10 * 10);
    }

    #[test]
    fn scheduling_options_overlap() {
        let mut profile = SingleProfile::new(10);
        profile.allocate_resource_ranges(&RangeList::span(0, 4), 10, 20);

        let options = profile.scheduling_options(0, 40, 1, 1);
        assert!(options.len() >= 2);
        assert!(options.iter().any(|s| s.start_time() == 0 && s.finish_time() == 10));
        assert!(options.iter().any(|s| s.num_resources() == 5));
    }

    #[test]
    fn past_entries_are_dropped() {
        let mut profile = SingleProfile::new(4);
        profile.allocate_resource_ranges(&RangeList::span(0, 3), 0, 10);
        profile.allocate_resource_ranges(&RangeList::span(0, 3), 20, 30);
        let before = profile.num_entries();

        profile.remove_past_entries(25);
        assert!(profile.num_entries() < before);
        assert_eq!(profile.availability_at(25).num_resources(), 0);
        assert_eq!(profile.availability_at(30).num_resources(), 4);
    }
}
