use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};

use crate::job::WorkUnit;
use crate::profile::entry::ProfileEntry;
use crate::profile::range_list::RangeList;
use crate::profile::single::compute_time_slots;
use crate::profile::time_slot::TimeSlot;

/// Decides which work units may be scheduled in a given partition.
pub trait PartitionPredicate {
    /// Checks whether the work unit meets the criteria of the partition.
    fn matches(&self, unit: &dyn WorkUnit) -> bool;
}

impl<F> PartitionPredicate for F
where
    F: Fn(&dyn WorkUnit) -> bool,
{
    fn matches(&self, unit: &dyn WorkUnit) -> bool {
        self(unit)
    }
}

/// A resource partition of a multi-partition availability profile.
pub struct ResourcePartition {
    partition_id: usize,
    initial_resources: u32,
    predicate: Box<dyn PartitionPredicate>,
}

impl ResourcePartition {
    /// Creates a partition holding `initial_resources` resources whose
    /// jobs are selected by `predicate`.
    pub fn new(
        partition_id: usize,
        initial_resources: u32,
        predicate: Box<dyn PartitionPredicate>,
    ) -> Self {
        Self { partition_id, initial_resources, predicate }
    }

    pub fn partition_id(&self) -> usize {
        self.partition_id
    }

    pub fn initial_resources(&self) -> u32 {
        self.initial_resources
    }

    pub fn predicate(&self) -> &dyn PartitionPredicate {
        self.predicate.as_ref()
    }
}

impl fmt::Debug for ResourcePartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePartition")
            .field("partition_id", &self.partition_id)
            .field("initial_resources", &self.initial_resources)
            .finish()
    }
}

/// An entry of the partitioned profile: one free range set per partition,
/// plus the count of work units pinning the entry.
#[derive(Debug, Clone)]
struct PartEntry {
    units: i32,
    parts: Vec<RangeList>,
}

impl PartEntry {
    fn new(parts: Vec<RangeList>) -> Self {
        Self { units: 1, parts }
    }

    fn num_resources(&self) -> u32 {
        self.parts.iter().map(RangeList::num_items).sum()
    }

    fn total_ranges(&self) -> RangeList {
        let mut all = RangeList::empty();
        for p in &self.parts {
            all.add_all(p);
        }
        all
    }

    /// Takes the listed resources away from every partition and hands them,
    /// free, to `part`.
    fn release_to_partition(&mut self, part: usize, list: &RangeList) {
        for p in &mut self.parts {
            p.remove(list);
        }
        self.parts[part].add_all(list);
    }
}

/// An availability profile that tracks free resources across multiple
/// resource partitions. Each partition serves the work units accepted by
/// its predicate; the union of the partitions' free sets is the pool-wide
/// free set.
pub struct PartProfile {
    avail: BTreeMap<i64, PartEntry>,
    partitions: Vec<ResourcePartition>,
}

impl PartProfile {
    /// Creates a partitioned profile. Partitions receive contiguous,
    /// consecutive initial ranges in the order given; partition ids must
    /// be the indices `0..partitions.len()`.
    pub fn new(partitions: Vec<ResourcePartition>) -> Self {
        assert!(!partitions.is_empty(), "At least one partition is required");
        let mut parts = vec![RangeList::empty(); partitions.len()];
        let mut first = 0u32;
        for partition in &partitions {
            let id = partition.partition_id();
            assert!(id < partitions.len(), "Partition id {} out of bounds", id);
            let last = first + partition.initial_resources() - 1;
            parts[id] = RangeList::span(first, last);
            first = last + 1;
        }
        let mut avail = BTreeMap::new();
        avail.insert(0, PartEntry::new(parts));
        Self { avail, partitions }
    }

    /// The number of partitions in this profile.
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    /// Returns the id of the partition whose predicate matches the given
    /// work unit, or `None` if no partition can handle it.
    pub fn match_partition(&self, unit: &dyn WorkUnit) -> Option<usize> {
        self.partitions
            .iter()
            .find(|p| p.predicate().matches(unit))
            .map(|p| p.partition_id())
    }

    /// Returns the resources of a partition free at the given time. The
    /// profile is not scanned forward; only the instant is inspected.
    pub fn part_availability_at(&self, part: usize, time: i64) -> ProfileEntry {
        self.check_part(part);
        match self.avail.range(..=time).next_back() {
            Some((_, entry)) => ProfileEntry::new(time, entry.parts[part].clone()),
            None => ProfileEntry::new(time, RangeList::empty()),
        }
    }

    /// Intersects a partition's free ranges over the window
    /// `[start_time, start_time + duration)`. The returned entry may hold
    /// an empty range set if the partition has nothing free throughout.
    pub fn check_part_availability(
        &self,
        part: usize,
        start_time: i64,
        duration: i64,
    ) -> ProfileEntry {
        self.check_part(part);
        let (prec_time, prec) = match self.avail.range(..=start_time).next_back() {
            Some(found) => found,
            None => return ProfileEntry::new(start_time, RangeList::empty()),
        };
        let mut intersec = prec.parts[part].clone();
        let finish_time = start_time + duration;

        for (time, entry) in self.avail.range((Excluded(*prec_time), Unbounded)) {
            if *time >= finish_time || intersec.num_items() == 0 {
                break;
            }
            intersec = intersec.intersection(&entry.parts[part]);
        }
        ProfileEntry::new(start_time, intersec)
    }

    /// Finds the earliest time at or after `ready_time` at which the
    /// partition can serve `req_res` resources continuously for `duration`.
    pub fn find_part_start_time(
        &self,
        part: usize,
        req_res: u32,
        ready_time: i64,
        duration: i64,
    ) -> Option<ProfileEntry> {
        self.check_part(part);
        let anchor_from = *self.avail.range(..=ready_time).next_back()?.0;

        for (anchor_time, anchor) in self.avail.range(anchor_from..) {
            if anchor.parts[part].num_items() < req_res {
                continue;
            }

            let pot_start = ready_time.max(*anchor_time);
            let pot_finish = pot_start + duration;
            let mut intersect = anchor.parts[part].clone();
            let mut feasible = true;

            for (time, entry) in self.avail.range((Excluded(pot_start), Unbounded)) {
                if *time >= pot_finish {
                    break;
                }
                if entry.parts[part].num_items() < req_res {
                    feasible = false;
                    break;
                }
                intersect = intersect.intersection(&entry.parts[part]);
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

    /// Allocates the selected ranges from a partition over
    /// `[start_time, finish_time)`, pinning anchor and cap entries.
    pub fn allocate_part_resource_ranges(
        &mut self,
        part: usize,
        selected: &RangeList,
        start_time: i64,
        finish_time: i64,
    ) {
        self.check_part(part);
        assert!(
            finish_time >= start_time,
            "Allocation window [{}, {}) is inverted",
            start_time,
            finish_time
        );

        let prec_time = *self
            .avail
            .range(..=start_time)
            .next_back()
            .expect("Profile has no entry at or before the allocation start")
            .0;

        if prec_time == start_time {
            self.avail.get_mut(&start_time).unwrap().units += 1;
        } else {
            let mut anchor = self.avail[&prec_time].clone();
            anchor.units = 1;
            self.avail.insert(start_time, anchor);
        }

        let touched: Vec<i64> = self.avail.range(start_time..finish_time).map(|(k, _)| *k).collect();

        if let Some(cap) = self.avail.get_mut(&finish_time) {
            cap.units += 1;
        } else {
            let last_key = *touched.last().unwrap();
            let mut cap = self.avail[&last_key].clone();
            cap.units = 1;
            self.avail.insert(finish_time, cap);
        }

        for key in touched {
            self.avail.get_mut(&key).unwrap().parts[part].remove(selected);
        }
    }

    /// Returns a time slot to a partition: the resources become free in
    /// `part` over `[start_time, finish_time)` regardless of which
    /// partition previously held them. Anchor and cap entries are unpinned
    /// and dropped at zero, except the entry at time `0`.
    pub fn add_part_time_slot(
        &mut self,
        part: usize,
        start_time: i64,
        finish_time: i64,
        list: &RangeList,
    ) -> bool {
        self.check_part(part);
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
            let mut anchor = self.avail[&prec_time].clone();
            anchor.units = 1;
            self.avail.insert(start_time, anchor);
        }

        let touched: Vec<i64> = self.avail.range(start_time..finish_time).map(|(k, _)| *k).collect();

        let mut unpin_cap = false;
        if self.avail.contains_key(&finish_time) {
            unpin_cap = true;
        } else {
            let last_key = *touched.last().unwrap();
            let mut cap = self.avail[&last_key].clone();
            cap.units = 1;
            self.avail.insert(finish_time, cap);
        }

        for key in touched {
            self.avail.get_mut(&key).unwrap().release_to_partition(part, list);
        }

        if unpin_anchor {
            let entry = self.avail.get_mut(&start_time).unwrap();
            entry.units -= 1;
            if entry.units <= 0 && start_time != first_time {
                self.avail.remove(&start_time);
            }
        }
        if unpin_cap {
            let entry = self.avail.get_mut(&finish_time).unwrap();
            entry.units -= 1;
            if entry.units <= 0 && finish_time != first_time {
                self.avail.remove(&finish_time);
            }
        }
        true
    }

    /// The non-overlapping windows of availability of one partition.
    pub fn part_time_slots(&self, part: usize, start_time: i64, finish_time: i64) -> Vec<TimeSlot> {
        let sub = self.part_sub_profile(part, start_time, finish_time);
        compute_time_slots(finish_time, sub)
    }

    /// The overlapping scheduling options of one partition; slots shorter
    /// than `min_duration` or narrower than `min_resources` are dropped.
    pub fn part_scheduling_options(
        &self,
        part: usize,
        start_time: i64,
        finish_time: i64,
        min_duration: i64,
        min_resources: u32,
    ) -> Vec<TimeSlot> {
        self.check_part(part);
        let mut slots = Vec::new();
        let entries: Vec<(i64, RangeList)> = match self.avail.range(..=start_time).next_back() {
            Some((prec, _)) => self
                .avail
                .range(*prec..)
                .map(|(t, e)| (*t, e.parts[part].clone()))
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

    /// The pool-wide free ranges (union of all partitions) at `time`.
    pub fn availability_at(&self, time: i64) -> ProfileEntry {
        match self.avail.range(..=time).next_back() {
            Some((_, entry)) => ProfileEntry::new(time, entry.total_ranges()),
            None => ProfileEntry::new(time, RangeList::empty()),
        }
    }

    /// Removes entries that precede the entry at or immediately before
    /// `ref_time`.
    pub fn remove_past_entries(&mut self, ref_time: i64) {
        if let Some((prec, _)) = self.avail.range(..=ref_time).next_back() {
            let prec = *prec;
            let stale: Vec<i64> = self.avail.range(..prec).map(|(k, _)| *k).collect();
            for key in stale {
                self.avail.remove(&key);
            }
        }
    }

    fn part_sub_profile(&self, part: usize, start_time: i64, finish_time: i64) -> Vec<ProfileEntry> {
        self.check_part(part);
        let mut sub = Vec::new();
        match self.avail.range(..=start_time).next_back() {
            Some((time, entry)) => {
                sub.push(ProfileEntry::new(start_time.max(*time), entry.parts[part].clone()));
                for (t, e) in self.avail.range((Excluded(*time), Unbounded)) {
                    if *t > finish_time {
                        break;
                    }
                    sub.push(ProfileEntry::new(*t, e.parts[part].clone()));
                }
            }
            None => sub.push(ProfileEntry::new(start_time, RangeList::empty())),
        }
        sub
    }

    fn check_part(&self, part: usize) {
        assert!(part < self.partitions.len(), "Partition {} does not exist", part);
    }
}

impl fmt::Debug for PartProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartProfile")
            .field("partitions", &self.partitions)
            .field("entries", &self.avail.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::job::Job;

    fn two_partition_profile() -> PartProfile {
        PartProfile::new(vec![
            ResourcePartition::new(
                0,
                6,
                Box::new(|u: &dyn WorkUnit| u.num_resources() <= 2),
            ),
            ResourcePartition::new(
                1,
                10,
                Box::new(|u: &dyn WorkUnit| u.num_resources() > 2),
            ),
        ])
    }

    #[test]
    fn initial_layout_and_matching() {
        let profile = two_partition_profile();
        assert_eq!(profile.part_availability_at(0, 0).ranges().to_string(), "{[0..5]}");
        assert_eq!(profile.part_availability_at(1, 0).ranges().to_string(), "{[6..15]}");
        assert_eq!(profile.availability_at(0).num_resources(), 16);

        let narrow = Job::new(1, 10, 2);
        let wide = Job::new(2, 10, 8);
        assert_eq!(profile.match_partition(&narrow), Some(0));
        assert_eq!(profile.match_partition(&wide), Some(1));
    }

    #[test]
    fn partition_allocation_is_isolated() {
        let mut profile = two_partition_profile();
        let selected = profile
            .find_part_start_time(1, 4, 0, 50)
            .unwrap()
            .ranges()
            .select_resources(4)
            .unwrap();
        profile.allocate_part_resource_ranges(1, &selected, 0, 50);

        assert_eq!(profile.part_availability_at(1, 10).num_resources(), 6);
        assert_eq!(profile.part_availability_at(0, 10).num_resources(), 6);
        assert_eq!(profile.availability_at(10).num_resources(), 12);

        // window queries see the allocation end
        let e = profile.find_part_start_time(1, 10, 0, 10).unwrap();
        assert_eq!(e.time(), 50);
    }

    #[test]
    fn part_release_round_trip() {
        let mut profile = two_partition_profile();
        let slice = RangeList::span(6, 9);
        profile.allocate_part_resource_ranges(1, &slice, 20, 60);
        profile.add_part_time_slot(1, 20, 60, &slice);

        assert_eq!(profile.part_availability_at(1, 30).num_resources(), 10);
        assert_eq!(profile.avail.len(), 1);
    }

    #[test]
    fn totals_stay_consistent_with_partitions() {
        let mut profile = two_partition_profile();
        profile.allocate_part_resource_ranges(0, &RangeList::span(0, 1), 0, 100);
        profile.allocate_part_resource_ranges(1, &RangeList::span(6, 15), 30, 80);

        for t in [0, 30, 79, 100] {
            let total = profile.availability_at(t).num_resources();
            let per_part: u32 = (0..profile.num_partitions())
                .map(|p| profile.part_availability_at(p, t).num_resources())
                .sum();
            assert_eq!(total, per_part, "at time {}", t);
        }
    }

    #[test]
    fn part_time_slots_cover_free_area() {
        let mut profile = two_partition_profile();
        profile.allocate_part_resource_ranges(0, &RangeList::span(0, 5), 0, 10);

        let slots = profile.part_time_slots(0, 0, 20);
        let area: i64 = slots.iter().map(|s| s.duration() * i64::from(s.num_resources())).sum();
        assert_eq!(area, 6 * 10);
    }
}
