use std::fmt;

use crate::profile::entry::ProfileEntry;
use crate::profile::range_list::RangeList;
use crate::profile::single::SingleProfile;
use crate::profile::time_slot::TimeSlot;

/// Possible resource statuses, reported to status listeners when pools
/// model resources joining and leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    ShuttingDown,
    Off,
    Booting,
    On,
}

/// A change in the status of part of a pool's resources.
#[derive(Debug, Clone)]
pub struct ResourceStatusEvent {
    pub time: i64,
    pub status: ResourceStatus,
    pub ranges: RangeList,
}

/// Receives resource status changes from a pool.
pub trait ResourceStatusListener {
    fn status_changed(&mut self, event: &ResourceStatusEvent);
}

/// A point in the resource-usage series of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage {
    /// The time from which this usage holds.
    pub time: i64,
    /// The number of resources in use from that time.
    pub used: u32,
}

/// A pool of resources tracked by an availability profile. Schedulers ask
/// the pool for feasibility, allocate and release windows on it, and query
/// utilisation for reporting.
pub trait ResourcePool {
    /// The total number of resources in the pool.
    fn capacity(&self) -> u32;

    /// The resources free at the given time.
    fn availability_at(&self, time: i64) -> ProfileEntry;

    /// Checks whether `num_res` resources are continuously free over
    /// `[start_time, start_time + duration)`.
    fn check_availability(&self, num_res: u32, start_time: i64, duration: i64)
        -> Option<ProfileEntry>;

    /// Like [`check_availability`](Self::check_availability) but returns
    /// whatever is free over the window when fewer than `num_res`
    /// resources survive it.
    fn check_availability_flexible(
        &self,
        num_res: u32,
        start_time: i64,
        duration: i64,
    ) -> Option<ProfileEntry>;

    /// The earliest time at or after `ready_time` at which `num_res`
    /// resources are free for `duration`.
    fn find_start_time(&self, num_res: u32, ready_time: i64, duration: i64)
        -> Option<ProfileEntry>;

    /// Allocates the selected ranges over `[start_time, finish_time)`.
    fn allocate_resources(&mut self, selected: &RangeList, start_time: i64, finish_time: i64);

    /// Returns a previously allocated window to the pool.
    fn release_resources(&mut self, start_time: i64, finish_time: i64, list: &RangeList) -> bool;

    /// The resource utilisation over a period, between `0.0` and `1.0`.
    fn utilization(&self, start_time: i64, end_time: i64) -> f64;

    /// The non-overlapping windows of availability over a period.
    fn time_slots(&self, start_time: i64, finish_time: i64) -> Vec<TimeSlot>;
}

/// The default resource pool: a thin façade over a [`SingleProfile`] with
/// utilisation bookkeeping.
pub struct DefaultResourcePool {
    capacity: u32,
    profile: SingleProfile,
    listeners: Vec<Box<dyn ResourceStatusListener>>,
}

impl DefaultResourcePool {
    /// Creates a new resource pool with the given capacity.
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "Capacity must be > 0");
        Self { capacity, profile: SingleProfile::new(capacity), listeners: Vec::new() }
    }

    /// Registers a resource status listener.
    pub fn add_status_listener(&mut self, listener: Box<dyn ResourceStatusListener>) {
        self.listeners.push(listener);
    }

    /// Notifies the registered listeners of a status change.
    pub fn fire_status_change(&mut self, event: ResourceStatusEvent) {
        for listener in &mut self.listeners {
            listener.status_changed(&event);
        }
    }

    /// The underlying availability profile.
    pub fn profile(&self) -> &SingleProfile {
        &self.profile
    }

    /// The number of resource units (resource x time) free over a window.
    pub fn free_units(&self, start_time: i64, end_time: i64) -> i64 {
        let entries = self.profile.availability(start_time, end_time);
        let mut units = 0;
        for pair in entries.windows(2) {
            let span = pair[1].time().min(end_time) - pair[0].time();
            units += span * i64::from(pair[0].num_resources());
        }
        if let Some(last) = entries.last() {
            units += (end_time - last.time().min(end_time)) * i64::from(last.num_resources());
        }
        units
    }

    /// The number of resource units used over a window.
    pub fn used_units(&self, start_time: i64, end_time: i64) -> i64 {
        i64::from(self.capacity) * (end_time - start_time) - self.free_units(start_time, end_time)
    }

    /// The changes in resource usage over a window, one record per profile
    /// entry.
    pub fn peak_resource_usage(&self, start_time: i64, finish_time: i64) -> Vec<ResourceUsage> {
        self.profile
            .availability(start_time, finish_time)
            .iter()
            .map(|e| ResourceUsage { time: e.time(), used: self.capacity - e.num_resources() })
            .collect()
    }
}

impl ResourcePool for DefaultResourcePool {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn availability_at(&self, time: i64) -> ProfileEntry {
        self.profile.availability_at(time)
    }

    fn check_availability(
        &self,
        num_res: u32,
        start_time: i64,
        duration: i64,
    ) -> Option<ProfileEntry> {
        self.profile.check_availability(num_res, start_time, duration, false)
    }

    fn check_availability_flexible(
        &self,
        num_res: u32,
        start_time: i64,
        duration: i64,
    ) -> Option<ProfileEntry> {
        self.profile.check_availability(num_res, start_time, duration, true)
    }

    fn find_start_time(
        &self,
        num_res: u32,
        ready_time: i64,
        duration: i64,
    ) -> Option<ProfileEntry> {
        self.profile.find_start_time(num_res, ready_time, duration)
    }

    fn allocate_resources(&mut self, selected: &RangeList, start_time: i64, finish_time: i64) {
        self.profile.allocate_resource_ranges(selected, start_time, finish_time);
    }

    fn release_resources(&mut self, start_time: i64, finish_time: i64, list: &RangeList) -> bool {
        self.profile.add_time_slot(start_time, finish_time, list)
    }

    fn utilization(&self, start_time: i64, end_time: i64) -> f64 {
        let total_units = i64::from(self.capacity) * (end_time - start_time);
        if total_units <= 0 {
            return 0.0;
        }
        let used_units = self.used_units(start_time, end_time);
        used_units as f64 / total_units as f64
    }

    fn time_slots(&self, start_time: i64, finish_time: i64) -> Vec<TimeSlot> {
        self.profile.time_slots(start_time, finish_time)
    }
}

impl fmt::Display for DefaultResourcePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourcePool{{capacity={}, profile={}}}", self.capacity, self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_of_a_packed_window() {
        let mut pool = DefaultResourcePool::new(10);
        pool.allocate_resources(&RangeList::span(0, 9), 0, 100);
        assert!((pool.utilization(0, 100) - 1.0).abs() < f64::EPSILON);
        assert!((pool.utilization(100, 200) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_utilization() {
        let mut pool = DefaultResourcePool::new(10);
        pool.allocate_resources(&RangeList::span(0, 4), 0, 50);
        // 5 resources over half the window: 25% of the units
        assert!((pool.utilization(0, 100) - 0.25).abs() < 1e-9);
        assert_eq!(pool.free_units(0, 100), 750);
        assert_eq!(pool.used_units(0, 100), 250);
    }

    #[test]
    fn peak_usage_series() {
        let mut pool = DefaultResourcePool::new(8);
        pool.allocate_resources(&RangeList::span(0, 3), 10, 20);
        let usage = pool.peak_resource_usage(0, 30);
        assert!(usage.contains(&ResourceUsage { time: 10, used: 4 }));
        assert!(usage.contains(&ResourceUsage { time: 20, used: 0 }));
    }
}
