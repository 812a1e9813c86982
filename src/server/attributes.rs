use crate::server::availability::ServerAvailability;
use crate::server::pool::ResourcePool;

/// The attributes of a server: the pool of resources it schedules and the
/// availability information that modulates the pool over time.
pub struct ServerAttributes {
    resources: Box<dyn ResourcePool>,
    availability: Box<dyn ServerAvailability>,
}

impl ServerAttributes {
    /// Creates a new server attribute object.
    pub fn new(resources: Box<dyn ResourcePool>, availability: Box<dyn ServerAvailability>) -> Self {
        Self { resources, availability }
    }

    /// The resource pool.
    pub fn resource_pool(&self) -> &dyn ResourcePool {
        self.resources.as_ref()
    }

    pub fn resource_pool_mut(&mut self) -> &mut dyn ResourcePool {
        self.resources.as_mut()
    }

    /// The resource availability information.
    pub fn resource_availability(&self) -> &dyn ServerAvailability {
        self.availability.as_ref()
    }

    /// Replaces the resource availability information.
    pub fn set_resource_availability(&mut self, availability: Box<dyn ServerAvailability>) {
        self.availability = availability;
    }
}
