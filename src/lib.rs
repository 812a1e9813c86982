//! clustersim is a discrete-event simulator for parallel job scheduling
//! on clusters. A virtual clock drives a time-ordered event queue; events
//! are delivered to registered entities such as servers, users and
//! workload readers. Servers schedule jobs over a time-indexed
//! availability profile of resource ranges, with policies ranging from
//! FCFS through EASY and conservative backfilling to preemptive priority
//! scheduling and advance reservations.
//!
//! Driver programs construct a [`Simulation`](kernel::Simulation),
//! register their entities and call `run`:
//!
//! ```no_run
//! use clustersim::kernel::Simulation;
//! use clustersim::scheduler::ConsBackfillScheduler;
//! use clustersim::server::Server;
//! use clustersim::workload::SwfWorkloadReader;
//!
//! let mut sim = Simulation::new();
//! let server = sim.register_entity(Box::new(
//!     Server::builder()
//!         .name("cluster")
//!         .scheduler(Box::new(ConsBackfillScheduler::new()))
//!         .capacity(128)
//!         .build(),
//! ));
//! sim.register_entity(Box::new(SwfWorkloadReader::new("trace.swf", server)));
//! sim.run().unwrap();
//! ```

pub mod error;
pub mod job;
pub mod kernel;
pub mod logger;
pub mod predicate;
pub mod profile;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod workload;

pub use error::{Error, Result};
