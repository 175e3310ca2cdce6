// Repository layer for database operations

pub mod device;
pub mod tracked_queue;

pub use device::DeviceRepository;
pub use tracked_queue::TrackedQueueRepository;
