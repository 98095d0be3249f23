pub mod admission;
pub mod image_store;
pub mod job_client;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod poller;
