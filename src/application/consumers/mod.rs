//! Queue consumers of the pipeline.
//!
//! Each consumer is a [`MessageHandler`] driven by [`run_consumer`], which
//! takes one message at a time and settles it according to the returned
//! [`Disposition`]:
//!
//! | Handler | Queue | Requeues on |
//! |---|---|---|
//! | [`CachePopulator`] | `mapping-created` | cache write failure |
//! | [`ClickAggregator`] | `click-recorded` | store failure |
//! | [`DeletionPropagator`] | `mapping-deleted` | cache evict failure |
//!
//! Malformed payloads are always discarded.

pub mod cache_populator;
pub mod click_aggregator;
pub mod deletion_propagator;
pub mod runner;

pub use cache_populator::CachePopulator;
pub use click_aggregator::{ClickAggregator, ClickOutcome};
pub use deletion_propagator::DeletionPropagator;
pub use runner::{ConsumerSettings, Disposition, MessageHandler, process_next, run_consumer};
