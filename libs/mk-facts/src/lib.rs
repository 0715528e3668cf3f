#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Node Fact Library
//!
//! This library collects "facts" about the node where the agent runs and
//! exposes them as a flat name-to-value mapping. It provides:
//! - Base system facts (OS, kernel, CPU, memory, network interfaces, host)
//! - Supplemental hardware facts (DMI, block devices, GPUs)
//! - An exclusion pattern that filters fact names out of every source
//!
//! Collection is synchronous and may touch slow OS subsystems; async callers
//! should run it on a blocking thread.

mod exclusion;
mod hardware_collector;
mod machine_id;
mod source;
mod system_collector;

#[cfg(target_os = "linux")]
mod gpu_collector_linux;

pub mod error;
pub mod model;

pub use error::FactsError;
pub use exclusion::ExclusionPattern;
pub use hardware_collector::HardwareFactSource;
pub use machine_id::get_machine_id;
pub use model::{FactMapping, FactValue};
pub use source::{FactSource, MergedFactSource, StaticFactSource};
pub use system_collector::SystemFactSource;

/// Name of the fact every source is expected to provide.
pub const HOSTNAME_FACT: &str = "hostname";

/// Create the default fact source for the current machine: base system facts
/// merged with supplemental hardware facts.
#[must_use]
pub fn default_fact_source() -> MergedFactSource {
    MergedFactSource::new(
        Box::new(SystemFactSource::new()),
        Box::new(HardwareFactSource::new()),
    )
}
