use crate::error::FactsError;
use crate::exclusion::{ExclusionPattern, filter};
use crate::model::FactMapping;
use crate::source::FactSource;
use std::path::{Path, PathBuf};
use sysinfo::{Disks, System};

/// Prefix shared by every supplemental hardware fact
pub const HARDWARE_FACT_PREFIX: &str = "mk_hw_";

/// Default location of DMI attributes on Linux
const DMI_ROOT: &str = "/sys/class/dmi/id";

/// DMI attributes reported as facts (file name under the DMI root)
const DMI_ATTRIBUTES: &[&str] = &[
    "bios_vendor",
    "bios_version",
    "bios_date",
    "sys_vendor",
    "product_name",
    "product_version",
    "product_serial",
    "product_uuid",
    "board_vendor",
    "board_name",
    "board_serial",
    "chassis_type",
];

fn hw_fact(name: &str) -> String {
    format!("{HARDWARE_FACT_PREFIX}{name}")
}

/// Collects supplemental hardware facts for the current node.
///
/// Everything here is read from firmware tables, block device listings and
/// the PCI bus, so values change only when the hardware does.
pub struct HardwareFactSource {
    dmi_root: PathBuf,
}

impl HardwareFactSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dmi_root: PathBuf::from(DMI_ROOT),
        }
    }

    /// Read DMI attributes from a different directory
    #[must_use]
    pub fn with_dmi_root(dmi_root: impl Into<PathBuf>) -> Self {
        Self {
            dmi_root: dmi_root.into(),
        }
    }

    fn add_cpu_and_memory_facts(facts: &mut FactMapping) {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        sys.refresh_memory();

        let cpus = sys.cpus();
        facts.insert(hw_fact("cpu_count"), cpus.len());
        if let Some(cpu) = cpus.first() {
            facts.insert(hw_fact("cpu_model"), cpu.brand().trim());
            facts.insert(hw_fact("cpu_vendor"), cpu.vendor_id().trim());
        }
        facts.insert(hw_fact("mem_total_bytes"), sys.total_memory());
    }

    fn add_disk_facts(facts: &mut FactMapping) {
        let disks = Disks::new_with_refreshed_list();
        let mut list: Vec<_> = disks.list().iter().collect();
        list.sort_by(|a, b| a.mount_point().cmp(b.mount_point()));

        facts.insert(hw_fact("disk_count"), list.len());
        for (i, disk) in list.iter().enumerate() {
            facts.insert(
                hw_fact(&format!("disk{i}_name")),
                disk.name().to_string_lossy().into_owned(),
            );
            facts.insert(
                hw_fact(&format!("disk{i}_mount")),
                disk.mount_point().to_string_lossy().into_owned(),
            );
            facts.insert(
                hw_fact(&format!("disk{i}_fs")),
                disk.file_system().to_string_lossy().into_owned(),
            );
            facts.insert(hw_fact(&format!("disk{i}_size_bytes")), disk.total_space());
            facts.insert(hw_fact(&format!("disk{i}_removable")), disk.is_removable());
        }
    }

    /// Read DMI attributes; unreadable ones (often serials without root) are skipped
    fn add_dmi_facts(facts: &mut FactMapping, dmi_root: &Path) {
        if !dmi_root.is_dir() {
            tracing::debug!(path = %dmi_root.display(), "DMI attributes not available");
            return;
        }

        for attribute in DMI_ATTRIBUTES {
            let path = dmi_root.join(attribute);
            match std::fs::read_to_string(&path) {
                Ok(value) => {
                    let value = value.trim();
                    if !value.is_empty() {
                        facts.insert(hw_fact(attribute), value);
                    }
                }
                Err(e) => {
                    tracing::trace!(path = %path.display(), error = %e, "Skipping DMI attribute");
                }
            }
        }
    }

    fn add_gpu_facts(facts: &mut FactMapping) {
        #[cfg(target_os = "linux")]
        let models = super::gpu_collector_linux::collect_gpu_models();
        #[cfg(not(target_os = "linux"))]
        let models: Vec<String> = Vec::new();

        facts.insert(hw_fact("gpu_count"), models.len());
        for (i, model) in models.into_iter().enumerate() {
            facts.insert(hw_fact(&format!("gpu{i}_model")), model);
        }
    }
}

impl FactSource for HardwareFactSource {
    fn collect(&self, exclude: Option<&ExclusionPattern>) -> Result<FactMapping, FactsError> {
        let mut facts = FactMapping::new();

        Self::add_cpu_and_memory_facts(&mut facts);
        Self::add_disk_facts(&mut facts);
        Self::add_dmi_facts(&mut facts, &self.dmi_root);
        Self::add_gpu_facts(&mut facts);

        filter(&mut facts, exclude);
        tracing::debug!(count = facts.len(), "Collected hardware facts");
        Ok(facts)
    }
}

impl Default for HardwareFactSource {
    fn default() -> Self {
        Self::new()
    }
}
