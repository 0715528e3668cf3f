use crate::error::FactsError;
use crate::exclusion::{ExclusionPattern, filter};
use crate::machine_id::get_machine_id;
use crate::model::FactMapping;
use crate::source::FactSource;
use crate::HOSTNAME_FACT;
use std::collections::HashSet;
use sysinfo::{Networks, System};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Kernel family name in the form provisioning servers expect ("Linux", "Darwin", ...)
fn kernel_name(os: &str) -> String {
    match os {
        "linux" => "Linux".to_owned(),
        "macos" => "Darwin".to_owned(),
        "windows" => "windows".to_owned(),
        "freebsd" => "FreeBSD".to_owned(),
        other => other.to_owned(),
    }
}

/// Interface names become part of fact names; keep them to `[A-Za-z0-9_]`.
pub fn sanitize_fact_suffix(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Sanitized suffixes for sorted interface names, one per name.
///
/// Names that sanitize alike (`eth-0`, `eth_0`) get `_2`, `_3`, ... in
/// sort order so no interface overwrites another's facts.
pub fn interface_suffixes<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut taken = HashSet::new();
    names
        .iter()
        .map(|name| {
            let base = sanitize_fact_suffix(name.as_ref());
            let mut candidate = base.clone();
            let mut n = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Collects base system facts for the current node
pub struct SystemFactSource {
    system: std::sync::Mutex<System>,
}

impl SystemFactSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new_all()),
        }
    }

    fn add_host_facts(facts: &mut FactMapping) -> Result<(), FactsError> {
        let hostname = hostname::get()
            .map_err(|e| FactsError::SystemCollectionFailed(format!("hostname: {e}")))?
            .to_string_lossy()
            .into_owned();
        facts.insert(HOSTNAME_FACT, hostname);
        facts.insert("uptime_seconds", System::uptime());

        if let Some(machine_id) = get_machine_id() {
            facts.insert("machine_id", machine_id);
        }
        Ok(())
    }

    fn add_os_facts(facts: &mut FactMapping) {
        facts.insert("kernel", kernel_name(std::env::consts::OS));
        facts.insert("architecture", std::env::consts::ARCH);
        if let Some(release) = System::kernel_version() {
            facts.insert("kernelrelease", release);
        }
        if let Some(name) = System::name() {
            facts.insert("operatingsystem", name);
        }
        if let Some(version) = System::os_version() {
            facts.insert("operatingsystemrelease", version);
        }
    }

    fn add_cpu_facts(facts: &mut FactMapping, sys: &System) {
        let cpus = sys.cpus();
        facts.insert("processorcount", cpus.len());
        facts.insert(
            "physicalprocessorcount",
            System::physical_core_count().unwrap_or(cpus.len()),
        );
        for (i, cpu) in cpus.iter().enumerate() {
            facts.insert(format!("processor{i}"), cpu.brand().trim());
        }
    }

    fn add_memory_facts(facts: &mut FactMapping, sys: &System) {
        facts.insert("memorysize_mb", sys.total_memory() / BYTES_PER_MB);
        facts.insert("memoryfree_mb", sys.available_memory() / BYTES_PER_MB);
        facts.insert("swapsize_mb", sys.total_swap() / BYTES_PER_MB);
    }

    fn add_network_facts(facts: &mut FactMapping) {
        match local_ip_address::local_ip() {
            Ok(ip) => {
                facts.insert("ipaddress", ip.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to detect primary IP address");
            }
        }

        let networks = Networks::new_with_refreshed_list();
        let mut names: Vec<&String> = networks.list().keys().collect();
        names.sort();

        let suffixes = interface_suffixes(&names);

        for (name, suffix) in names.iter().zip(&suffixes) {
            let Some(data) = networks.list().get(name.as_str()) else {
                continue;
            };

            let mac = data.mac_address().to_string();
            if mac != "00:00:00:00:00:00" {
                facts.insert(format!("macaddress_{suffix}"), mac);
            }

            if let Some(ip) = data
                .ip_networks()
                .iter()
                .map(|net| net.addr)
                .find(|addr| addr.is_ipv4() && !addr.is_loopback())
            {
                facts.insert(format!("ipaddress_{suffix}"), ip.to_string());
            }
        }

        if !suffixes.is_empty() {
            facts.insert("interfaces", suffixes.join(","));
        }
    }
}

impl FactSource for SystemFactSource {
    fn collect(&self, exclude: Option<&ExclusionPattern>) -> Result<FactMapping, FactsError> {
        let mut facts = FactMapping::new();
        {
            let mut sys = self
                .system
                .lock()
                .map_err(|e| FactsError::SystemCollectionFailed(e.to_string()))?;

            sys.refresh_cpu_all();
            sys.refresh_memory();

            Self::add_cpu_facts(&mut facts, &sys);
            Self::add_memory_facts(&mut facts, &sys);
        }

        Self::add_host_facts(&mut facts)?;
        Self::add_os_facts(&mut facts);
        Self::add_network_facts(&mut facts);

        filter(&mut facts, exclude);
        tracing::debug!(count = facts.len(), "Collected system facts");
        Ok(facts)
    }
}

impl Default for SystemFactSource {
    fn default() -> Self {
        Self::new()
    }
}
