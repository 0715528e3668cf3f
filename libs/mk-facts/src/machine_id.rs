/// Get the permanent machine identifier of this host.
///
/// Platform-specific sources:
/// - Linux: /etc/machine-id or /var/lib/dbus/machine-id
/// - macOS: `IOPlatformUUID` from `IOKit`
/// - Windows: `MachineGuid` from the registry
///
/// Returns `None` when the platform exposes no identifier; the agent then
/// simply omits the `machine_id` fact.
#[must_use]
pub fn get_machine_id() -> Option<String> {
    match machine_uid::get() {
        Ok(machine_id) => {
            let trimmed = machine_id.trim();
            if trimmed.is_empty() {
                tracing::warn!("Machine ID is empty, omitting machine_id fact");
                return None;
            }
            tracing::debug!(machine_id = %trimmed, "Using machine ID");
            Some(trimmed.to_owned())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read machine ID, omitting machine_id fact");
            None
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_machine_id_is_consistent() {
        assert_eq!(get_machine_id(), get_machine_id());
    }

    #[test]
    fn test_machine_id_is_trimmed() {
        if let Some(id) = get_machine_id() {
            assert_eq!(id, id.trim());
            assert!(!id.is_empty());
        }
    }
}
