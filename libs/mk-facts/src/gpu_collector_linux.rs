use std::process::Command;

/// Collect GPU model names on Linux via `lspci`
///
/// Returns an empty list when `lspci` is missing or fails; GPUs are optional
/// facts and their absence is not an error.
pub fn collect_gpu_models() -> Vec<String> {
    let output = match Command::new("lspci").output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!(status = %output.status, "lspci exited unsuccessfully");
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!(error = %e, "lspci not available, skipping GPU facts");
            return Vec::new();
        }
    };

    let models = parse_lspci_gpus(&String::from_utf8_lossy(&output.stdout));
    if !models.is_empty() {
        tracing::debug!("Found {} GPU(s) via lspci", models.len());
    }
    models
}

/// Extract display controller models from `lspci` output.
///
/// Line format: `00:02.0 VGA compatible controller: Intel Corporation ...`
pub fn parse_lspci_gpus(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("vga") || lower.contains("3d controller") || lower.contains("display")
        })
        .filter_map(|line| {
            // Skip the slot ("00:02.0 "), then take everything after the class separator
            let (_, rest) = line.split_once(' ')?;
            let (_, model) = rest.split_once(": ")?;
            let model = model.trim();
            (!model.is_empty()).then(|| model.to_owned())
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lspci_gpus() {
        let output = "\
00:00.0 Host bridge: Intel Corporation 8th Gen Core Processor Host Bridge
00:02.0 VGA compatible controller: Intel Corporation UHD Graphics 630
01:00.0 3D controller: NVIDIA Corporation GP107M [GeForce GTX 1050 Mobile] (rev a1)
02:00.0 Network controller: Intel Corporation Wireless-AC 9560
";
        assert_eq!(
            parse_lspci_gpus(output),
            vec![
                "Intel Corporation UHD Graphics 630".to_owned(),
                "NVIDIA Corporation GP107M [GeForce GTX 1050 Mobile] (rev a1)".to_owned(),
            ]
        );
    }

    #[test]
    fn test_parse_lspci_without_gpus() {
        assert!(parse_lspci_gpus("00:1f.3 Audio device: Intel Corporation").is_empty());
        assert!(parse_lspci_gpus("").is_empty());
    }
}
