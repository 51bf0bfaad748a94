//! Inspect command implementation.

use super::{CliError, CliResult};
use place_storage::{FilePlacementStore, Placement, PlacementStore, LOG_FILE};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Placement log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Log file size in bytes.
    pub log_size: u64,
    /// Number of placements in the log.
    pub placements: usize,
    /// Placements written by clears.
    pub system_placements: usize,
    /// Coordinates whose latest placement is by a user.
    pub painted_pixels: usize,
    /// Distinct painters.
    pub painters: usize,
    /// Oldest timestamp, seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_placement: Option<f64>,
    /// Newest timestamp, seconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_placement: Option<f64>,
    /// Most active painters, busiest first.
    pub top_painters: Vec<PainterStats>,
}

/// Placement count of one painter.
#[derive(Debug, Serialize, PartialEq)]
pub struct PainterStats {
    /// Display name.
    pub name: String,
    /// Placements in the log.
    pub placements: usize,
}

/// Runs the inspect command.
pub fn run(data_dir: &Path, top: usize, format: &str) -> CliResult<()> {
    let log_path = data_dir.join(LOG_FILE);
    if !log_path.exists() {
        return Err(CliError::Usage(format!(
            "No placement log found at {}",
            data_dir.display()
        )));
    }

    let store = FilePlacementStore::open(data_dir)?;
    let mut result = summarize(&store.placements(), &store.latest_per_coordinate()?, top);
    result.path = data_dir.display().to_string();
    result.log_size = std::fs::metadata(&log_path)?.len();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn summarize(history: &[Placement], latest: &[Placement], top: usize) -> InspectResult {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut system_placements = 0;
    for placement in history {
        if placement.is_system() {
            system_placements += 1;
        } else {
            *counts.entry(placement.user.as_str()).or_insert(0) += 1;
        }
    }

    let mut top_painters: Vec<PainterStats> = counts
        .iter()
        .map(|(name, placements)| PainterStats {
            name: (*name).to_string(),
            placements: *placements,
        })
        .collect();
    top_painters.sort_by(|a, b| b.placements.cmp(&a.placements).then(a.name.cmp(&b.name)));
    top_painters.truncate(top);

    InspectResult {
        path: String::new(),
        log_size: 0,
        placements: history.len(),
        system_placements,
        painted_pixels: latest.iter().filter(|p| !p.is_system()).count(),
        painters: counts.len(),
        first_placement: history.iter().map(|p| p.timestamp).reduce(f64::min),
        last_placement: history.iter().map(|p| p.timestamp).reduce(f64::max),
        top_painters,
    }
}

fn print_text_output(result: &InspectResult) {
    println!("Placement Log Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {}", format_size(result.log_size));
    println!();
    println!("Placements:");
    println!("  Total:          {}", result.placements);
    println!("  From clears:    {}", result.system_placements);
    println!("  Painted pixels: {}", result.painted_pixels);
    println!("  Painters:       {}", result.painters);
    if let (Some(first), Some(last)) = (result.first_placement, result.last_placement) {
        println!("  Time span:      {first:.0} .. {last:.0}");
    }

    if !result.top_painters.is_empty() {
        println!();
        println!("Top painters:");
        for painter in &result.top_painters {
            println!("  {:<20} {}", painter.name, painter.placements);
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts() {
        let history = vec![
            Placement::at(10.0, "alice", 0, 0, 1),
            Placement::at(11.0, "bob", 1, 0, 2),
            Placement::at(12.0, "alice", 2, 0, 3),
            Placement::at(13.0, "", 0, 0, 0),
        ];
        let latest = vec![
            Placement::at(13.0, "", 0, 0, 0),
            Placement::at(11.0, "bob", 1, 0, 2),
            Placement::at(12.0, "alice", 2, 0, 3),
        ];

        let result = summarize(&history, &latest, 1);
        assert_eq!(result.placements, 4);
        assert_eq!(result.system_placements, 1);
        assert_eq!(result.painted_pixels, 2);
        assert_eq!(result.painters, 2);
        assert_eq!(result.first_placement, Some(10.0));
        assert_eq!(result.last_placement, Some(13.0));
        assert_eq!(
            result.top_painters,
            vec![PainterStats {
                name: "alice".into(),
                placements: 2
            }]
        );
    }

    #[test]
    fn empty_summary() {
        let result = summarize(&[], &[], 10);
        assert_eq!(result.placements, 0);
        assert!(result.first_placement.is_none());
        assert!(result.top_painters.is_empty());
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
