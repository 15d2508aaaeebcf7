//! `nbconsole scaffold` command - writes a boilerplate TUI panel module

use std::fs;
use std::path::{Path, PathBuf};

const PANEL_TEMPLATE: &str = include_str!("../../templates/panel.rs.tmpl");

/// Names derived from what the user typed
#[derive(Debug, PartialEq, Eq)]
pub struct PanelNames {
    /// `StorageUsage`
    pub type_name: String,
    /// `storage_usage`
    pub module_name: String,
    /// `Storage Usage`
    pub title: String,
}

impl PanelNames {
    /// Split on case changes, `-`, `_` and spaces. Accepts `storage-usage`,
    /// `StorageUsage`, `storage usage` alike.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let words = split_words(raw);
        if words.is_empty() {
            return Err("Panel name must contain at least one letter".to_string());
        }
        if words[0].starts_with(|c: char| c.is_ascii_digit()) {
            return Err(format!("Panel name '{}' must not start with a digit", raw));
        }

        let type_name: String = words.iter().map(|w| capitalize(w)).collect();
        let module_name = words.join("_");
        let title = words
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Self {
            type_name,
            module_name,
            title,
        })
    }
}

fn split_words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in raw.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        current.push(ch.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn render_panel(names: &PanelNames) -> String {
    PANEL_TEMPLATE
        .replace("{{type_name}}", &names.type_name)
        .replace("{{module_name}}", &names.module_name)
        .replace("{{title}}", &names.title)
}

/// Write the panel into `out_dir` and return the file path.
pub fn write_panel(names: &PanelNames, out_dir: &Path, force: bool) -> Result<PathBuf, String> {
    let path = out_dir.join(format!("{}.rs", names.module_name));
    if path.exists() && !force {
        return Err(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        ));
    }

    fs::create_dir_all(out_dir)
        .map_err(|e| format!("Failed to create {}: {}", out_dir.display(), e))?;
    fs::write(&path, render_panel(names))
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

/// Run the scaffold command
pub fn run_scaffold(name: &str, out: Option<PathBuf>, force: bool) -> Result<(), String> {
    let names = PanelNames::parse(name)?;
    let out_dir = match out {
        Some(dir) => dir,
        None => std::env::current_dir()
            .map_err(|e| format!("Failed to get current directory: {}", e))?,
    };

    let path = write_panel(&names, &out_dir, force)?;
    tracing::info!(path = %path.display(), panel = %names.type_name, "panel scaffolded");

    println!("Created: {}\n", path.display());
    println!("Next steps:");
    println!("  1. Add `pub mod {};` to your ui module", names.module_name);
    println!(
        "  2. Construct `{}::new()` and call `draw` from the frame layout",
        names.type_name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_variants() {
        for raw in ["storage-usage", "StorageUsage", "storage usage", "storage_usage"] {
            let names = PanelNames::parse(raw).unwrap();
            assert_eq!(names.type_name, "StorageUsage", "from {raw}");
            assert_eq!(names.module_name, "storage_usage", "from {raw}");
            assert_eq!(names.title, "Storage Usage", "from {raw}");
        }
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert!(PanelNames::parse("--").is_err());
        assert!(PanelNames::parse("9lives").is_err());
    }

    #[test]
    fn test_rendered_panel_has_no_placeholders() {
        let names = PanelNames::parse("gpu-usage").unwrap();
        let out = render_panel(&names);
        assert!(!out.contains("{{"));
        assert!(out.contains("pub struct GpuUsage"));
        assert!(out.contains("\"Gpu Usage\""));
    }

    #[test]
    fn test_write_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let names = PanelNames::parse("Events").unwrap();

        let path = write_panel(&names, dir.path(), false).unwrap();
        assert_eq!(path, dir.path().join("events.rs"));

        let err = write_panel(&names, dir.path(), false).unwrap_err();
        assert!(err.contains("--force"));

        fs::write(&path, "stale").unwrap();
        write_panel(&names, dir.path(), true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("pub struct Events"));
    }

    #[test]
    fn test_write_creates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("ui").join("panels");
        let path = write_panel(&PanelNames::parse("quota").unwrap(), &nested, false).unwrap();
        assert!(path.exists());
    }
}
