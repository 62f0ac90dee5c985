// src/specs.rs
//
// API specification repository introspection: which services exist, and
// what a service's readme says about resource providers and tags.

use std::fs;
use std::path::Path;

/// Generation inputs parsed out of a service's `resource-manager/readme.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadmeInfo {
    pub resource_providers: Vec<String>,
    pub tags: Vec<String>,
}

/// Service directories under `<spec_root>/specification`, sorted. Empty if
/// the specification tree is absent or unreadable.
pub fn available_services(spec_root: &Path) -> Vec<String> {
    let spec_dir = spec_root.join("specification");

    let Ok(entries) = fs::read_dir(&spec_dir) else {
        return Vec::new();
    };

    let mut services: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    services.sort();
    services
}

pub fn read_service_readme(spec_root: &Path, service: &str) -> Option<ReadmeInfo> {
    let readme = spec_root
        .join("specification")
        .join(service)
        .join("resource-manager")
        .join("readme.md");

    let text = fs::read_to_string(readme).ok()?;
    Some(parse_readme(&text))
}

/// Tags come from `### Tag:` headings; resource providers from the first
/// path component of each entry in the first `input-file:` list.
pub fn parse_readme(text: &str) -> ReadmeInfo {
    let mut tags = Vec::new();
    for line in text.lines() {
        if let Some(rest) = line.trim().strip_prefix("### Tag:") {
            tags.push(rest.trim().to_string());
        }
    }

    let mut resource_providers = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        if !line.trim().starts_with("input-file:") {
            continue;
        }
        for next in lines.by_ref() {
            let next = next.trim();
            if let Some(entry) = next.strip_prefix('-') {
                if let Some(first) = entry.trim().split('/').next() {
                    if !first.is_empty() {
                        resource_providers.push(first.to_string());
                    }
                }
            } else if next.is_empty() || next.starts_with('#') {
                continue;
            } else {
                break;
            }
        }
        break;
    }

    ReadmeInfo {
        resource_providers,
        tags,
    }
}
