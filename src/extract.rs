//! extract.rs
//!
//! Declaration and example extraction from a generated module's sources.
//! Everything here is pure with respect to the directory contents: two
//! passes over an unchanged tree produce identical results, including the
//! order in which colliding example names get their numeric suffixes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use walkdir::WalkDir;

/// Example name -> command snippet, collision-suffixed.
pub type ExampleIndex = BTreeMap<String, String>;

const EXAMPLE_MARKER: &str = ":example:";

fn declaration_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(")
            .expect("declaration regex must compile")
    })
}

fn is_doc_delimiter(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("\"\"\"") || t.starts_with("'''")
}

/// Generated sources under `root`, sorted so traversal order is stable.
fn source_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("py"))
        .map(|e| e.into_path())
        .collect()
}

/// Collect `:example:`-annotated snippets from documentation blocks.
pub fn extract_examples(root: &Path) -> ExampleIndex {
    let mut examples = ExampleIndex::new();

    for file in source_files(root) {
        let Ok(text) = fs::read_to_string(&file) else {
            continue;
        };
        collect_examples(&text, &mut examples);
    }

    examples
}

fn collect_examples(text: &str, examples: &mut ExampleIndex) {
    let lines: Vec<&str> = text.lines().collect();
    let mut inside_doc = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if is_doc_delimiter(line) {
            inside_doc = !inside_doc;
            i += 1;
            continue;
        }

        if inside_doc {
            if let Some(rest) = line.trim().strip_prefix(EXAMPLE_MARKER) {
                let name = rest.trim();

                // body runs until the closing delimiter, which is left in
                // place so the doc-block state stays consistent
                let mut body = Vec::new();
                let mut j = i + 1;
                while j < lines.len() && !is_doc_delimiter(lines[j]) {
                    let l = lines[j].trim_end();
                    if !l.trim().is_empty() {
                        body.push(l);
                    }
                    j += 1;
                }

                insert_unique(examples, name, body.join("\n"));
                i = j;
                continue;
            }
        }

        i += 1;
    }
}

/// Never overwrite: a repeated name becomes `name_2`, `name_3`, ...
fn insert_unique(examples: &mut ExampleIndex, name: &str, snippet: String) {
    let mut key = name.to_string();
    let mut counter = 1;
    while examples.contains_key(&key) {
        counter += 1;
        key = format!("{name}_{counter}");
    }
    examples.insert(key, snippet.trim().to_string());
}

/// Top-level callable declaration names, in traversal order.
pub fn extract_commands(root: &Path) -> Vec<String> {
    let mut commands = Vec::new();

    for file in source_files(root) {
        let Ok(text) = fs::read_to_string(&file) else {
            continue;
        };
        for line in text.lines() {
            if let Some(caps) = declaration_regex().captures(line.trim_start()) {
                commands.push(caps[1].to_string());
            }
        }
    }

    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MODULE_SOURCE: &str = r#"
def widget_create(cmd, name):
    """Create a widget.

    :example: create a widget
        forge widget create -n my-widget -g my-group
    """
    pass


def widget_update(cmd, name):
    """Update a widget.

    :example: create a widget
        forge widget update -n my-widget -g my-group --tags env=dev
    """
    pass


def widget_delete(cmd, name):
    """Delete a widget.

    :example: delete a widget
        forge widget delete -n my-widget -g my-group --yes
    """
    pass
"#;

    fn module_dir(source: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("custom.py"), source).unwrap();
        dir
    }

    #[test]
    fn examples_are_extracted_with_collision_suffixes() {
        let dir = module_dir(MODULE_SOURCE);
        let examples = extract_examples(dir.path());

        assert_eq!(examples.len(), 3);
        assert_eq!(
            examples["create a widget"],
            "forge widget create -n my-widget -g my-group"
        );
        assert_eq!(
            examples["create a widget_2"],
            "forge widget update -n my-widget -g my-group --tags env=dev"
        );
        assert!(examples.contains_key("delete a widget"));
    }

    #[test]
    fn example_body_runs_to_the_closing_delimiter() {
        // a second marker inside the same doc block is part of the first
        // example's body, not a new entry
        let source = "\
\"\"\"
:example: first
    forge widget create -n a
:example: second
    forge widget show -n a
\"\"\"
";
        let dir = module_dir(source);
        let examples = extract_examples(dir.path());
        assert_eq!(examples.len(), 1);
        assert!(examples["first"].contains(":example: second"));
    }

    #[test]
    fn extraction_is_idempotent_over_an_unchanged_tree() {
        let dir = module_dir(MODULE_SOURCE);
        let first = extract_examples(dir.path());
        let second = extract_examples(dir.path());
        assert_eq!(first, second);
    }

    #[test]
    fn example_marker_outside_doc_block_is_ignored() {
        let dir = module_dir("# :example: not a real one\ndef noop():\n    pass\n");
        assert!(extract_examples(dir.path()).is_empty());
    }

    #[test]
    fn multiline_example_bodies_drop_blank_lines_and_trailing_space() {
        let source = "\
\"\"\"
:example: two step
    forge widget create -n a

    forge widget show -n a
\"\"\"
";
        let dir = module_dir(source);
        let examples = extract_examples(dir.path());
        assert_eq!(
            examples["two step"],
            "forge widget create -n a\n    forge widget show -n a"
        );
    }

    #[test]
    fn commands_are_collected_from_declarations() {
        let dir = module_dir(MODULE_SOURCE);
        assert_eq!(
            extract_commands(dir.path()),
            vec![
                "widget_create".to_string(),
                "widget_update".to_string(),
                "widget_delete".to_string()
            ]
        );
    }

    #[test]
    fn non_python_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "def impostor():").unwrap();
        assert!(extract_commands(dir.path()).is_empty());
    }
}
