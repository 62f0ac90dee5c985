//! testgen.rs
//!
//! Scenario-test generation for a generated CLI module: locate the module
//! and its tests directory, gather command declarations and docstring
//! examples, sample the provider, and materialize the result. The test
//! file is only ever written after a non-empty cleaned response, so a
//! failed run never leaves partial output behind.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{Paths, RetrySettings};
use crate::elicit::{Elicit, ElicitOutcome};
use crate::error::FlowError;
use crate::extract::{extract_commands, extract_examples};
use crate::llm::prompt::build_testgen_prompt;
use crate::llm::sampler::sample_with_retry;
use crate::state::{CancelToken, LogLevel, Reporter};

/// Upstream scenario-test files offered to the model as structural
/// references.
const REFERENCE_TEST_PATHS: [&str; 2] = [
    "command_modules/resource/tests/latest/test_resource.py",
    "command_modules/network/tests/latest/test_network_commands.py",
];

pub struct ModuleLayout {
    pub module_dir: PathBuf,
    pub commands: Vec<String>,
    pub test_file: PathBuf,
}

/// Existing `tests/latest` directory for the module, if one was generated.
pub fn find_test_dir(extensions_root: &Path, module: &str) -> Option<PathBuf> {
    let base = extensions_root.join("src").join(module);
    WalkDir::new(base)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir())
        .find(|e| e.path().ends_with("tests/latest"))
        .map(|e| e.into_path())
}

pub fn resolve_module(paths: &Paths, module: &str) -> Result<ModuleLayout, FlowError> {
    let module_dir = paths.host_cli_extensions.join("src").join(module);
    if !module_dir.exists() {
        return Err(FlowError::PathNotFound {
            key: "module",
            path: module_dir.display().to_string(),
        });
    }

    let commands = extract_commands(&module_dir);

    let test_dir = find_test_dir(&paths.host_cli_extensions, module)
        .unwrap_or_else(|| module_dir.join("tests").join("latest"));
    fs::create_dir_all(&test_dir)?;

    Ok(ModuleLayout {
        test_file: test_dir.join(format!("test_{module}.py")),
        module_dir,
        commands,
    })
}

/// Run the whole test-generation flow for one module. Returns the outcome
/// as a human-readable string; only cancellation and I/O trouble surface
/// as errors.
pub fn generate_tests(
    reporter: &Reporter,
    cancel: &CancelToken,
    elicit: &mut dyn Elicit,
    sample: impl FnMut(&str) -> Result<String, String>,
    paths: &Paths,
    module: Option<&str>,
) -> Result<String, FlowError> {
    let module = match module {
        Some(m) => m.to_string(),
        None => {
            let outcome =
                elicit.elicit("Enter the module/extension name to generate tests for:", None);
            match outcome {
                ElicitOutcome::Accept(name) if !name.trim().is_empty() => {
                    name.trim().to_string()
                }
                _ => return Ok("Test generation cancelled.".to_string()),
            }
        }
    };

    let layout = match resolve_module(paths, &module) {
        Ok(layout) => layout,
        Err(FlowError::PathNotFound { path, .. }) => {
            return Ok(format!("Module path not found for '{module}': {path}"));
        }
        Err(e) => return Err(e),
    };

    if layout.commands.is_empty() {
        return Ok(format!(
            "No commands found to generate tests for module '{module}'."
        ));
    }

    reporter.info(format!(
        "Discovered {} command functions in module '{module}'.",
        layout.commands.len()
    ));

    let examples = extract_examples(&layout.module_dir);
    let reference = REFERENCE_TEST_PATHS.join("\n");
    let prompt = build_testgen_prompt(
        &module,
        &layout.commands,
        Some(&reference),
        Some(&examples),
    );

    let settings = RetrySettings::from_env();
    let content = match sample_with_retry(reporter, cancel, sample, &prompt, settings) {
        Ok(text) => text,
        Err(FlowError::GenerationFailed(cause)) => {
            return Ok(format!(
                "Test generation failed after {} retries for module '{module}': {cause}",
                settings.max_retries
            ));
        }
        Err(e) => return Err(e),
    };

    fs::write(&layout.test_file, &content)?;
    reporter.log(
        LogLevel::Success,
        format!("Generated test file: {}", layout.test_file.display()),
    );

    Ok(format!(
        "Test generation completed for module '{module}'."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elicit::ScriptedElicit;
    use crate::state::FlowEvent;
    use std::sync::mpsc;

    const MODULE_SOURCE: &str = r#"
def cache_create(cmd, name):
    """Create a cache.

    :example: create a cache
        forge cache create -n my-cache -g my-group
    """
    pass
"#;

    fn reporter_pair() -> (Reporter, mpsc::Receiver<FlowEvent>) {
        let (tx, rx) = mpsc::channel();
        (Reporter::new(tx), rx)
    }

    fn extensions_fixture(module: &str) -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let module_dir = dir.path().join("src").join(module);
        fs::create_dir_all(&module_dir).unwrap();
        fs::write(module_dir.join("custom.py"), MODULE_SOURCE).unwrap();

        let paths = Paths {
            root: dir.path().to_path_buf(),
            host_cli: dir.path().to_path_buf(),
            host_cli_extensions: dir.path().to_path_buf(),
            spec_root: dir.path().to_path_buf(),
        };
        (dir, paths)
    }

    #[test]
    fn find_test_dir_prefers_an_existing_tests_latest() {
        let (dir, paths) = extensions_fixture("cache");
        let nested = dir
            .path()
            .join("src/cache/generated/tests/latest");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_test_dir(&paths.host_cli_extensions, "cache").unwrap(),
            nested
        );
    }

    #[test]
    fn resolve_module_creates_a_tests_latest_fallback() {
        let (_dir, paths) = extensions_fixture("cache");
        let layout = resolve_module(&paths, "cache").unwrap();

        assert!(layout.test_file.ends_with("tests/latest/test_cache.py"));
        assert!(layout.test_file.parent().unwrap().is_dir());
        assert_eq!(layout.commands, vec!["cache_create".to_string()]);
    }

    #[test]
    fn generate_tests_writes_the_cleaned_sample() {
        let (_dir, paths) = extensions_fixture("cache");
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![]);

        let outcome = generate_tests(
            &reporter,
            &cancel,
            &mut elicit,
            |_| Ok("```python\nprint('ok')\n```".to_string()),
            &paths,
            Some("cache"),
        )
        .unwrap();

        assert_eq!(outcome, "Test generation completed for module 'cache'.");
        let written = fs::read_to_string(
            paths
                .host_cli_extensions
                .join("src/cache/tests/latest/test_cache.py"),
        )
        .unwrap();
        assert_eq!(written, "print('ok')");
    }

    #[test]
    fn exhausted_retries_become_an_outcome_string_and_no_file() {
        let (_dir, paths) = extensions_fixture("cache");
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![]);

        let outcome = generate_tests(
            &reporter,
            &cancel,
            &mut elicit,
            |_| Err("invalid api key".to_string()),
            &paths,
            Some("cache"),
        )
        .unwrap();

        assert!(outcome.starts_with("Test generation failed"));
        assert!(!paths
            .host_cli_extensions
            .join("src/cache/tests/latest/test_cache.py")
            .exists());
    }

    #[test]
    fn missing_module_name_is_elicited() {
        let (_dir, paths) = extensions_fixture("cache");
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![ScriptedElicit::accept("cache")]);

        let outcome = generate_tests(
            &reporter,
            &cancel,
            &mut elicit,
            |_| Ok("print('ok')".to_string()),
            &paths,
            None,
        )
        .unwrap();

        assert_eq!(outcome, "Test generation completed for module 'cache'.");
    }

    #[test]
    fn declined_module_name_cancels() {
        let (_dir, paths) = extensions_fixture("cache");
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![]);

        let outcome = generate_tests(
            &reporter,
            &cancel,
            &mut elicit,
            |_| Ok("never called".to_string()),
            &paths,
            None,
        )
        .unwrap();

        assert_eq!(outcome, "Test generation cancelled.");
    }

    #[test]
    fn unknown_module_reports_the_missing_path() {
        let (_dir, paths) = extensions_fixture("cache");
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![]);

        let outcome = generate_tests(
            &reporter,
            &cancel,
            &mut elicit,
            |_| Ok("never called".to_string()),
            &paths,
            Some("ghost"),
        )
        .unwrap();

        assert!(outcome.starts_with("Module path not found for 'ghost'"));
    }
}
