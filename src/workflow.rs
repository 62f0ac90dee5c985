//! workflow.rs
//!
//! Coordinates the full generation sequence: path confirmation, service
//! and module resolution, code generation through the external generator,
//! then test generation. Every entry point returns a human-readable
//! outcome string; step failures and cancellation are folded into that
//! string rather than propagated.

use std::path::PathBuf;

use crate::config::{self, Paths};
use crate::elicit::{Elicit, ElicitOutcome};
use crate::error::FlowError;
use crate::llm::backend::LlmBackend;
use crate::runner::run_command;
use crate::specs;
use crate::state::{CancelToken, LogLevel, Reporter};
use crate::testgen;

/// Everything the generator invocation needs, fixed at selection time.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub target_name: String,
    pub source_spec_path: PathBuf,
    pub resource_provider: String,
    pub api_tag: String,
}

/// Full workflow: code generation followed by test generation.
pub fn run_generate(
    reporter: &Reporter,
    cancel: &CancelToken,
    elicit: &mut dyn Elicit,
    backend: &LlmBackend,
    paths: Paths,
    service: Option<String>,
) -> String {
    match generate_inner(reporter, cancel, elicit, backend, paths, service) {
        Ok(outcome) => outcome,
        Err(FlowError::Cancelled) => "Code generation cancelled.".to_string(),
        Err(e) => format!("Code generation failed: {e}"),
    }
}

/// Test generation only, for a module that already exists.
pub fn run_testgen(
    reporter: &Reporter,
    cancel: &CancelToken,
    elicit: &mut dyn Elicit,
    backend: &LlmBackend,
    paths: Paths,
    module: Option<String>,
) -> String {
    match testgen_inner(reporter, cancel, elicit, backend, paths, module) {
        Ok(outcome) => outcome,
        Err(FlowError::Cancelled) => "Test generation cancelled.".to_string(),
        Err(e) => format!("Test generation failed: {e}"),
    }
}

fn generate_inner(
    reporter: &Reporter,
    cancel: &CancelToken,
    elicit: &mut dyn Elicit,
    backend: &LlmBackend,
    paths: Paths,
    service: Option<String>,
) -> Result<String, FlowError> {
    reporter.info("Initiating code generation workflow.");

    let Some(paths) = confirm_paths(reporter, elicit, paths)? else {
        return Ok("Code generation cancelled.".to_string());
    };

    let service = match service {
        Some(s) => s,
        None => match select_service(reporter, elicit, &paths) {
            Some(s) => s,
            None => return Ok("Code generation cancelled.".to_string()),
        },
    };
    reporter.progress(40);

    let module = match run_code_generation(reporter, cancel, elicit, &paths, &service) {
        Ok(Some(module)) => module,
        Ok(None) => return Ok("Code generation cancelled.".to_string()),
        Err(err @ FlowError::CommandFailed { .. }) => {
            reporter.log(LogLevel::Error, format!("Code generation failed: {err}"));
            return Ok(format!("Code generation failed: {err}"));
        }
        Err(e) => return Err(e),
    };
    reporter.progress(60);
    reporter.progress(100);

    // test generation trouble is reported, never allowed to sink the run
    reporter.info("Automatically generating tests for the newly generated module...");
    let test_outcome = testgen::generate_tests(
        reporter,
        cancel,
        elicit,
        |p| backend.sample(p),
        &paths,
        Some(&module),
    );
    match test_outcome {
        Ok(outcome) => reporter.info(format!("Automatic test generation result: {outcome}")),
        Err(FlowError::Cancelled) => return Err(FlowError::Cancelled),
        Err(e) => reporter.info(format!("Automatic test generation failed: {e}")),
    }

    Ok(format!(
        "Code generation and test generation completed for extension/module '{module}'."
    ))
}

fn testgen_inner(
    reporter: &Reporter,
    cancel: &CancelToken,
    elicit: &mut dyn Elicit,
    backend: &LlmBackend,
    paths: Paths,
    module: Option<String>,
) -> Result<String, FlowError> {
    reporter.info("Initiating test generation workflow.");

    let Some(paths) = confirm_paths(reporter, elicit, paths)? else {
        return Ok("Test generation cancelled.".to_string());
    };

    testgen::generate_tests(
        reporter,
        cancel,
        elicit,
        |p| backend.sample(p),
        &paths,
        module.as_deref(),
    )
}

/// Confirm the configured paths with the operator, applying corrections,
/// then validate that every directory exists. `None` means the operator
/// declined.
fn confirm_paths(
    reporter: &Reporter,
    elicit: &mut dyn Elicit,
    mut paths: Paths,
) -> Result<Option<Paths>, FlowError> {
    reporter.info("Validating local paths...");
    reporter.progress(5);

    let summary: Vec<String> = paths
        .entries()
        .iter()
        .map(|(key, path)| format!("- {}: `{}`", key.replace('_', " "), path.display()))
        .collect();
    let question = format!(
        "Are the detected paths correct?\n{}",
        summary.join("\n")
    );

    match elicit.elicit(&question, Some(&yes_no())) {
        ElicitOutcome::Decline => return Ok(None),
        ElicitOutcome::Accept(answer) if answer == "no" => {
            for (key, path) in paths.fields_mut() {
                let display_name = key.replace('_', " ");
                let confirm = elicit.elicit(
                    &format!("Confirm the {display_name} directory: `{}`", path.display()),
                    Some(&yes_no()),
                );
                match confirm {
                    ElicitOutcome::Decline => return Ok(None),
                    ElicitOutcome::Accept(answer) if answer == "no" => {
                        let corrected = elicit.elicit(
                            &format!("Provide the correct path for the {display_name} directory:"),
                            None,
                        );
                        match corrected {
                            ElicitOutcome::Accept(new_path) => {
                                *path = PathBuf::from(new_path.trim().trim_matches('"'));
                                reporter
                                    .info(format!("Updated {display_name} path to: {}", path.display()));
                            }
                            ElicitOutcome::Decline => return Ok(None),
                        }
                    }
                    ElicitOutcome::Accept(_) => {}
                }
            }
        }
        ElicitOutcome::Accept(_) => {}
    }

    reporter.info("Verifying path existence...");
    paths.validate()?;

    reporter.info("Path validation completed.");
    reporter.progress(20);
    Ok(Some(paths))
}

fn yes_no() -> [String; 2] {
    ["yes".to_string(), "no".to_string()]
}

fn select_service(
    reporter: &Reporter,
    elicit: &mut dyn Elicit,
    paths: &Paths,
) -> Option<String> {
    reporter.info("Fetching available services...");
    let services = specs::available_services(&paths.spec_root);

    if services.is_empty() {
        reporter.warn("No services found under the specification root.");
        return match elicit.elicit("Enter the service name to generate a module from:", None) {
            ElicitOutcome::Accept(name) if !name.trim().is_empty() => {
                Some(name.trim().to_string())
            }
            _ => None,
        };
    }

    match elicit.elicit(
        "Select the API specification service to generate a module from:",
        Some(&services),
    ) {
        ElicitOutcome::Accept(choice) => Some(choice),
        ElicitOutcome::Decline => None,
    }
}

fn select_option(
    reporter: &Reporter,
    elicit: &mut dyn Elicit,
    options: &[String],
    what: &str,
) -> Option<String> {
    if options.len() == 1 {
        reporter.info(format!("Using single {what}: {}", options[0]));
        return Some(options[0].clone());
    }

    match elicit.elicit(&format!("Select one {what} from the list:"), Some(options)) {
        ElicitOutcome::Accept(choice) => Some(choice),
        ElicitOutcome::Decline => None,
    }
}

/// Drive the external generator for one service. `Ok(None)` means the
/// operator cancelled or the service lacks usable generation inputs.
fn run_code_generation(
    reporter: &Reporter,
    cancel: &CancelToken,
    elicit: &mut dyn Elicit,
    paths: &Paths,
    service: &str,
) -> Result<Option<String>, FlowError> {
    let info = match specs::read_service_readme(&paths.spec_root, service) {
        Some(info) if !info.resource_providers.is_empty() && !info.tags.is_empty() => info,
        _ => {
            reporter.warn(format!(
                "No generation inputs found in the readme for service '{service}'."
            ));
            return Ok(None);
        }
    };

    reporter.info(format!(
        "Found resource providers: {:?}",
        info.resource_providers
    ));
    reporter.info(format!("Found tags: {:?}", info.tags));

    let Some(resource_provider) =
        select_option(reporter, elicit, &info.resource_providers, "resource provider")
    else {
        return Ok(None);
    };
    let Some(api_tag) = select_option(reporter, elicit, &info.tags, "API tag") else {
        return Ok(None);
    };

    reporter.info(format!(
        "Selected resource provider: {resource_provider}, tag: {api_tag}"
    ));

    let module = match elicit.elicit(
        "Module/extension name for the generated code (decline to use the default):",
        None,
    ) {
        ElicitOutcome::Accept(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => {
            reporter.info("No module name provided. The default name will be used.");
            service.to_string()
        }
    };

    let request = GenerationRequest {
        target_name: service.to_string(),
        source_spec_path: paths.spec_root.join("specification").join(service),
        resource_provider,
        api_tag,
    };

    let generator = config::resolve_generator();
    reporter.info(format!("Using generator invocation: {generator}"));
    reporter.info(format!(
        "Source specification: {}",
        request.source_spec_path.display()
    ));

    let command = format!(
        "{generator} cli generate -s {} -m {module} --resource-provider {} --tag {}",
        request.target_name, request.resource_provider, request.api_tag
    );

    run_command(reporter, cancel, &command, "Generate CLI code", 40, 60)?;

    Ok(Some(module))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elicit::ScriptedElicit;
    use crate::llm::client::LlmClient;
    use crate::state::FlowEvent;
    use std::sync::mpsc;

    fn reporter_pair() -> (Reporter, mpsc::Receiver<FlowEvent>) {
        let (tx, rx) = mpsc::channel();
        (Reporter::new(tx), rx)
    }

    fn existing_paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            root: dir.path().to_path_buf(),
            host_cli: dir.path().to_path_buf(),
            host_cli_extensions: dir.path().to_path_buf(),
            spec_root: dir.path().to_path_buf(),
        };
        (dir, paths)
    }

    #[test]
    fn declining_path_confirmation_cancels_the_workflow() {
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![]);
        let backend = LlmBackend::remote(LlmClient::new());
        let (_dir, paths) = existing_paths();

        let outcome = run_generate(&reporter, &cancel, &mut elicit, &backend, paths, None);
        assert_eq!(outcome, "Code generation cancelled.");
    }

    #[test]
    fn missing_path_aborts_with_its_logical_key() {
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![ScriptedElicit::accept("yes")]);
        let backend = LlmBackend::remote(LlmClient::new());

        let (_dir, mut paths) = existing_paths();
        paths.spec_root = paths.spec_root.join("not-there");

        let outcome = run_generate(&reporter, &cancel, &mut elicit, &backend, paths, None);
        assert!(outcome.starts_with("Code generation failed:"));
        assert!(outcome.contains("spec_root path does not exist"));
    }

    #[test]
    fn path_corrections_are_applied_before_validation() {
        let (reporter, _rx) = reporter_pair();
        let mut elicit = ScriptedElicit::new(vec![
            ScriptedElicit::accept("no"),  // overall confirmation
            ScriptedElicit::accept("yes"), // root
            ScriptedElicit::accept("yes"), // host_cli
            ScriptedElicit::accept("yes"), // host_cli_extensions
            ScriptedElicit::accept("no"),  // spec_root is wrong
            ScriptedElicit::accept("/tmp"),
        ]);

        let (_dir, mut paths) = existing_paths();
        paths.spec_root = paths.spec_root.join("not-there");

        let confirmed = confirm_paths(&reporter, &mut elicit, paths)
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.spec_root, PathBuf::from("/tmp"));
    }

    #[test]
    fn service_without_generation_inputs_cancels_codegen() {
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![
            ScriptedElicit::accept("yes"),    // paths are fine
            ScriptedElicit::accept("widget"), // free-form service name
        ]);
        let backend = LlmBackend::remote(LlmClient::new());
        let (_dir, paths) = existing_paths();

        let outcome = run_generate(&reporter, &cancel, &mut elicit, &backend, paths, None);
        assert_eq!(outcome, "Code generation cancelled.");
    }

    #[test]
    fn testgen_entry_reports_missing_modules_as_an_outcome() {
        let (reporter, _rx) = reporter_pair();
        let cancel = CancelToken::new();
        let mut elicit = ScriptedElicit::new(vec![ScriptedElicit::accept("yes")]);
        let backend = LlmBackend::remote(LlmClient::new());
        let (_dir, paths) = existing_paths();

        let outcome = run_testgen(
            &reporter,
            &cancel,
            &mut elicit,
            &backend,
            paths,
            Some("ghost".to_string()),
        );
        assert!(outcome.starts_with("Module path not found for 'ghost'"));
    }

    #[test]
    fn single_options_are_selected_without_asking() {
        let (reporter, _rx) = reporter_pair();
        let mut elicit = ScriptedElicit::new(vec![]); // would decline if asked
        let options = vec!["OnlyChoice".to_string()];

        assert_eq!(
            select_option(&reporter, &mut elicit, &options, "resource provider"),
            Some("OnlyChoice".to_string())
        );
    }
}
