//! Prompt assembly for scenario-test generation.
//!
//! Pure string building: static guidance, the module directive, discovered
//! commands, optional docstring examples, an optional reference-style
//! pointer, and a fixed exemplar, in that order.

use crate::extract::ExampleIndex;

pub const REF_STYLE_LABEL: &str =
    "Read and reference the following test files (do not copy verbatim, just follow structure):\n";

pub const IDEAL_STYLE: &str = r#"
    @ResourceGroupPreparer(name_prefix="cli_test_cache_rule_", location="westus")
    def test_cache_rule_lifecycle(self):
        self.kwargs.update({
            "cache_name": self.create_random_name("cache-", 12),
            "rule_name": self.create_random_name("rule-", 12),
        })

        self.cmd("cache create -n {cache_name} -g {rg} --sku Standard")

        self.cmd(
            "cache rule create -n {rule_name} -g {rg} --cache-name {cache_name} --ttl 3600",
            checks=[
                self.check("name", "{rule_name}"),
                self.check("properties.ttl", 3600),
            ],
        )

        self.cmd("cache delete -n {cache_name} -g {rg} --yes")
"#;

fn static_instructions() -> String {
    r#"
You are generating CLI scenario tests for a newly generated command module.
Follow the style used by the host CLI's scenario tests. Keep tests idempotent and light.
Cover the module's primary commands and the bulk of their parameters; read the
discovered command functions to understand what needs exercising.
Constraints:
- Keep tests safe-by-default; avoid destructive operations unless clearly required.
- Ensure tests can run in parallel without conflicts.
- Split large flows into multiple test methods where logically and safely separable;
  avoid coupling every CRUD operation into a single test.
- Output only valid Python code for the test file, nothing else.
"#
    .trim()
    .to_string()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn build_testgen_prompt(
    module_name: &str,
    commands: &[String],
    reference_snippet: Option<&str>,
    examples: Option<&ExampleIndex>,
) -> String {
    let mut parts: Vec<String> = vec![
        static_instructions(),
        format!(
            "Module name: '{module_name}'. Generate a single test class named \
             '{}ScenarioTest' deriving from ScenarioTest.",
            capitalize(module_name)
        ),
        format!(
            "Discovered command functions (potential commands):\n{}",
            commands.join(", ")
        ),
    ];

    if let Some(examples) = examples.filter(|e| !e.is_empty()) {
        let lines: Vec<String> = examples
            .iter()
            .map(|(name, cmd)| format!("{name}: {cmd}"))
            .collect();
        parts.push(format!(
            "Example commands discovered from docstrings:\n{}",
            lines.join("\n")
        ));
    }

    if let Some(reference) = reference_snippet.filter(|r| !r.trim().is_empty()) {
        parts.push(format!("{REF_STYLE_LABEL}{reference}"));
    }

    parts.push(format!(
        "Here is the ideal test style example to follow:\n{IDEAL_STYLE}"
    ));

    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands() -> Vec<String> {
        vec!["widget_create".into(), "widget_delete".into()]
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let mut examples = ExampleIndex::new();
        examples.insert("make one".into(), "forge widget create -n w".into());

        let prompt =
            build_testgen_prompt("widget", &commands(), Some("tests/ref.py"), Some(&examples));

        let directive = prompt.find("WidgetScenarioTest").unwrap();
        let cmds = prompt.find("widget_create, widget_delete").unwrap();
        let example = prompt.find("make one: forge widget create -n w").unwrap();
        let reference = prompt.find(REF_STYLE_LABEL).unwrap();
        let ideal = prompt.find("ideal test style example").unwrap();

        assert!(directive < cmds);
        assert!(cmds < example);
        assert!(example < reference);
        assert!(reference < ideal);
    }

    #[test]
    fn optional_sections_are_omitted_when_absent() {
        let prompt = build_testgen_prompt("widget", &commands(), None, None);
        assert!(!prompt.contains(REF_STYLE_LABEL));
        assert!(!prompt.contains("Example commands discovered"));
        assert!(prompt.contains("ideal test style example"));
    }

    #[test]
    fn empty_example_index_counts_as_absent() {
        let examples = ExampleIndex::new();
        let prompt = build_testgen_prompt("widget", &commands(), None, Some(&examples));
        assert!(!prompt.contains("Example commands discovered"));
    }

    #[test]
    fn module_name_is_capitalized_for_the_class_directive() {
        let prompt = build_testgen_prompt("edgecache", &commands(), None, None);
        assert!(prompt.contains("'EdgecacheScenarioTest'"));
    }
}
