mod common;

use common::TestEnv;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

fn load_schema(name: &str) -> Value {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let raw = fs::read_to_string(root.join("docs/contracts").join(name)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn validate(schema_name: &str, data: &Value) {
    let schema = load_schema(schema_name);
    let validator = JSONSchema::compile(&schema).expect("compile schema");
    let msgs: Vec<String> = match validator.validate(data) {
        Ok(()) => return,
        Err(errors) => errors.map(|e| e.to_string()).collect(),
    };
    panic!("{schema_name} validation failed: {}", msgs.join(" | "));
}

fn validate_issues(issues: &Value) {
    for issue in issues.as_array().expect("issue array") {
        validate("issue.schema.json", issue);
    }
}

#[test]
fn contracts_check() {
    let env = TestEnv::new();
    env.write("rules/React.md", "# React\n\n### Hooks\n\n```\nx\n```\n");
    env.write("legacy/vue/components.md", "# Vue Components\n\nUse SFCs.\n");
    env.write("notes/01-n.md", "# N  \n\n\n");

    let count = env.run_json(&["tokens", "count", "."]);
    assert_eq!(count["ok"], true);
    validate("tokens-count.schema.json", &count["data"]);

    let cmp = env.run_json(&[
        "tokens",
        "compare",
        "full-rules/python/01-python-style.mdc",
        ".concise-rules/python/01-python-style.mdc",
    ]);
    validate("tokens-compare.schema.json", &cmp["data"]);

    let lint = env.run_json_failing(&["lint", "rules", "--check"]);
    validate("check.schema.json", &lint["data"]);
    validate_issues(&lint["data"]["files"][0]["issues"]);

    let sync = env.run_json(&["sync", "full-rules", ".concise-rules"]);
    validate("sync.schema.json", &sync["data"]);

    let migrate = env.run_json(&["migrate", "legacy", "--dry-run"]);
    validate("migrate.schema.json", &migrate["data"]);

    let format = env.run_json_failing(&["format", "notes", "--check"]);
    validate("format.schema.json", &format["data"]);

    let report = env.run_json_failing(&[
        "report",
        "--changed",
        "rules/React.md",
        "full-rules/python/01-python-style.mdc",
    ]);
    validate("report.schema.json", &report["data"]);
    for file in report["data"]["files"].as_array().unwrap() {
        validate_issues(&file["issues"]);
    }
}
