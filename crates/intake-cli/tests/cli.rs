use assert_cmd::Command;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stdout_of(cmd: &mut Command, success: bool) -> String {
    let assert = cmd.assert();
    let assert = if success {
        assert.success()
    } else {
        assert.failure()
    };
    String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}

#[test]
fn validate_accepts_complete_values() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("intake")?;
    cmd.arg("validate")
        .arg("--form")
        .arg(fixture("student_application.json"))
        .arg("--values")
        .arg(fixture("valid_values.json"));
    let stdout = stdout_of(&mut cmd, true);
    assert!(stdout.contains("Validation result: valid"), "{stdout}");
    Ok(())
}

#[test]
fn validate_lists_every_offending_field() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("intake")?;
    cmd.arg("validate")
        .arg("--form")
        .arg(fixture("student_application.json"))
        .arg("--values")
        .arg(fixture("invalid_values.json"));
    let stdout = stdout_of(&mut cmd, false);
    assert!(stdout.contains("Validation result: invalid"), "{stdout}");
    assert!(stdout.contains("  email - "), "{stdout}");
    assert!(stdout.contains("  age - "), "{stdout}");
    assert!(!stdout.contains("  full_name - "), "{stdout}");
    Ok(())
}

#[test]
fn preview_prints_fields_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("intake")?;
    cmd.arg("preview")
        .arg("--form")
        .arg(fixture("student_application.json"));
    let stdout = stdout_of(&mut cmd, true);
    assert!(stdout.contains("Form: Student Application (1)"), "{stdout}");
    let full_name = stdout.find("Full Name (full_name, text) [required]").unwrap();
    let grade = stdout.find("Grade (grade, select)").unwrap();
    assert!(full_name < grade);
    assert!(stdout.contains("options: Elementary | Middle | High"));
    Ok(())
}

#[test]
fn preview_json_reports_status() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("intake")?;
    cmd.arg("preview")
        .arg("--form")
        .arg(fixture("student_application.json"))
        .arg("--values")
        .arg(fixture("valid_values.json"))
        .arg("--format")
        .arg("json");
    let stdout = stdout_of(&mut cmd, true);
    let view: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(view["status"], "complete");
    assert_eq!(view["fields"].as_array().map(Vec::len), Some(5));
    Ok(())
}

#[test]
fn build_writes_bundle_and_refuses_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = assert_fs::TempDir::new()?;
    let out = workspace.path().join("bundles");

    let mut cmd = Command::cargo_bin("intake")?;
    cmd.arg("build")
        .arg("--input")
        .arg(fixture("open_day.build.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let bundle = out.join("open-day-registration");
    for file in ["form.json", "values.schema.json", "values.example.json", "README.md"] {
        assert!(bundle.join(file).exists(), "missing {file}");
    }

    let form: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(bundle.join("form.json"))?)?;
    assert_eq!(form["fields"][1]["field_name"], "guardian_email");
    assert_eq!(form["fields"][4]["display_order"], 4);

    Command::cargo_bin("intake")?
        .arg("validate")
        .arg("--form")
        .arg(bundle.join("form.json"))
        .arg("--values")
        .arg(bundle.join("values.example.json"))
        .assert()
        .success();

    Command::cargo_bin("intake")?
        .arg("build")
        .arg("--input")
        .arg(fixture("open_day.build.json"))
        .arg("--out")
        .arg(&out)
        .assert()
        .failure();

    Command::cargo_bin("intake")?
        .arg("build")
        .arg("--input")
        .arg(fixture("open_day.build.json"))
        .arg("--out")
        .arg(&out)
        .arg("--force")
        .assert()
        .success();
    Ok(())
}

#[test]
fn schema_describes_form_documents() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("intake")?;
    cmd.arg("schema");
    let stdout = stdout_of(&mut cmd, true);
    let schema: serde_json::Value = serde_json::from_str(&stdout)?;
    assert_eq!(schema["title"], "FormDocument");
    Ok(())
}
