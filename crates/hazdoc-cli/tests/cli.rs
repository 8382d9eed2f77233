use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use hazdoc_opc::OpcPackage;
use predicates::prelude::*;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

fn write_template(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "{{SHIPPER}}").unwrap();
    sheet.write_string(1, 0, "{{SHIPPER_ADDRESS}}").unwrap();
    sheet.write_string(2, 0, "UN {{UNNO}} class {{CLASS}}").unwrap();
    sheet.write_string(3, 0, "{{QTY_EQUIPMENT}}").unwrap();
    sheet.write_string(4, 0, "{{MARINE_POLLUTANT}}").unwrap();
    workbook.save(path).unwrap();
}

/// A working directory with `templates/` and `refdata/` in their default locations.
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir(&templates).unwrap();
    write_template(&templates.join("DG Form.xlsx"));
    std::fs::write(templates.join("notes.txt"), "not a template").unwrap();

    let refdata = dir.path().join("refdata");
    std::fs::create_dir(&refdata).unwrap();
    let tables = [
        (
            "cargo.csv",
            "Proper Shipping Name,technicalName,class,unno,marinePollutant\nPAINT,,3,1263,YES\n",
        ),
        ("Equipment Type.csv", "20GP\n40HC\n"),
        (
            "Shippers.csv",
            "Shipper,ContactName,ContactNumber,Shipper_Address\nACME,Wile,555,1 Desert Road Rocky Canyon Arizona\n",
        ),
        ("Consignees.csv", "Consignee,Consignee_Address\nGlobex,Cypress Creek\n"),
        ("Ports.csv", "POL,POD\nSGSIN,NLRTM\n"),
        ("Vessels.csv", "Vessel_Name\nMSC ANNA\n"),
    ];
    for (name, body) in tables {
        std::fs::write(refdata.join(name), body).unwrap();
    }
    dir
}

fn hazdoc(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hazdoc").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

fn shared_strings(path: &Path) -> String {
    let package = OpcPackage::from_bytes(&std::fs::read(path).unwrap()).unwrap();
    package.part_str("xl/sharedStrings.xml").unwrap().to_string()
}

#[test]
fn lists_templates() {
    let dir = workspace();
    hazdoc(&dir)
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::contains("DG Form\t"))
        .stdout(predicate::str::contains("notes").not());
}

#[test]
fn lists_templates_as_json() {
    let dir = workspace();
    let output = hazdoc(&dir).args(["templates", "--json"]).output().unwrap();
    assert!(output.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed[0]["name"], "DG Form");
}

#[test]
fn prints_placeholders() {
    let dir = workspace();
    hazdoc(&dir)
        .args(["placeholders", "DG Form"])
        .assert()
        .success()
        .stdout(predicate::str::contains("QTY_EQUIPMENT\n"))
        .stdout(predicate::str::contains("SHIPPER_ADDRESS\n"));
}

#[test]
fn fills_from_a_json_file() {
    let dir = workspace();
    std::fs::write(
        dir.path().join("fields.json"),
        r#"{"SHIPPER": "ACME", "unno": "1263", "class": 3}"#,
    )
    .unwrap();

    hazdoc(&dir)
        .args(["fill", "DG Form", "--fields", "fields.json", "--out-dir", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DG Form_filled.xlsx"));

    let strings = shared_strings(&dir.path().join("out/DG Form_filled.xlsx"));
    assert!(strings.contains("<t>ACME</t>"), "{strings}");
    assert!(strings.contains("UN 1263 class 3"), "{strings}");
}

#[test]
fn declares_from_reference_data() {
    let dir = workspace();
    hazdoc(&dir)
        .args([
            "declare",
            "--template",
            "DG Form",
            "--cargo",
            "PAINT",
            "--shipper",
            "ACME",
            "--quantity",
            "2",
            "--equipment-type",
            "20GP",
            "--outer-package",
            "4G",
            "--inner-package",
            "1A1",
            "--gross-wt",
            "1200 KG",
            "--net-wt",
            "1000 KG",
        ])
        .assert()
        .success();

    let strings = shared_strings(&dir.path().join("DG Form_filled.xlsx"));
    assert!(strings.contains("<t>2x20GP</t>"), "{strings}");
    assert!(strings.contains("UN 1263 class 3"), "{strings}");
    assert!(strings.contains("<t>YES</t>"), "{strings}");
    assert!(strings.contains("1 Desert Road Rocky Canyon Arizona"), "{strings}");
}

#[test]
fn declare_prints_wrapped_fields() {
    let dir = workspace();
    std::fs::write(dir.path().join("hazdoc.toml"), "address_width = 20\n").unwrap();
    let output = hazdoc(&dir)
        .args([
            "declare",
            "--template",
            "DG Form",
            "--cargo",
            "PAINT",
            "--shipper",
            "ACME",
            "--equipment-type",
            "40HC",
            "--outer-package",
            "4G",
            "--inner-package",
            "1A1",
            "--gross-wt",
            "10",
            "--net-wt",
            "9",
            "--marine-pollutant",
            "no",
            "--print-fields",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let fields: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(fields["SHIPPER_ADDRESS"], "1 Desert Road Rocky\nCanyon Arizona");
    assert_eq!(fields["MARINE_POLLUTANT"], "NO");
    assert_eq!(fields["QTY_EQUIPMENT"], "1x40HC");
    assert_eq!(fields["QUANTITY"], 1.0);
    assert!(!dir.path().join("DG Form_filled.xlsx").exists());
}

#[test]
fn declare_requires_mandatory_fields() {
    let dir = workspace();
    hazdoc(&dir)
        .args(["declare", "--template", "DG Form", "--cargo", "PAINT"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OUTER_PACKAGE"))
        .stderr(predicate::str::contains("EQUIPMENT_TYPE"));
}

#[test]
fn added_vessel_is_listed() {
    let dir = workspace();
    hazdoc(&dir)
        .args(["refdata", "add-vessel", "EVER GIVEN"])
        .assert()
        .success()
        .stdout(predicate::str::contains("added `EVER GIVEN` to Vessels"));

    hazdoc(&dir)
        .args(["refdata", "show", "vessels"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MSC ANNA\nEVER GIVEN\n"));
}

#[test]
fn blank_shipper_name_is_rejected() {
    let dir = workspace();
    hazdoc(&dir)
        .args(["refdata", "add-shipper", "--name", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("shipper name is required"));
}

#[test]
fn unknown_template_is_an_error() {
    let dir = workspace();
    hazdoc(&dir)
        .args(["placeholders", "Missing Form"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no template named `Missing Form`"));
}

#[test]
fn missing_templates_folder_is_reported() {
    let dir = workspace();
    hazdoc(&dir)
        .args(["templates", "--templates-dir", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
