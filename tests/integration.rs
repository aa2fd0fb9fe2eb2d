use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cur_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cur");
    path
}

const SHARED_STRINGS: &[&str] = &[
    "Ano",
    "Período",
    "Categoria",
    "Seq",
    "Unidade Curricular",
    "CH",
    "1º ANO",
    "1º Período",
    "Básico",
    "Lógica de Programação",
    "Banco de Dados",
    "Total",
];

/// Minimal workbook: sharedStrings plus one worksheet.
fn grade_xlsx() -> Vec<u8> {
    let si: String = SHARED_STRINGS
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", s))
        .collect();
    let shared = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\" count=\"{n}\" uniqueCount=\"{n}\">{si}</sst>",
        n = SHARED_STRINGS.len(),
        si = si
    );
    let sheet = concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
        "<worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData>",
        "<row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\" t=\"s\"><v>1</v></c><c r=\"C1\" t=\"s\"><v>2</v></c>",
        "<c r=\"E1\" t=\"s\"><v>3</v></c><c r=\"F1\" t=\"s\"><v>4</v></c><c r=\"G1\" t=\"s\"><v>5</v></c></row>",
        "<row r=\"2\"><c r=\"A2\" t=\"s\"><v>6</v></c><c r=\"B2\" t=\"s\"><v>7</v></c><c r=\"C2\" t=\"s\"><v>8</v></c>",
        "<c r=\"E2\"><v>1</v></c><c r=\"F2\" t=\"s\"><v>9</v></c><c r=\"G2\"><v>80</v></c></row>",
        "<row r=\"3\"><c r=\"E3\"><v>2</v></c><c r=\"F3\" t=\"s\"><v>10</v></c><c r=\"G3\"><v>60</v></c></row>",
        "<row r=\"4\"><c r=\"A4\" t=\"s\"><v>11</v></c><c r=\"G4\"><v>140</v></c></row>",
        "</sheetData></worksheet>"
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("xl/sharedStrings.xml", options).unwrap();
        zip.write_all(shared.as_bytes()).unwrap();
        zip.start_file("xl/worksheets/sheet1.xml", options).unwrap();
        zip.write_all(sheet.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

const PLANO: &str = r#"[
  {"page": 1, "fragments": [
    {"x": 72.0, "y": 760.0, "text": "UNIDADE CURRICULAR: LÓGICA DE PROGRAMAÇÃO"},
    {"x": 72.0, "y": 740.0, "text": "CAPACIDADES TÉCNICAS"},
    {"x": 340.0, "y": 740.0, "text": "CONHECIMENTOS"},
    {"x": 72.0, "y": 720.0, "text": "Aplicar estruturas de repetição para resolver problemas."},
    {"x": 340.0, "y": 720.0, "text": "1 ALGORITMOS"},
    {"x": 340.0, "y": 700.0, "text": "1.1 Variáveis"}
  ]},
  {"page": 2, "fragments": [
    {"x": 72.0, "y": 760.0, "text": "UNIDADE CURRICULAR: BANCO DE DADOS"},
    {"x": 72.0, "y": 740.0, "text": "CAPACIDADES TÉCNICAS"},
    {"x": 340.0, "y": 740.0, "text": "CONHECIMENTOS"},
    {"x": 72.0, "y": 720.0, "text": "Modelar bancos de dados relacionais."},
    {"x": 340.0, "y": 720.0, "text": "1 MODELAGEM"},
    {"x": 340.0, "y": 700.0, "text": "1.1 Entidades"}
  ]}
]"#;

const COURSE_NAME: &str = "Técnico em Desenvolvimento de Sistemas";
const COURSE_ID: &str = "tecnico-em-desenvolvimento-de-sistemas";

struct Env {
    _tmp: TempDir,
    root: PathBuf,
    config: PathBuf,
}

fn setup_test_env() -> Env {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let inputs = root.join("inputs");
    fs::create_dir_all(&inputs).unwrap();

    fs::write(inputs.join("grade.xlsx"), grade_xlsx()).unwrap();
    fs::write(inputs.join("plano.json"), PLANO).unwrap();

    let config_content = format!(
        r#"[store]
dir = "{}/data/courses"

[retrieval]
final_limit = 5
"#,
        root.display()
    );
    let config = config_dir.join("cur.toml");
    fs::write(&config, config_content).unwrap();

    Env {
        _tmp: tmp,
        root,
        config,
    }
}

fn run_cur(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cur_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cur binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn ingest(env: &Env, extra: &[&str]) -> (String, String, bool) {
    let sheet = env.root.join("inputs/grade.xlsx");
    let doc = env.root.join("inputs/plano.json");
    let mut args = vec![
        "ingest",
        "--name",
        COURSE_NAME,
        "--spreadsheet",
        sheet.to_str().unwrap(),
        "--document",
        doc.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    run_cur(&env.config, &args)
}

#[test]
fn test_ingest_stores_course() {
    let env = setup_test_env();

    let (stdout, stderr, success) = ingest(&env, &[]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&format!("course id: {}", COURSE_ID)));
    assert!(stdout.contains("modules: 2"));
    assert!(stdout.contains("total hours: 140"));
    assert!(stdout.trim_end().ends_with("ok"));

    assert!(env
        .root
        .join(format!("data/courses/{}.json", COURSE_ID))
        .exists());
}

#[test]
fn test_ingest_dry_run_does_not_store() {
    let env = setup_test_env();

    let (stdout, stderr, success) = ingest(&env, &["--dry-run"]);
    assert!(success, "dry run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("dry run: course not stored"));

    let (stdout, _, success) = run_cur(&env.config, &["list"]);
    assert!(success);
    assert!(stdout.contains("No courses stored"));
}

#[test]
fn test_ingest_json_report() {
    let env = setup_test_env();

    let (stdout, stderr, success) = ingest(&env, &["--json"]);
    assert!(success, "ingest failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["course_id"], COURSE_ID);
    assert_eq!(report["capabilities"], 2);
    assert_eq!(report["knowledge_topics"], 2);
    assert_eq!(report["stored"], true);
    assert_eq!(report["validation"]["valid"], true);
    assert_eq!(report["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_reingest_replaces_course() {
    let env = setup_test_env();

    let (_, _, success) = ingest(&env, &[]);
    assert!(success);
    let (_, _, success) = ingest(&env, &["--competency", "Desenvolver sistemas computacionais."]);
    assert!(success);

    let (stdout, _, success) = run_cur(&env.config, &["list"]);
    assert!(success);
    assert_eq!(stdout.matches(COURSE_ID).count(), 1);

    let (stdout, _, success) = run_cur(&env.config, &["get", COURSE_ID]);
    assert!(success);
    let course: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        course["general_competency"],
        "Desenvolver sistemas computacionais."
    );
}

#[test]
fn test_get_returns_modules_in_spreadsheet_order() {
    let env = setup_test_env();
    let (_, _, success) = ingest(&env, &[]);
    assert!(success);

    let (stdout, stderr, success) = run_cur(&env.config, &["get", COURSE_ID]);
    assert!(success, "get failed: {}", stderr);
    let course: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let modules = course["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0]["name"], "Lógica de Programação");
    assert_eq!(modules[0]["hours"], 80);
    assert_eq!(modules[1]["name"], "Banco de Dados");
    assert_eq!(modules[1]["tier"], "1º ANO");
}

#[test]
fn test_get_missing_course_fails() {
    let env = setup_test_env();
    let (_, stderr, success) = run_cur(&env.config, &["get", "nao-existe"]);
    assert!(!success);
    assert!(stderr.contains("course not found"));
}

#[test]
fn test_validate_stored_course() {
    let env = setup_test_env();
    let (_, _, success) = ingest(&env, &[]);
    assert!(success);

    let (stdout, _, success) = run_cur(&env.config, &["validate", COURSE_ID]);
    assert!(success);
    assert!(stdout.trim_end().ends_with("valid"));
}

#[test]
fn test_search_finds_capability() {
    let env = setup_test_env();
    let (_, _, success) = ingest(&env, &[]);
    assert!(success);

    let (stdout, stderr, success) =
        run_cur(&env.config, &["search", "estruturas de repetição"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["));
    assert!(stdout.contains("capability"));
    assert!(stdout.contains("logica-de-programacao"));
}

#[test]
fn test_search_json_and_no_results() {
    let env = setup_test_env();
    let (_, _, success) = ingest(&env, &[]);
    assert!(success);

    let (stdout, _, success) = run_cur(
        &env.config,
        &["search", "modelagem", "--json", "--no-methodology"],
    );
    assert!(success);
    let hits: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h["meta"]["kind"] != "methodology"));

    let (stdout, _, success) = run_cur(&env.config, &["search", "xyzzyplugh"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_ingest_rejects_unrecognized_spreadsheet() {
    let env = setup_test_env();
    let sheet = env.root.join("inputs/vazia.json");
    fs::write(&sheet, r#"[["Total", "", "", "", "", "", "140"]]"#).unwrap();
    let doc = env.root.join("inputs/plano.json");

    let (_, stderr, success) = run_cur(
        &env.config,
        &[
            "ingest",
            "--name",
            COURSE_NAME,
            "--spreadsheet",
            sheet.to_str().unwrap(),
            "--document",
            doc.to_str().unwrap(),
        ],
    );
    assert!(!success);
    assert!(stderr.contains("vazia.json"), "stderr={}", stderr);
    assert!(!env.root.join("data/courses").exists());
}

#[test]
fn test_ingest_rejects_unknown_extension() {
    let env = setup_test_env();
    let sheet = env.root.join("inputs/grade.ods");
    fs::write(&sheet, b"not a spreadsheet").unwrap();
    let doc = env.root.join("inputs/plano.json");

    let (_, _, success) = run_cur(
        &env.config,
        &[
            "ingest",
            "--name",
            COURSE_NAME,
            "--spreadsheet",
            sheet.to_str().unwrap(),
            "--document",
            doc.to_str().unwrap(),
        ],
    );
    assert!(!success);
}

#[test]
fn test_recover_fenced_output() {
    let env = setup_test_env();
    let raw = env.root.join("saida.txt");
    fs::write(
        &raw,
        "Aqui está o plano:\n```json\n{'titulo': 'Teste', 'itens': [1, 2,],}\n```\n",
    )
    .unwrap();

    let (stdout, stderr, success) =
        run_cur(&env.config, &["recover", raw.to_str().unwrap(), "--compact"]);
    assert!(success, "recover failed: {}", stderr);
    assert!(stdout.contains(r#""titulo":"Teste""#));
    assert!(stdout.contains(r#""itens":[1,2]"#));
}

#[test]
fn test_recover_reports_position_on_failure() {
    let env = setup_test_env();
    let raw = env.root.join("saida.txt");
    fs::write(&raw, "sem nenhum objeto aqui").unwrap();

    let (_, stderr, success) = run_cur(&env.config, &["recover", raw.to_str().unwrap()]);
    assert!(!success);
    assert!(!stderr.is_empty());
}

#[test]
fn test_generate_disabled_by_default() {
    let env = setup_test_env();
    let (_, _, success) = ingest(&env, &[]);
    assert!(success);

    let (_, stderr, success) = run_cur(
        &env.config,
        &[
            "generate",
            COURSE_ID,
            "Lógica de Programação",
            "Crie uma situação de aprendizagem",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("Generation is disabled"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let output = Command::new(cur_binary())
        .current_dir(tmp.path())
        .args(["--config", "absent.toml", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No courses stored in ./data/courses"));
}
