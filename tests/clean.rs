mod common;

use std::fs;

use assert_cmd::Command;
use predicates::{prelude::*, str::contains};

use common::{CLIENTS, CsvOutput, FIXED_REFERENCE, SHUFFLED_REFERENCE, TestWorkspace};

fn registry_canon() -> Command {
    Command::cargo_bin("registry-canon").expect("binary exists")
}

fn clean_args<'a>(input: &'a str, reference: &'a str) -> Vec<&'a str> {
    vec![
        "clean",
        "-i",
        input,
        "-r",
        reference,
        "--default-region",
        "mg",
        "--default-city",
        "Belo Horizonte",
        "--default-postal-code",
        "30130000",
        "--default-area-code",
        "31",
        "--reference-region-column",
        "2",
    ]
}

#[test]
fn clean_canonicalizes_client_registry() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    registry_canon()
        .args(clean_args(
            input.to_str().unwrap(),
            reference.to_str().unwrap(),
        ))
        .assert()
        .success();

    let output = CsvOutput::read(&workspace.join("clientes_canonical.csv"));
    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.headers.len(), 14);

    assert_eq!(output.value(0, "Nome"), "Jose da Silva");
    assert_eq!(output.value(0, "CPF_CNPJ"), "123.456.789-01");
    assert_eq!(output.value(0, "CEP"), "30130-000");
    assert_eq!(output.value(0, "Cod_Municipio"), "3118601");
    assert_eq!(output.value(0, "UF"), "MG");
    assert_eq!(output.value(0, "Endereço"), "RUA DAS FLORES");
    assert_eq!(output.value(0, "address_number"), "123");
    assert_eq!(output.value(0, "Telefone"), "(31)98765-4321");

    assert_eq!(output.value(1, "Nome"), "Padaria Pao Cia");
    assert_eq!(output.value(1, "CPF_CNPJ"), "12.345.678/0001-95");
    assert_eq!(output.value(1, "CEP"), "01310-100");
    assert_eq!(output.value(1, "Cidade"), "Sao Paulo");
    assert_eq!(output.value(1, "UF"), "SP");
    assert_eq!(output.value(1, "Endereço"), "AV CENTRAL");
    assert_eq!(output.value(1, "address_number"), "SN");
    assert_eq!(output.value(1, "Telefone"), "");

    let log = CsvOutput::read(&workspace.join("clientes_canonical_log.csv"));
    assert_eq!(log.headers, vec!["created_columns"]);
    let created: Vec<&str> = log.rows.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(
        created,
        vec![
            "neighborhood",
            "complement",
            "contact",
            "trade_name",
            "phone_business",
            "address_number"
        ]
    );
}

#[test]
fn output_quotes_every_field() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);
    let output = workspace.join("out.csv");

    let mut args = clean_args(input.to_str().unwrap(), reference.to_str().unwrap());
    args.extend(["-o", output.to_str().unwrap()]);
    registry_canon().args(args).assert().success();

    let contents = fs::read_to_string(&output).unwrap();
    assert!(contents.starts_with("\"Nome\",\"CPF_CNPJ\""));
}

#[test]
fn change_log_is_skipped_when_no_column_is_created() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "fornecedores.csv",
        "uf,document,postal_code,city,city_code,name,trade_name,address,neighborhood,contact,phone_primary,address_number\n\
         ,12345678000195,,Contagem,,Loja,,Rua A 10,,,3132345678,\n",
    );
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    registry_canon()
        .args([
            "clean",
            "--kind",
            "supplier",
            "-i",
            input.to_str().unwrap(),
            "-r",
            reference.to_str().unwrap(),
        ])
        .assert()
        .success();

    let output = CsvOutput::read(&workspace.join("fornecedores_canonical.csv"));
    assert_eq!(output.value(0, "city_code"), "3118601");
    assert_eq!(output.value(0, "phone_primary"), "(31) 3234-5678");
    assert_eq!(output.value(0, "address_number"), "10");
    assert_eq!(output.value(0, "address"), "RUA A");
    assert!(!workspace.join("fornecedores_canonical_log.csv").exists());
}

#[test]
fn auto_strategy_finds_shuffled_reference_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "fornecedores.csv",
        "nome,cidade,uf,ibge\nFerragens,Sao Paulo - SP,,\nPadaria,Contagem,,\n",
    );
    let reference = workspace.write("municipios.csv", SHUFFLED_REFERENCE);

    registry_canon()
        .args([
            "clean",
            "--kind",
            "supplier",
            "-i",
            input.to_str().unwrap(),
            "-r",
            reference.to_str().unwrap(),
            "--reference-strategy",
            "auto",
        ])
        .assert()
        .success();

    let output = CsvOutput::read(&workspace.join("fornecedores_canonical.csv"));
    assert_eq!(output.value(0, "ibge"), "3550308");
    assert_eq!(output.value(0, "uf"), "SP");
    assert_eq!(output.value(1, "ibge"), "3118601");
    assert_eq!(output.value(1, "uf"), "MG");
}

#[test]
fn windows_1252_input_is_decoded() {
    let workspace = TestWorkspace::new();
    let (encoded, _, _) = encoding_rs::WINDOWS_1252.encode("nome,cidade\nAção Ltda,Contagem\n");
    let input = workspace.write_bytes("clientes.csv", &encoded);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    registry_canon()
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "-r",
            reference.to_str().unwrap(),
            "--input-encoding",
            "windows-1252",
            "-o",
            "-",
        ])
        .assert()
        .success()
        .stdout(contains("\"Acao Ltda\""))
        .stdout(contains("\"3118601\""));
}

#[test]
fn summary_is_written_as_json() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);
    let summary = workspace.join("summary.json");

    let mut args = clean_args(input.to_str().unwrap(), reference.to_str().unwrap());
    args.extend(["--summary", summary.to_str().unwrap()]);
    registry_canon().args(args).assert().success();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(value["rows"], 2);
    assert_eq!(value["created_columns"].as_array().unwrap().len(), 6);
    assert_eq!(value["defaults_applied"]["postal_code"], 1);
}

#[test]
fn saved_settings_reproduce_the_run() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);
    let settings = workspace.join("settings.yaml");
    let first = workspace.join("first.csv");
    let second = workspace.join("second.csv");

    let mut args = clean_args(input.to_str().unwrap(), reference.to_str().unwrap());
    args.extend([
        "-o",
        first.to_str().unwrap(),
        "--save-config",
        settings.to_str().unwrap(),
    ]);
    registry_canon().args(args).assert().success();
    assert!(fs::read_to_string(&settings).unwrap().contains("area_code"));

    registry_canon()
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "-c",
            settings.to_str().unwrap(),
            "-o",
            second.to_str().unwrap(),
        ])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&first).unwrap(),
        fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn spreadsheet_input_is_rejected_before_writing() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_bytes("clientes.xlsx", b"PK\x03\x04");
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    registry_canon()
        .args(["clean", "-i", input.to_str().unwrap(), "-r", reference.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("export it as CSV"));
    assert!(!workspace.join("clientes_canonical.csv").exists());
}

#[test]
fn missing_reference_is_fatal() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.join("nowhere.csv");

    registry_canon()
        .args(["clean", "-i", input.to_str().unwrap(), "-r", reference.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("does not exist"));
    assert!(!workspace.join("clientes_canonical.csv").exists());
}

#[test]
fn narrow_reference_is_fatal() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", "3106200,BELO HORIZONTE\n");

    registry_canon()
        .args(["clean", "-i", input.to_str().unwrap(), "-r", reference.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("at least 4 are required"));
}

#[test]
fn undecodable_reference_is_fatal() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write_bytes(
        "municipios.csv",
        b"31,3106200,MG,BELO\xC3(HORIZONTE\n31,3118601,MG,CONTAGEM\n",
    );

    registry_canon()
        .args(["clean", "-i", input.to_str().unwrap(), "-r", reference.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("reference table").and(contains("could not be read")));
    assert!(!workspace.join("clientes_canonical.csv").exists());
    assert!(!workspace.join("clientes_canonical_log.csv").exists());
}

#[test]
fn undecodable_source_is_fatal() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_bytes(
        "clientes.csv",
        b"Nome,CPF_CNPJ,CEP\nJos\xC3\x28 da Silva,12345678901,30130000\n",
    );
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    registry_canon()
        .args(["clean", "-i", input.to_str().unwrap(), "-r", reference.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(
            contains("source table")
                .and(contains("could not be read"))
                .and(contains("Decoding row 2")),
        );
    assert!(!workspace.join("clientes_canonical.csv").exists());
}

#[test]
fn preview_goes_to_stderr_when_the_table_is_on_stdout() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    let mut args = clean_args(input.to_str().unwrap(), reference.to_str().unwrap());
    args.extend(["-o", "-", "--preview", "1"]);
    let assert = registry_canon()
        .args(args)
        .assert()
        .success()
        .stdout(contains("--------").not())
        .stderr(contains("--------"));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let output = CsvOutput::parse(&stdout);
    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.value(0, "Nome"), "Jose da Silva");
    assert!(!workspace.join("clientes_canonical.csv").exists());
}

#[test]
fn preview_goes_to_stdout_when_the_table_is_on_disk() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);
    let reference = workspace.write("municipios.csv", FIXED_REFERENCE);

    let mut args = clean_args(input.to_str().unwrap(), reference.to_str().unwrap());
    args.extend(["--preview", "1"]);
    registry_canon()
        .args(args)
        .assert()
        .success()
        .stdout(contains("--------").and(contains("Jose da Silva")));
    assert!(workspace.join("clientes_canonical.csv").exists());
}

#[test]
fn reference_is_required() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("clientes.csv", CLIENTS);

    registry_canon()
        .args(["clean", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("No reference table given"));
}
