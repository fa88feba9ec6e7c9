#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Headerless reference in the fixed layout: region number, code, region, name.
pub const FIXED_REFERENCE: &str = "\
31,3106200,MG,BELO HORIZONTE
31,3118601,MG,CONTAGEM
35,3550308,SP,SÃO PAULO
";

/// Same municipalities, shuffled columns and `;` separated, for auto-detection.
pub const SHUFFLED_REFERENCE: &str = "\
3106200;MG;Belo Horizonte (MG);31
3118601;MG;Contagem - MG;31
3550308;SP;São Paulo (SP);35
";

pub const CLIENTS: &str = "\
Nome,CPF_CNPJ,CEP,Cidade,Cod_Municipio,UF,Endereço,Telefone
José da Silva,12345678901,,Contagem,,,\"Rua das Flores, 123\",987654321
Padaria Pão & Cia,12345678000195,1310100,,3550308,,AV CENTRAL S/N,
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

/// A CSV file read back as its header row and records.
pub struct CsvOutput {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvOutput {
    pub fn read(path: &Path) -> Self {
        let contents = fs::read_to_string(path).expect("read csv output");
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Self {
        let mut reader = csv::Reader::from_reader(contents.as_bytes());
        let headers = reader
            .headers()
            .expect("csv headers")
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|record| {
                record
                    .expect("csv record")
                    .iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        Self { headers, rows }
    }

    pub fn value(&self, row: usize, header: &str) -> &str {
        let idx = self
            .headers
            .iter()
            .position(|h| h == header)
            .unwrap_or_else(|| panic!("missing column {header}"));
        &self.rows[row][idx]
    }
}
