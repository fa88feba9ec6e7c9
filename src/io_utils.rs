//! I/O utilities for reading and writing delimited tables.
//!
//! The canonicalization core never touches files; this module is the
//! collaborator that loads the source table and the headerless reference
//! table into memory, and writes the canonical table and the change log.
//!
//! - **Delimiter resolution**: `.tsv` means tab, anything else comma, with
//!   manual override support.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Formats**: binary spreadsheets are rejected with a descriptive
//!   [`SetupError`].
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::{
    data::{CellValue, Table},
    error::SetupError,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "xlsm", "xlsb", "ods"];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    if let Some(path) = path {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => return DEFAULT_TSV_DELIMITER,
            Some(ext) if ext.eq_ignore_ascii_case("csv") => return DEFAULT_CSV_DELIMITER,
            _ => {}
        }
    }
    fallback
}

/// Fails for spreadsheet formats that have to be exported before use.
pub fn ensure_delimited_text(path: &Path) -> std::result::Result<(), SetupError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext)
            if SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)) =>
        {
            Err(SetupError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext.to_ascii_lowercase(),
            })
        }
        _ => Ok(()),
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, has_headers: bool) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(has_headers)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter, has_headers))
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };

    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };

    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

fn load_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Table> {
    let mut reader = open_csv_reader_from_path(path, delimiter, true)?;
    let header_record = reader.byte_headers()?.clone();
    let mut table = Table::new(decode_record(&header_record, encoding)?);
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        let values = decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", idx + 2))?;
        table.push_row(values.iter().map(|v| CellValue::from_raw(v)).collect());
    }
    Ok(table)
}

/// Loads a table with a header row. Every cell arrives as text or empty.
pub fn read_table(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> std::result::Result<Table, SetupError> {
    ensure_delimited_text(path)?;
    load_table(path, delimiter, encoding).map_err(|err| SetupError::SourceUnreadable {
        path: path.to_path_buf(),
        reason: format!("{err:#}"),
    })
}

/// Loads every record of a headerless file as decoded strings.
pub fn read_headerless_rows(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Vec<Vec<String>>> {
    let mut reader = open_csv_reader_from_path(path, delimiter, false)?;
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 1))?;
        rows.push(
            decode_record(&record, encoding)
                .with_context(|| format!("Decoding row {}", idx + 1))?,
        );
    }
    Ok(rows)
}

pub fn write_table(
    table: &Table,
    path: Option<&Path>,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<()> {
    let mut writer = open_csv_writer(path, delimiter, encoding)?;
    writer
        .write_record(table.headers.iter())
        .context("Writing output headers")?;
    for (idx, row) in table.display_rows().enumerate() {
        writer
            .write_record(row.iter())
            .with_context(|| format!("Writing output row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output writer")?;
    Ok(())
}

/// Writes the names of synthesized columns under a single `created_columns` header.
pub fn write_change_log(path: &Path, created: &[String]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Creating change log {path:?}"))?;
    writer
        .write_record(["created_columns"])
        .context("Writing change log header")?;
    for name in created {
        writer
            .write_record([name.as_str()])
            .context("Writing change log entry")?;
    }
    writer.flush().context("Flushing change log")?;
    Ok(())
}

struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            buffer: Vec::new(),
        }
    }

    /// Encodes the longest valid UTF-8 prefix of the buffer, keeping an
    /// incomplete trailing sequence for the next write unless `force` is set.
    fn flush_buffer(&mut self, force: bool) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let valid_up_to = match std::str::from_utf8(&self.buffer) {
            Ok(_) => self.buffer.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 sequence in output stream",
                ));
            }
            Err(err) => err.valid_up_to(),
        };
        if valid_up_to > 0 {
            let chunk: Vec<u8> = self.buffer.drain(..valid_up_to).collect();
            let text = std::str::from_utf8(&chunk)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.encode_and_write(text)?;
        }
        if force && !self.buffer.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        Ok(())
    }

    fn encode_and_write(&mut self, text: &str) -> io::Result<()> {
        let (encoded, _output_encoding, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to encode text using {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(encoded.as_ref())
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.flush_buffer(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;
    use std::path::PathBuf;

    #[test]
    fn spreadsheet_extensions_are_rejected() {
        let err = ensure_delimited_text(Path::new("clientes.XLSX")).unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedFormat { ref extension, .. } if extension == "xlsx"));
        assert!(ensure_delimited_text(Path::new("clientes.csv")).is_ok());
        assert!(ensure_delimited_text(Path::new("-")).is_ok());
    }

    #[test]
    fn delimiters_follow_extensions() {
        assert_eq!(resolve_input_delimiter(&PathBuf::from("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(&PathBuf::from("a.csv"), Some(b';')), b';');
        assert_eq!(resolve_output_delimiter(Some(Path::new("b.csv")), None, b';'), b',');
        assert_eq!(resolve_output_delimiter(None, None, b';'), b';');
    }

    #[test]
    fn transcoding_writer_handles_split_sequences() {
        let mut writer = TranscodingWriter::new(Vec::new(), WINDOWS_1252);
        let bytes = "São".as_bytes();
        writer.write_all(&bytes[..2]).unwrap();
        writer.write_all(&bytes[2..]).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.inner, vec![b'S', 0xE3, b'o']);
    }
}
