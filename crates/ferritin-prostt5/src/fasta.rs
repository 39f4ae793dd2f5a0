//! Minimal FASTA reading and writing for the CLI.
use anyhow::{bail, Result};
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Header line without the leading `>`.
    pub header: String,
    pub sequence: String,
}

/// Parse all records. Blank lines and `;` comments are ignored, sequence
/// lines are concatenated with whitespace removed.
pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>> {
    let mut records: Vec<FastaRecord> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            records.push(FastaRecord {
                header: header.trim().to_string(),
                sequence: String::new(),
            });
            continue;
        }
        match records.last_mut() {
            Some(record) => record
                .sequence
                .extend(line.chars().filter(|c| !c.is_whitespace())),
            None => bail!("line {}: sequence data before the first header", lineno + 1),
        }
    }
    Ok(records)
}

pub fn write_record<W: Write>(out: &mut W, header: &str, sequence: &str) -> std::io::Result<()> {
    writeln!(out, ">{header}")?;
    writeln!(out, "{sequence}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_records() {
        let input = "; comment\n>sp|P69905|HBA_HUMAN Hemoglobin\nMVLSPADKTN\nVKAAWGKVGA \n\n>empty\n>second\nmkl\n";
        let records = read_fasta(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].header, "sp|P69905|HBA_HUMAN Hemoglobin");
        assert_eq!(records[0].sequence, "MVLSPADKTNVKAAWGKVGA");
        assert_eq!(records[1].sequence, "");
        assert_eq!(records[2].sequence, "mkl");
    }

    #[test]
    fn test_sequence_before_header() {
        let err = read_fasta("MKL\n>a\nMKL\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_write_record() {
        let mut out = Vec::new();
        write_record(&mut out, "a", "DDPV").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), ">a\nDDPV\n");
    }
}
