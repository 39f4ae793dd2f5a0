use crate::cli::PredictArgs;
use anyhow::{bail, Context, Result};
use ferritin_prostt5::candle::CandleBackend;
use ferritin_prostt5::fasta::{read_fasta, write_record, FastaRecord};
use ferritin_prostt5::{hub, ProstT5Model, Runtime, RuntimeOptions};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use tracing::error;

fn load_records(args: &PredictArgs) -> Result<Vec<FastaRecord>> {
    let mut records = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            read_fasta(BufReader::new(file))?
        }
        None => Vec::new(),
    };
    records.extend(
        args.sequence
            .iter()
            .enumerate()
            .map(|(i, sequence)| FastaRecord {
                header: format!("sequence_{}", i + 1),
                sequence: sequence.clone(),
            }),
    );
    if records.is_empty() {
        bail!("no sequences given, use --input or --sequence");
    }
    Ok(records)
}

pub fn execute(args: PredictArgs, verbose: bool) -> Result<()> {
    let records = load_records(&args)?;
    let options = RuntimeOptions {
        verbose,
        ..Default::default()
    };
    let runtime = Runtime::init(CandleBackend::new(), options)?;
    let model_dir = match (&args.model, &args.hub) {
        (Some(path), _) => path.clone(),
        (None, Some(repo)) => hub::fetch_model(repo, &args.revision)?,
        (None, None) => bail!("either --model or --hub is required"),
    };
    let model = ProstT5Model::load(&runtime, &model_dir, &args.device)?;
    let mut session = model.session(args.threads)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let failed = write_predictions(&mut out, &records, |sequence| session.predict(sequence))?;
    out.flush()?;

    if args.perf {
        eprintln!("{}", session.perf());
    }
    if !failed.is_empty() {
        bail!(
            "{} of {} sequences could not be predicted: {}",
            failed.len(),
            records.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

/// Write one FASTA record per complete prediction and return the headers of
/// the records whose prediction came back short.
fn write_predictions<W, F>(out: &mut W, records: &[FastaRecord], mut predict: F) -> Result<Vec<String>>
where
    W: Write,
    F: FnMut(&str) -> String,
{
    let mut failed = Vec::new();
    for record in records {
        let states = predict(&record.sequence);
        if states.len() != record.sequence.len() {
            error!(
                header = %record.header,
                residues = record.sequence.len(),
                states = states.len(),
                "incomplete prediction"
            );
            failed.push(record.header.clone());
            continue;
        }
        write_record(out, &record.header, &states)?;
    }
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(header: &str, sequence: &str) -> FastaRecord {
        FastaRecord {
            header: header.to_string(),
            sequence: sequence.to_string(),
        }
    }

    #[test]
    fn test_short_predictions_are_reported() {
        let records = [record("a", "MKV"), record("b", "MKVL"), record("c", "")];
        let mut out = Vec::new();
        // fails every sequence longer than three residues
        let failed = write_predictions(&mut out, &records, |sequence| {
            if sequence.len() > 3 {
                String::new()
            } else {
                "D".repeat(sequence.len())
            }
        })
        .unwrap();
        assert_eq!(failed, vec!["b"]);
        assert_eq!(String::from_utf8(out).unwrap(), ">a\nDDD\n>c\n\n");
    }
}
