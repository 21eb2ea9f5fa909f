use std::path::PathBuf;

use anyhow::{Context, Result};

use wavelet_lab::data::generator::MackeyGenerator;

/// Write one Mackey-Glass batch to CSV: one column per sequence, one record
/// per time step.
///
/// Usage: `generate_sample [rows] [tmax] [path]`
fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let rows: usize = match args.next() {
        Some(a) => a.parse().with_context(|| format!("rows: '{a}' is not a number"))?,
        None => 8,
    };
    let tmax: usize = match args.next() {
        Some(a) => a.parse().with_context(|| format!("tmax: '{a}' is not a number"))?,
        None => 256,
    };
    let output_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("mackey_glass.csv"));

    let mut generator = MackeyGenerator::new(rows, tmax, 0.1, 42)?;
    let batch = generator.generate();

    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    let header: Vec<String> = (0..rows).map(|r| format!("series_{r}")).collect();
    writer.write_record(&header).context("writing CSV header")?;
    for t in 0..tmax {
        let record: Vec<String> = batch.iter_rows().map(|row| row[t].to_string()).collect();
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {t}"))?;
    }
    writer.flush().context("flushing CSV")?;

    log::info!("wrote {rows} sequences of {tmax} samples");
    println!(
        "Wrote {rows} Mackey-Glass sequences ({tmax} samples each) to {}",
        output_path.display()
    );
    Ok(())
}
