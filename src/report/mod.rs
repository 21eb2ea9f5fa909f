/// Reporting sinks: where scalar diagnostics and plotted series go.
///
/// The numerical core never prints; the experiment hands its diagnostics to a
/// [`ReportSink`].
///
/// ```text
///   Experiment ──scalars / figures──▶ ReportSink
///                                        ├─ FileReporter  stdout + PNG files
///                                        ├─ MemorySink    kept in memory
///                                        └─ NullSink      dropped
/// ```

pub mod color;
pub mod plot;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// Series / AxisScale
// ---------------------------------------------------------------------------

/// A labeled 1-D sequence for plotting.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Series {
            name: name.into(),
            values,
        }
    }
}

/// Vertical axis scaling of a figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    /// log10 of the magnitude.
    Log,
}

// ---------------------------------------------------------------------------
// ReportSink
// ---------------------------------------------------------------------------

pub trait ReportSink {
    /// A line of labeled scalar diagnostics.
    fn scalars(&mut self, label: &str, values: &[(&str, f64)]);

    /// A figure made of one or more series, identified by `name`.
    fn figure(&mut self, name: &str, series: &[Series], scale: AxisScale) -> Result<()>;
}

/// Prints scalars to stdout and writes each figure to `<out_dir>/<name>.png`.
#[derive(Debug, Clone)]
pub struct FileReporter {
    out_dir: PathBuf,
    width: u32,
    height: u32,
}

impl FileReporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;
        Ok(FileReporter {
            out_dir,
            width: 960,
            height: 540,
        })
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn figure_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(format!("{name}.png"))
    }
}

impl ReportSink for FileReporter {
    fn scalars(&mut self, label: &str, values: &[(&str, f64)]) {
        println!("{}", format_scalars(label, values));
    }

    fn figure(&mut self, name: &str, series: &[Series], scale: AxisScale) -> Result<()> {
        let path = self.figure_path(name);
        plot::save_png(&path, series, scale, self.width, self.height)?;
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        log::info!("saved {} ({})", path.display(), names.join(", "));
        Ok(())
    }
}

/// Keeps every report in memory; handy for inspecting a run programmatically.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub scalars: Vec<(String, Vec<(String, f64)>)>,
    pub figures: Vec<(String, Vec<Series>)>,
}

impl MemorySink {
    /// All recorded scalar lines carrying `label`.
    pub fn lines(&self, label: &str) -> Vec<&[(String, f64)]> {
        self.scalars
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, v)| v.as_slice())
            .collect()
    }

    pub fn figure_names(&self) -> Vec<&str> {
        self.figures.iter().map(|(n, _)| n.as_str()).collect()
    }
}

impl ReportSink for MemorySink {
    fn scalars(&mut self, label: &str, values: &[(&str, f64)]) {
        self.scalars.push((
            label.to_string(),
            values.iter().map(|&(k, v)| (k.to_string(), v)).collect(),
        ));
    }

    fn figure(&mut self, name: &str, series: &[Series], _scale: AxisScale) -> Result<()> {
        self.figures.push((name.to_string(), series.to_vec()));
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn scalars(&mut self, _label: &str, _values: &[(&str, f64)]) {}

    fn figure(&mut self, _name: &str, _series: &[Series], _scale: AxisScale) -> Result<()> {
        Ok(())
    }
}

fn format_scalars(label: &str, values: &[(&str, f64)]) -> String {
    let mut line = label.to_string();
    for (key, value) in values {
        if key.is_empty() {
            line.push_str(&format!(" {value:.6e}"));
        } else {
            line.push_str(&format!(" {key} {value:.6e}"));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_line_format() {
        assert_eq!(
            format_scalars("3", &[("", 1.5), ("mse", 0.25)]),
            "3 1.500000e0 mse 2.500000e-1"
        );
    }

    #[test]
    fn file_reporter_overwrites_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = FileReporter::new(dir.path().join("plots"))
            .unwrap()
            .with_size(100, 80);
        let s = [Series::new("a", vec![1.0, 2.0])];
        r.figure("haar", &s, AxisScale::Linear).unwrap();
        r.figure("haar", &s, AxisScale::Log).unwrap();
        assert!(r.figure_path("haar").exists());
        assert_eq!(std::fs::read_dir(r.out_dir()).unwrap().count(), 1);
    }

    #[test]
    fn memory_sink_records() {
        let mut m = MemorySink::default();
        m.scalars("step", &[("mse", 1.0)]);
        m.scalars("other", &[]);
        m.figure("fig", &[Series::new("x", vec![])], AxisScale::Linear)
            .unwrap();
        assert_eq!(m.lines("step").len(), 1);
        assert_eq!(m.lines("step")[0][0], ("mse".to_string(), 1.0));
        assert_eq!(m.figure_names(), vec!["fig"]);
    }
}
