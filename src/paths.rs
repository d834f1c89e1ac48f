use std::path::{Path, PathBuf};

/// On-disk layout of a data directory.
///
/// ```text
/// <root>/manifest.jsonl
/// <root>/cases/<case_id>.comments.jsonl
/// <root>/cases/<case_id>.metrics.json
/// <root>/runs/<stage>.summary.json
/// <reports>/<case_id>.html, <reports>/index.html
/// ```
#[derive(Clone, Debug)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join("manifest.jsonl")
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.root.join("cases")
    }

    pub fn dataset(&self, case_id: &str) -> PathBuf {
        self.cases_dir().join(format!("{}.comments.jsonl", safe_stem(case_id)))
    }

    pub fn metrics(&self, case_id: &str) -> PathBuf {
        self.cases_dir().join(format!("{}.metrics.json", safe_stem(case_id)))
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    pub fn run_summary(&self, stage: &str) -> PathBuf {
        self.runs_dir().join(format!("{stage}.summary.json"))
    }

    /// Default report directory when none is given on the command line.
    pub fn default_reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    /// A case counts as processed once both outputs exist. The metrics file is
    /// written last, so its presence implies a complete dataset.
    pub fn is_processed(&self, case_id: &str) -> bool {
        self.dataset(case_id).is_file() && self.metrics(case_id).is_file()
    }
}

pub fn report_page(out_dir: &Path, case_id: &str) -> PathBuf {
    out_dir.join(format!("{}.html", safe_stem(case_id)))
}

pub fn report_index(out_dir: &Path) -> PathBuf {
    out_dir.join("index.html")
}

/// Reddit ids are base36, but the manifest is user-editable input.
pub fn safe_stem(id: &str) -> String {
    let s: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if s.is_empty() { "_".to_string() } else { s }
}
