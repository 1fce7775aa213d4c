//! Plain-text paper reports.
//!
//! Every report is rendered in memory and written in one shot, replacing any
//! previous file at the same path.

use crate::error::Result;
use crate::paperswithcode::Paper;
use crate::pipeline::{IndexSet, StageOutcome};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Run folder name format, e.g. `2023-06-20 15_58_51`
pub const RUN_FOLDER_FORMAT: &str = "%Y-%m-%d %H_%M_%S";

/// Report layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// One line per paper: index, title, publication date
    Compact,
    /// Index, title, date and abstract on separate lines, blank line between papers
    #[default]
    Detailed,
}

fn or_none<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "None".to_string())
}

/// Render the papers at `indices`, in that order.
pub fn render_subset(dataset: &[Paper], indices: &[usize], verbosity: Verbosity) -> String {
    let mut content = String::new();
    for &i in indices {
        let paper = &dataset[i];
        let published = or_none(paper.published);
        let entry = match verbosity {
            Verbosity::Compact => format!("{} {}, {}\n", i, paper.title, published),
            Verbosity::Detailed => format!(
                "{}\n{}\n{}\n{}\n\n",
                i,
                paper.title,
                published,
                or_none(paper.abstract_text.as_deref())
            ),
        };
        content.push_str(&entry);
    }
    content
}

/// Write the papers at `indices` to `path`, overwriting it.
pub fn write_subset(dataset: &[Paper], indices: &[usize], path: &Path, verbosity: Verbosity) -> Result<()> {
    let content = render_subset(dataset, indices, verbosity);
    std::fs::write(path, content.as_bytes())?;
    debug!(path = %path.display(), papers = indices.len(), "Saved report");
    Ok(())
}

/// Create `{output_dir}/{timestamp}` for one run's reports and transcript.
pub fn create_run_folder<Tz>(output_dir: &Path, now: &DateTime<Tz>) -> Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let folder = output_dir.join(now.format(RUN_FOLDER_FORMAT).to_string());
    std::fs::create_dir_all(&folder)?;
    Ok(folder)
}

/// Writes the numbered stage reports of one run
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    verbosity: Verbosity,
}

impl ReportWriter {
    pub fn new(dir: &Path, verbosity: Verbosity) -> Self {
        Self {
            dir: dir.to_path_buf(),
            verbosity,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `papers_list_1.txt`: the unfiltered listing
    pub fn write_listing(&self, dataset: &[Paper], all: &IndexSet) -> Result<()> {
        write_subset(dataset, all.as_slice(), &self.dir.join("papers_list_1.txt"), self.verbosity)
    }

    /// `papers_list_{n}.txt` and `discard_list_{n}.txt` for one stage
    pub fn write_stage(&self, dataset: &[Paper], number: u8, outcome: &StageOutcome) -> Result<()> {
        write_subset(
            dataset,
            outcome.survivors.as_slice(),
            &self.dir.join(format!("papers_list_{}.txt", number)),
            self.verbosity,
        )?;
        write_subset(
            dataset,
            outcome.discards.as_slice(),
            &self.dir.join(format!("discard_list_{}.txt", number)),
            self.verbosity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn dataset() -> Vec<Paper> {
        vec![
            Paper {
                id: "a".to_string(),
                title: "Neural Fields".to_string(),
                abstract_text: Some("We fit fields.".to_string()),
                published: NaiveDate::from_ymd_opt(2022, 3, 1),
                ..Default::default()
            },
            Paper {
                id: "b".to_string(),
                title: "Untitled Draft".to_string(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_render_compact() {
        let text = render_subset(&dataset(), &[1, 0], Verbosity::Compact);
        assert_eq!(text, "1 Untitled Draft, None\n0 Neural Fields, 2022-03-01\n");
    }

    #[test]
    fn test_render_detailed() {
        let text = render_subset(&dataset(), &[0, 1], Verbosity::Detailed);
        assert_eq!(
            text,
            "0\nNeural Fields\n2022-03-01\nWe fit fields.\n\n1\nUntitled Draft\nNone\nNone\n\n"
        );
    }

    #[test]
    fn test_write_subset_overwrites() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("papers_list_1.txt");
        std::fs::write(&path, "stale content that is longer than the report")?;

        write_subset(&dataset(), &[0], &path, Verbosity::Compact)?;
        assert_eq!(std::fs::read_to_string(&path)?, "0 Neural Fields, 2022-03-01\n");

        write_subset(&dataset(), &[], &path, Verbosity::Compact)?;
        assert_eq!(std::fs::read_to_string(&path)?, "");
        Ok(())
    }

    #[test]
    fn test_create_run_folder_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let now = Utc.with_ymd_and_hms(2023, 6, 20, 15, 58, 51).single().expect("valid time");
        let folder = create_run_folder(dir.path(), &now)?;
        assert!(folder.is_dir());
        assert_eq!(folder.file_name().and_then(|n| n.to_str()), Some("2023-06-20 15_58_51"));
        Ok(())
    }

    #[test]
    fn test_writer_stage_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = ReportWriter::new(dir.path(), Verbosity::Compact);
        let outcome = StageOutcome {
            survivors: vec![0].into_iter().collect(),
            discards: vec![1].into_iter().collect(),
        };
        writer.write_stage(&dataset(), 3, &outcome)?;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("papers_list_3.txt"))?,
            "0 Neural Fields, 2022-03-01\n"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("discard_list_3.txt"))?,
            "1 Untitled Draft, None\n"
        );
        Ok(())
    }
}
