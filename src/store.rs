use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;

const ID_LOG: &str = "receipt_ids.txt";

/// Flat output directory holding the id log, one `<id>.html` per fetched
/// receipt and one `<id>.json` per analyzed receipt. The existence of a file
/// is the only "already processed" marker.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .context(format!("could not create output directory {:?}", dir))?;
        Ok(Store { dir: dir.into() })
    }

    /// Appends one id to the log. The log is append-only: duplicates are
    /// allowed and order is discovery order.
    pub fn append_id(&self, id: &str) -> anyhow::Result<()> {
        let path = self.dir.join(ID_LOG);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("could not open id log {:?}", path))?;
        writeln!(file, "{}", id)?;
        Ok(())
    }

    /// Returns all logged ids in log order. Blank lines are skipped.
    pub fn read_ids(&self) -> anyhow::Result<Vec<String>> {
        let path = self.dir.join(ID_LOG);
        let content =
            fs::read_to_string(&path).context(format!("could not read id log {:?}", path))?;
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.trim().to_string())
            .collect())
    }

    pub fn has_raw(&self, id: &str) -> bool {
        self.raw_path(id).exists()
    }

    pub fn write_raw(&self, id: &str, html: &str) -> anyhow::Result<()> {
        let path = self.raw_path(id);
        fs::write(&path, html).context(format!("could not write receipt {:?}", path))
    }

    pub fn read_raw(&self, id: &str) -> anyhow::Result<String> {
        let path = self.raw_path(id);
        fs::read_to_string(&path).context(format!("could not read receipt {:?}", path))
    }

    pub fn has_analysis(&self, id: &str) -> bool {
        self.analysis_path(id).exists()
    }

    pub fn write_analysis(&self, id: &str, analysis: &str) -> anyhow::Result<()> {
        let path = self.analysis_path(id);
        fs::write(&path, analysis).context(format!("could not write analysis {:?}", path))
    }

    /// Returns the content of every analysis record in the output directory,
    /// ordered by file name.
    pub fn read_all_analyses(&self) -> anyhow::Result<Vec<String>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .context(format!("could not read output directory {:?}", self.dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();
        paths
            .into_iter()
            .map(|path| {
                fs::read_to_string(&path).context(format!("could not read analysis {:?}", path))
            })
            .collect()
    }

    fn raw_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.html", id))
    }

    fn analysis_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}
