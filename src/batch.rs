//! Loading several session files.
//!
//! Each file goes through its own [`DataLoader`] on the calling thread (or on
//! a rayon worker with the `parallel` feature). One failing file does not
//! stop the others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::classifier::SkiModeClassifier;
use crate::error::LoadError;
use crate::loader::{DataLoader, LoaderConfig};
use crate::parser::open_parser;
use crate::ski_data::SkiData;

/// Outcome of loading one file.
#[derive(Debug)]
pub struct SessionResult {
    pub path: PathBuf,
    pub result: Result<Arc<SkiData>, LoadError>,
}

impl SessionResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn data(&self) -> Option<&Arc<SkiData>> {
        self.result.as_ref().ok()
    }
}

/// Load and classify one file, choosing the decoder from its extension.
pub fn load_file(path: &Path, config: &LoaderConfig) -> Result<Arc<SkiData>, LoadError> {
    let parser = open_parser(path)?;
    let mut loader = DataLoader::builder()
        .parser(parser)
        .processor(SkiModeClassifier)
        .config(config.clone())
        .build()?;

    let state = loader.run()?;
    loader
        .get_data()
        .ok_or_else(|| LoadError::Fault(format!("load ended in state {}", state)))
}

fn load_one(path: &Path, config: &LoaderConfig) -> SessionResult {
    let result = load_file(path, config);
    match &result {
        Ok(data) => info!("[Batch] {}: {} elements", path.display(), data.len()),
        Err(e) => warn!("[Batch] {}: {}", path.display(), e),
    }
    SessionResult { path: path.to_path_buf(), result }
}

/// Load every file in order.
pub fn load_sessions<P: AsRef<Path>>(paths: &[P], config: &LoaderConfig) -> Vec<SessionResult> {
    info!("[Batch] Loading {} sessions", paths.len());
    paths.iter().map(|p| load_one(p.as_ref(), config)).collect()
}

/// Load files in parallel. Results keep the order of `paths`.
#[cfg(feature = "parallel")]
pub fn load_sessions_parallel<P: AsRef<Path> + Sync>(
    paths: &[P],
    config: &LoaderConfig,
) -> Vec<SessionResult> {
    use rayon::prelude::*;

    info!("[Batch] Loading {} sessions in parallel", paths.len());
    paths.par_iter().map(|p| load_one(p.as_ref(), config)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn session_file(dir: &TempDir, name: &str, records: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut body = String::from("# id,date,time,-,-,-,lat,long,alt,speed,x,y\n");
        for i in 0..records {
            body.push_str(&format!(
                "{},15-01-2024,09:30:{:02},,,,45.9,6.8,{},4.0,{},5084000\n",
                i + 1,
                i,
                2000 + i,
                340_000 + 2 * i
            ));
        }
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = session_file(&dir, "day1.csv", 12);
        let data = load_file(&path, &LoaderConfig::default()).unwrap();
        assert_eq!(data.len(), 12);
        assert!(data.is_sealed());
    }

    #[test]
    fn test_load_sessions_keeps_going() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            session_file(&dir, "day1.csv", 5),
            dir.path().join("notes.txt"),
            dir.path().join("missing.csv"),
            session_file(&dir, "day2.csv", 8),
        ];
        let results = load_sessions(&paths, &LoaderConfig::default());

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].data().unwrap().len(), 5);
        assert!(matches!(results[1].result, Err(LoadError::UnsupportedFormat(_))));
        assert!(matches!(results[2].result, Err(LoadError::Io(_))));
        assert_eq!(results[3].path, paths[3]);
        assert_eq!(results[3].data().unwrap().len(), 8);
    }

    #[test]
    fn test_config_is_applied() {
        let dir = TempDir::new().unwrap();
        let path = session_file(&dir, "day1.csv", 20);
        let config = LoaderConfig {
            start: 5,
            max: Some(10),
            ..LoaderConfig::default()
        };
        let data = load_file(&path, &config).unwrap();
        assert_eq!(data.len(), 10);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_matches_sequential() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| session_file(&dir, &format!("day{}.csv", i), 10 + i))
            .collect();
        let config = LoaderConfig::default();

        let sequential: Vec<usize> = load_sessions(&paths, &config)
            .iter()
            .map(|r| r.data().unwrap().len())
            .collect();
        let parallel: Vec<usize> = load_sessions_parallel(&paths, &config)
            .iter()
            .map(|r| r.data().unwrap().len())
            .collect();
        assert_eq!(sequential, parallel);
        assert_eq!(parallel, vec![10, 11, 12, 13]);
    }
}
