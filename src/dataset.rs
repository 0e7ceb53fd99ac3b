use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Depth of session directories below the dataset root: iteration/subject/session.
const SESSION_DEPTH: usize = 3;

/// One recording session discovered in the dataset tree.
///
/// The string identifiers are for display and logging only; output paths are
/// built from `rel`, which keeps the directory names byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionDescriptor {
    pub iteration: String,
    pub subject: String,
    pub session: String,
    pub path: PathBuf,
    pub rel: PathBuf,
}

impl SessionDescriptor {
    /// Derive identifiers from the three path components below `root`.
    ///
    /// Returns `None` unless `path` sits exactly three levels under `root`.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let rel = path.strip_prefix(root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        match parts.as_slice() {
            [iteration, subject, session] => Some(Self {
                iteration: iteration.clone(),
                subject: subject.clone(),
                session: session.clone(),
                path: path.to_path_buf(),
                rel: rel.to_path_buf(),
            }),
            _ => None,
        }
    }

    /// Location of this session relative to a dataset root.
    pub fn relative_dir(&self) -> &Path {
        &self.rel
    }

    pub fn ecg_path(&self) -> PathBuf {
        self.path.join(crate::ECG_FILE_NAME)
    }
}

impl fmt::Display for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.iteration, self.subject, self.session)
    }
}

/// Enumerates iteration → subject → session directories under a dataset root.
#[derive(Debug, Clone)]
pub struct DatasetWalker {
    root: PathBuf,
}

impl DatasetWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh, lazy pass over the tree. Non-directories are skipped silently.
    pub fn sessions(&self) -> impl Iterator<Item = SessionDescriptor> + '_ {
        WalkDir::new(&self.root)
            .min_depth(SESSION_DEPTH)
            .max_depth(SESSION_DEPTH)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) => Some(e),
                Err(err) => {
                    log::warn!("Skipping unreadable entry under {}: {}", self.root.display(), err);
                    None
                }
            })
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| SessionDescriptor::from_path(&self.root, e.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(walker: &DatasetWalker) -> Vec<String> {
        walker.sessions().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_walks_three_levels() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("iteration_01/abc123/POLAR_1")).unwrap();
        fs::create_dir_all(root.join("iteration_01/abc123/POLAR_2")).unwrap();
        fs::create_dir_all(root.join("iteration_02/def456/POLAR_1")).unwrap();
        // Deeper directories are not sessions.
        fs::create_dir_all(root.join("iteration_02/def456/POLAR_1/nested")).unwrap();

        let walker = DatasetWalker::new(root);
        assert_eq!(
            names(&walker),
            vec![
                "iteration_01/abc123/POLAR_1",
                "iteration_01/abc123/POLAR_2",
                "iteration_02/def456/POLAR_1",
            ]
        );
    }

    #[test]
    fn test_skips_files_at_every_level() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("iteration_01/abc123/POLAR_1")).unwrap();
        fs::write(root.join("README.txt"), "x").unwrap();
        fs::write(root.join("iteration_01/notes.txt"), "x").unwrap();
        fs::write(root.join("iteration_01/abc123/archive.zip"), "x").unwrap();

        let walker = DatasetWalker::new(root);
        assert_eq!(names(&walker), vec!["iteration_01/abc123/POLAR_1"]);
    }

    #[test]
    fn test_restartable() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("i/s/x")).unwrap();
        let walker = DatasetWalker::new(tmp.path());
        assert_eq!(walker.sessions().count(), 1);
        assert_eq!(walker.sessions().count(), 1);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let walker = DatasetWalker::new("/nonexistent/dataset/root");
        assert_eq!(walker.sessions().count(), 0);
    }

    #[test]
    fn test_from_path() {
        let d = SessionDescriptor::from_path(Path::new("/data"), Path::new("/data/it/subj/sess")).unwrap();
        assert_eq!(d.iteration, "it");
        assert_eq!(d.subject, "subj");
        assert_eq!(d.session, "sess");
        assert_eq!(d.relative_dir(), Path::new("it/subj/sess"));
        assert!(SessionDescriptor::from_path(Path::new("/data"), Path::new("/data/it/subj")).is_none());
        assert!(SessionDescriptor::from_path(Path::new("/other"), Path::new("/data/it/subj/sess")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_session_keeps_real_path() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        let session_dir = tmp.path().join("it/subj").join(OsStr::from_bytes(b"sess\xff"));
        fs::create_dir_all(&session_dir).unwrap();

        let walker = DatasetWalker::new(tmp.path());
        let d = walker.sessions().next().unwrap();
        assert_eq!(d.path, session_dir);
        assert_eq!(tmp.path().join(d.relative_dir()), session_dir);
        assert_eq!(d.ecg_path().parent(), Some(session_dir.as_path()));
    }
}
