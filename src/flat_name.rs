use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

/// Assigns collision-free names inside one flat directory.
///
/// A name is taken when it was handed out earlier in this run or a file of
/// that name already exists in the target directory. Collisions become
/// `base_1.ext`, `base_2.ext`, ... where `base`/`ext` come from splitting the
/// original name at its last `.`.
#[derive(Debug)]
pub struct FlatNamer {
    target_dir: PathBuf,
    used: HashSet<String>,
}

impl FlatNamer {
    pub fn new(target_dir: &Path) -> Self {
        Self {
            target_dir: target_dir.to_path_buf(),
            used: HashSet::new(),
        }
    }

    /// Claim a unique name derived from `file_name`.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use codevec::flat_name::FlatNamer;
    ///
    /// let mut namer = FlatNamer::new(tmp.path());
    /// assert_eq!(namer.claim("util.py"), "util.py");
    /// assert_eq!(namer.claim("util.py"), "util_1.py");
    /// assert_eq!(namer.claim("util.py"), "util_2.py");
    /// ```
    pub fn claim(&mut self, file_name: &str) -> String {
        let (base, ext) = split_extension(file_name);
        let mut candidate = file_name.to_string();
        let mut counter = 1usize;

        while self.is_taken(&candidate) {
            candidate = format!("{base}_{counter}{ext}");
            counter += 1;
        }

        self.used.insert(candidate.clone());
        candidate
    }

    fn is_taken(&self, name: &str) -> bool {
        self.used.contains(name) || self.target_dir.join(name).exists()
    }
}

/// Split a file name at its last extension separator.
///
/// The extension keeps its leading dot. Leading dots (hidden files such as
/// `.bashrc`) are part of the base, not an extension.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    let stem_start = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[stem_start..].rfind('.') {
        Some(pos) => file_name.split_at(stem_start + pos),
        None => (file_name, ""),
    }
}
