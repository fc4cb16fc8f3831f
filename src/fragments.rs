//! Fragment sets and their materialization on disk.
//!
//! A fragment is a named unit of source text. Its qualifier (`com.example.Foo`)
//! decides where it lands under the scratch root: every segment before the last
//! dot becomes a directory and the last segment plus the source extension
//! becomes the file name (`com/example/Foo.java`).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::errors::HarnessError;

/// One named unit of input source text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fragment {
    pub name: String,
    pub source: String,
}

impl Fragment {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// The qualifier with a trailing `.<source_extension>` removed, so both
    /// `X` and `X.java` name the type `X`.
    pub fn qualified_name<'a>(&'a self, source_extension: &str) -> &'a str {
        self.name
            .strip_suffix(source_extension)
            .and_then(|rest| rest.strip_suffix('.'))
            .unwrap_or(&self.name)
    }

    /// The path of this fragment relative to the scratch root.
    pub fn relative_path(&self, source_extension: &str) -> Result<PathBuf, HarnessError> {
        let qualified = self.qualified_name(source_extension);
        let invalid = |reason: &str| HarnessError::InvalidFragment {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if qualified.is_empty() {
            return Err(invalid("qualifier is empty"));
        }

        let segments: Vec<&str> = qualified.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("qualifier has an empty segment"));
        }
        if segments
            .iter()
            .any(|s| s.contains(['/', '\\']) || *s == "..")
        {
            return Err(invalid("qualifier segments must not contain path separators"));
        }

        let (file, dirs) = segments.split_last().ok_or_else(|| invalid("no file segment"))?;
        let mut path: PathBuf = dirs.iter().collect();
        path.push(format!("{file}.{source_extension}"));
        Ok(path)
    }
}

/// An ordered set of fragments with unique qualifier names.
///
/// Order matters: the first fragment is the primary type, and the artifact
/// name is derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<Fragment>")]
pub struct FragmentSet {
    fragments: Vec<Fragment>,
}

impl FragmentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(qualifier, source)` pairs, rejecting duplicates.
    pub fn from_pairs<I, N, S>(pairs: I) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut set = Self::new();
        for (name, source) in pairs {
            set.push(Fragment::new(name, source))?;
        }
        Ok(set)
    }

    pub fn push(&mut self, fragment: Fragment) -> Result<(), HarnessError> {
        if self.fragments.iter().any(|f| f.name == fragment.name) {
            return Err(HarnessError::InvalidFragment {
                name: fragment.name,
                reason: "qualifier appears more than once".to_string(),
            });
        }
        self.fragments.push(fragment);
        Ok(())
    }

    pub fn primary(&self) -> Option<&Fragment> {
        self.fragments.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fragment> {
        self.fragments.iter()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Check that every qualifier maps to a distinct path.
    ///
    /// `X` and `X.java` are different qualifiers but the same file.
    pub fn validate(&self, source_extension: &str) -> Result<(), HarnessError> {
        let mut seen = HashSet::new();
        for fragment in &self.fragments {
            let path = fragment.relative_path(source_extension)?;
            if !seen.insert(path) {
                return Err(HarnessError::InvalidFragment {
                    name: fragment.name.clone(),
                    reason: "maps to the same file as an earlier fragment".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl TryFrom<Vec<Fragment>> for FragmentSet {
    type Error = HarnessError;

    fn try_from(fragments: Vec<Fragment>) -> Result<Self, Self::Error> {
        let mut set = Self::new();
        for fragment in fragments {
            set.push(fragment)?;
        }
        Ok(set)
    }
}

impl<'a> IntoIterator for &'a FragmentSet {
    type Item = &'a Fragment;
    type IntoIter = std::slice::Iter<'a, Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.iter()
    }
}

/// A fragment written to disk under the scratch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Write every fragment under `root`, creating parent directories.
///
/// Returns the files in the same order as the set. Any write failure is fatal
/// for the case.
pub fn materialize(
    fragments: &FragmentSet,
    root: &Path,
    source_extension: &str,
) -> Result<Vec<MaterializedFile>, HarnessError> {
    fragments.validate(source_extension)?;
    let mut files = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let path = root.join(fragment.relative_path(source_extension)?);
        let failed = |source| HarnessError::Materialization {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(failed)?;
        }
        fs::write(&path, &fragment.source).map_err(failed)?;
        debug!(path = %path.display(), bytes = fragment.source.len(), "materialized fragment");
        files.push(MaterializedFile {
            path,
            content: fragment.source.clone(),
        });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn qualifier_segments_become_directories() {
        let f = Fragment::new("com.example.Foo", "class Foo {}");
        assert_eq!(
            f.relative_path("java").unwrap(),
            PathBuf::from("com").join("example").join("Foo.java")
        );
    }

    #[test]
    fn existing_extension_is_not_doubled() {
        let f = Fragment::new("X.java", "public class X {}");
        assert_eq!(f.relative_path("java").unwrap(), PathBuf::from("X.java"));
        assert_eq!(f.qualified_name("java"), "X");
    }

    #[test]
    fn empty_segments_are_rejected() {
        let f = Fragment::new("com..Foo", "");
        assert!(matches!(
            f.relative_path("java"),
            Err(HarnessError::InvalidFragment { .. })
        ));
        assert!(Fragment::new("", "").relative_path("java").is_err());
    }

    #[test]
    fn separators_are_rejected() {
        assert!(Fragment::new("../etc/passwd", "").relative_path("java").is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = FragmentSet::from_pairs([("X", "a"), ("X", "b")]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn colliding_paths_are_rejected() {
        let set = FragmentSet::from_pairs([("X", "a"), ("X.java", "b")]).unwrap();
        assert!(set.validate("java").is_err());
    }

    #[test]
    fn materialize_preserves_order_and_content() {
        let temp = TempDir::new().unwrap();
        let set = FragmentSet::from_pairs([
            ("X.java", "public class X {}"),
            ("pkg.Helper", "class Helper {}"),
        ])
        .unwrap();

        let files = materialize(&set, temp.path(), "java").unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, temp.path().join("X.java"));
        assert_eq!(files[1].path, temp.path().join("pkg").join("Helper.java"));
        assert_eq!(
            fs::read_to_string(&files[1].path).unwrap(),
            "class Helper {}"
        );
    }

    #[test]
    fn materialize_into_a_file_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("pkg");
        fs::write(&blocker, "not a directory").unwrap();
        let set = FragmentSet::from_pairs([("pkg.Foo", "class Foo {}")]).unwrap();

        let err = materialize(&set, temp.path(), "java").unwrap_err();
        assert!(matches!(err, HarnessError::Materialization { .. }));
    }

    #[test]
    fn deserializes_from_yaml_list() {
        let set: FragmentSet =
            serde_yaml::from_str("- name: X\n  source: class X {}\n").unwrap();
        assert_eq!(set.primary().unwrap().name, "X");
    }
}
