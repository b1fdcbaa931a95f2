//! Where avatar templates come from. Discovery policy lives here so the
//! matcher only ever sees loaded templates.

use std::path::{Path, PathBuf};

use crate::logger;
use crate::matcher::Template;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Supplies the candidate templates for one search.
pub trait TemplateProvider {
    fn templates(&self) -> Vec<Template>;
}

/// Loads each path, logging and skipping the ones that fail.
fn load_all(paths: &[PathBuf]) -> Vec<Template> {
    paths
        .iter()
        .filter_map(|p| match Template::load(p) {
            Ok(t) => Some(t),
            Err(e) => {
                logger::error_p("templates", &e.to_string());
                None
            }
        })
        .collect()
}

/// Every image file directly inside a directory, sorted by name.
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    pub dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_image_path(p))
            .collect();
        paths.sort();
        paths
    }
}

impl TemplateProvider for DirectoryTemplates {
    fn templates(&self) -> Vec<Template> {
        load_all(&self.paths())
    }
}

/// A fixed list of template files.
#[derive(Debug, Clone)]
pub struct ExplicitTemplates {
    pub paths: Vec<PathBuf>,
}

impl ExplicitTemplates {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl TemplateProvider for ExplicitTemplates {
    fn templates(&self) -> Vec<Template> {
        load_all(&self.paths)
    }
}

/// Templates already in memory.
impl TemplateProvider for Vec<Template> {
    fn templates(&self) -> Vec<Template> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::noise;

    #[test]
    fn directory_lists_images_only_sorted() {
        let dir = tempfile::tempdir().unwrap();
        noise(4, 4, 1).save(dir.path().join("b.png")).unwrap();
        noise(4, 4, 2).save(dir.path().join("a.png")).unwrap();
        std::fs::rename(dir.path().join("a.png"), dir.path().join("a.PNG")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub.png")).unwrap();

        let provider = DirectoryTemplates::new(dir.path());
        let ids: Vec<String> = provider.templates().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["a.PNG", "b.png"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let provider = DirectoryTemplates::new("/definitely/not/here");
        assert!(provider.templates().is_empty());
    }

    #[test]
    fn explicit_skips_unloadable() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        noise(4, 4, 3).save(&good).unwrap();
        let provider = ExplicitTemplates::new(vec![dir.path().join("missing.png"), good]);
        let loaded = provider.templates();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "good.png");
    }
}
