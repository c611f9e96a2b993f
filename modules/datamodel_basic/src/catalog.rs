use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("data class name must not be empty")]
    EmptyName,
    #[error("data class '{0}' is declared twice")]
    Duplicate(String),
    #[error("project extension must be a bare extension, got '{0}'")]
    BadExtension(String),
}

/// Registered data classes plus the project package extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCatalog {
    classes: BTreeSet<String>,
    project_extension: String,
}

impl ClassCatalog {
    pub fn new<I, S>(classes: I, project_extension: &str) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ext = project_extension.trim().trim_start_matches('.');
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(CatalogError::BadExtension(project_extension.to_string()));
        }

        let mut set = BTreeSet::new();
        for class in classes {
            let name = class.as_ref().trim();
            if name.is_empty() {
                return Err(CatalogError::EmptyName);
            }
            if !set.insert(name.to_string()) {
                return Err(CatalogError::Duplicate(name.to_string()));
            }
        }

        Ok(Self {
            classes: set,
            project_extension: ext.to_ascii_lowercase(),
        })
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    /// Class names, ascending.
    pub fn names(&self) -> Vec<String> {
        self.classes.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn project_extension(&self) -> &str {
        &self.project_extension
    }

    /// `true` for `name.<ext>` (case-insensitive extension).
    pub fn is_project_file(&self, file_name: &str) -> bool {
        file_name
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case(&self.project_extension))
    }
}
