use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps writes inside the project and out of build output and the NuGet
/// package cache.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    /// Absolute path to project root
    project_root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Path has no parent directory: {0}")]
    NoParent(PathBuf),

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl ProjectGuard {
    /// Create a new guard rooted at `project_root`, canonicalized so that
    /// symlinks cannot be used to escape it.
    pub fn new(project_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let project_root = project_root.as_ref().canonicalize()?;

        let mut forbidden_paths = Vec::new();

        // ~/.nuget/packages - restored package sources
        if let Some(home) = home::home_dir() {
            if let Ok(nuget_cache) = home.join(".nuget/packages").canonicalize() {
                forbidden_paths.push(nuget_cache);
            }
        }

        // bin/ and obj/ within the project
        for build_dir in ["bin", "obj"] {
            if let Ok(dir) = project_root.join(build_dir).canonicalize() {
                forbidden_paths.push(dir);
            }
        }

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Check that an existing file may be edited.
    ///
    /// Returns the canonicalized absolute path if safe.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let canonical = self.absolute(path.as_ref()).canonicalize()?;
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    /// Check that a file which may not exist yet may be created.
    ///
    /// The parent directory must exist; it is canonicalized and checked in
    /// place of the file.
    pub fn validate_new_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let absolute = self.absolute(path.as_ref());
        if absolute.exists() {
            return self.validate_path(&absolute);
        }

        let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
            return Err(SafetyError::NoParent(absolute));
        };
        let canonical = parent.canonicalize()?.join(name);
        self.check_canonical(&canonical)?;
        Ok(canonical)
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.project_root) {
            return Err(SafetyError::OutsideProject {
                path: canonical.to_path_buf(),
                project: self.project_root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Create a guard with custom forbidden paths (for testing).
    #[cfg(test)]
    pub fn with_forbidden(
        project_root: impl AsRef<Path>,
        forbidden: Vec<PathBuf>,
    ) -> Result<Self, SafetyError> {
        let project_root = project_root.as_ref().canonicalize()?;
        Ok(Self {
            project_root,
            forbidden_paths: forbidden,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_path_inside_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        let guard = ProjectGuard::new(project).unwrap();

        let file = project.join("Data/BlogContext.cs");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        assert!(guard.validate_path(&file).is_ok());
        assert!(guard.validate_path("Data/BlogContext.cs").is_ok());
    }

    #[test]
    fn test_validate_path_outside_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("project");
        fs::create_dir_all(&project).unwrap();
        let guard = ProjectGuard::new(&project).unwrap();

        let outside = temp_dir.path().join("Outside.cs");
        fs::write(&outside, b"").unwrap();

        let result = guard.validate_path(&outside);
        assert!(matches!(result, Err(SafetyError::OutsideProject { .. })));
    }

    #[test]
    fn test_build_output_is_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        fs::create_dir_all(project.join("obj/Debug")).unwrap();
        let guard = ProjectGuard::new(project).unwrap();

        let file = project.join("obj/Debug/Generated.cs");
        fs::write(&file, b"").unwrap();

        let result = guard.validate_path(&file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_custom_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        let forbidden = project.join("packages");
        fs::create_dir_all(&forbidden).unwrap();
        let guard = ProjectGuard::with_forbidden(project, vec![forbidden.canonicalize().unwrap()])
            .unwrap();

        let result = guard.validate_new_path(forbidden.join("New.cs"));
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_new_file_in_project() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path();
        fs::create_dir_all(project.join("Data")).unwrap();
        let guard = ProjectGuard::new(project).unwrap();

        let validated = guard.validate_new_path("Data/ShopContext.cs").unwrap();
        assert!(validated.ends_with("Data/ShopContext.cs"));
        assert!(guard.validate_new_path("Missing/ShopContext.cs").is_err());
    }

    #[test]
    #[cfg(unix)]
    fn test_validate_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let project = temp_dir.path().join("project");
        fs::create_dir_all(&project).unwrap();

        let outside = temp_dir.path().join("Outside.cs");
        fs::write(&outside, b"").unwrap();

        let link = project.join("Escape.cs");
        symlink(&outside, &link).unwrap();

        let guard = ProjectGuard::new(&project).unwrap();
        let result = guard.validate_path(&link);

        assert!(matches!(result, Err(SafetyError::OutsideProject { .. })));
    }
}
