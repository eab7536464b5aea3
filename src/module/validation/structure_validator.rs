//! Structural validation of module directories
//!
//! A directory is a module only if both the entry-point source and the
//! metadata source exist and carry the minimal declarations. This is a
//! substring check, not a parse: it gates the expensive build/load path.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::LayoutConfig;

/// A single unmet requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Entry-point source file absent
    MissingEntrySource(PathBuf),
    /// Metadata source file absent
    MissingMetadataSource(PathBuf),
    /// Entry source does not implement the capability contract
    MissingContractImpl { file: PathBuf, marker: String },
    /// Entry source does not declare the conventional entry type
    MissingEntryType { file: PathBuf, entry_type: String },
    /// Metadata source does not implement the metadata base
    MissingMetadataBase { file: PathBuf, marker: String },
    /// Metadata source lacks a required accessor
    MissingAccessor { file: PathBuf, accessor: String },
    /// A source exists but could not be read
    Unreadable { file: PathBuf, error: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingEntrySource(path) => {
                write!(f, "missing entry-point source {}", path.display())
            }
            ValidationIssue::MissingMetadataSource(path) => {
                write!(f, "missing metadata source {}", path.display())
            }
            ValidationIssue::MissingContractImpl { file, marker } => {
                write!(f, "{} does not contain `{}`", file.display(), marker)
            }
            ValidationIssue::MissingEntryType { file, entry_type } => {
                write!(f, "{} does not declare `struct {}`", file.display(), entry_type)
            }
            ValidationIssue::MissingMetadataBase { file, marker } => {
                write!(f, "{} does not contain `{}`", file.display(), marker)
            }
            ValidationIssue::MissingAccessor { file, accessor } => {
                write!(f, "{} does not declare `fn {}`", file.display(), accessor)
            }
            ValidationIssue::Unreadable { file, error } => {
                write!(f, "cannot read {}: {}", file.display(), error)
            }
        }
    }
}

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Directory is a structurally valid module
    Valid,
    /// Directory is not a module, with every unmet requirement
    Invalid(Vec<ValidationIssue>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(issues) => issues,
        }
    }

    /// One-line summary for diagnostics
    pub fn summary(&self) -> String {
        match self {
            ValidationResult::Valid => "valid".to_string(),
            ValidationResult::Invalid(issues) => issues
                .iter()
                .map(|issue| issue.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// Structural validator for module directories
#[derive(Debug, Clone)]
pub struct StructureValidator {
    layout: LayoutConfig,
}

impl StructureValidator {
    pub fn new(layout: LayoutConfig) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Whether `dir` is a structurally valid module
    pub fn is_valid(&self, dir: &Path) -> bool {
        self.validate(dir).is_valid()
    }

    /// Validate a module directory, reporting every unmet requirement
    ///
    /// Pure read. I/O errors make the directory invalid; they are logged,
    /// never propagated.
    pub fn validate(&self, dir: &Path) -> ValidationResult {
        let mut issues = Vec::new();

        let entry_path = dir.join(&self.layout.entry_source);
        let metadata_path = dir.join(&self.layout.metadata_source);

        match self.read_source(&entry_path) {
            SourceRead::Missing => issues.push(ValidationIssue::MissingEntrySource(entry_path)),
            SourceRead::Failed(issue) => issues.push(issue),
            SourceRead::Content(content) => self.check_entry(&entry_path, &content, &mut issues),
        }

        match self.read_source(&metadata_path) {
            SourceRead::Missing => {
                issues.push(ValidationIssue::MissingMetadataSource(metadata_path))
            }
            SourceRead::Failed(issue) => issues.push(issue),
            SourceRead::Content(content) => {
                self.check_metadata(&metadata_path, &content, &mut issues)
            }
        }

        if issues.is_empty() {
            debug!("Structure validated for {:?}", dir);
            ValidationResult::Valid
        } else {
            debug!("Structure validation failed for {:?}: {:?}", dir, issues);
            ValidationResult::Invalid(issues)
        }
    }

    fn read_source(&self, path: &Path) -> SourceRead {
        if !path.is_file() {
            return SourceRead::Missing;
        }
        match fs::read_to_string(path) {
            Ok(content) => SourceRead::Content(content),
            Err(e) => {
                warn!("Failed to read module source {:?}: {}", path, e);
                SourceRead::Failed(ValidationIssue::Unreadable {
                    file: path.to_path_buf(),
                    error: e.to_string(),
                })
            }
        }
    }

    fn check_entry(&self, file: &Path, content: &str, issues: &mut Vec<ValidationIssue>) {
        if !content.contains(&self.layout.contract_marker) {
            issues.push(ValidationIssue::MissingContractImpl {
                file: file.to_path_buf(),
                marker: self.layout.contract_marker.clone(),
            });
        }
        if !declares_struct(content, &self.layout.entry_type) {
            issues.push(ValidationIssue::MissingEntryType {
                file: file.to_path_buf(),
                entry_type: self.layout.entry_type.clone(),
            });
        }
    }

    fn check_metadata(&self, file: &Path, content: &str, issues: &mut Vec<ValidationIssue>) {
        if !content.contains(&self.layout.metadata_base) {
            issues.push(ValidationIssue::MissingMetadataBase {
                file: file.to_path_buf(),
                marker: self.layout.metadata_base.clone(),
            });
        }
        for accessor in &self.layout.required_accessors {
            if !declares_fn(content, accessor) {
                issues.push(ValidationIssue::MissingAccessor {
                    file: file.to_path_buf(),
                    accessor: accessor.clone(),
                });
            }
        }
    }
}

enum SourceRead {
    Missing,
    Failed(ValidationIssue),
    Content(String),
}

/// `struct Name` followed by a non-identifier character
fn declares_struct(content: &str, name: &str) -> bool {
    declares(content, "struct", name)
}

/// `fn name` followed by a non-identifier character (`(` or `<` in practice)
fn declares_fn(content: &str, name: &str) -> bool {
    declares(content, "fn", name)
}

fn declares(content: &str, keyword: &str, name: &str) -> bool {
    let needle = format!("{} {}", keyword, name);
    content.match_indices(&needle).any(|(idx, _)| {
        let before_ok = content[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c));
        let after_ok = content[idx + needle.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_ident_char(c));
        before_ok && after_ok
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ENTRY: &str = r#"
use arcade_host::{declare_module, GameModule};

#[derive(Default)]
pub struct ModuleEntry;

impl GameModule for ModuleEntry {}
"#;

    const METADATA: &str = r#"
pub struct Info;

impl MetadataProvider for Info {
    fn name(&self) -> String { "foo".into() }
    fn version(&self) -> String { "0.1.0".into() }
    fn description(&self) -> String { String::new() }
    fn author(&self) -> String { String::new() }
}
"#;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn validator() -> StructureValidator {
        StructureValidator::new(LayoutConfig::default())
    }

    #[test]
    fn test_valid_module() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/lib.rs", ENTRY);
        write(tmp.path(), "src/metadata.rs", METADATA);
        assert_eq!(validator().validate(tmp.path()), ValidationResult::Valid);
        assert!(validator().is_valid(tmp.path()));
    }

    #[test]
    fn test_missing_both_sources() {
        let tmp = TempDir::new().unwrap();
        let result = validator().validate(tmp.path());
        assert_eq!(result.issues().len(), 2);
        assert!(matches!(result.issues()[0], ValidationIssue::MissingEntrySource(_)));
        assert!(matches!(result.issues()[1], ValidationIssue::MissingMetadataSource(_)));
    }

    #[test]
    fn test_missing_contract_impl() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/lib.rs", "pub struct ModuleEntry;\n");
        write(tmp.path(), "src/metadata.rs", METADATA);
        let result = validator().validate(tmp.path());
        assert!(!result.is_valid());
        assert!(matches!(
            result.issues(),
            [ValidationIssue::MissingContractImpl { .. }]
        ));
    }

    #[test]
    fn test_entry_type_must_match_whole_identifier() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "src/lib.rs",
            "pub struct ModuleEntryPoint;\nimpl GameModule for ModuleEntryPoint {}\n",
        );
        write(tmp.path(), "src/metadata.rs", METADATA);
        let result = validator().validate(tmp.path());
        assert!(matches!(
            result.issues(),
            [ValidationIssue::MissingEntryType { .. }]
        ));
    }

    #[test]
    fn test_missing_accessor_reported_by_name() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/lib.rs", ENTRY);
        write(
            tmp.path(),
            "src/metadata.rs",
            "impl MetadataProvider for Info { fn name(&self) {} fn version(&self) {} fn author(&self) {} }",
        );
        let result = validator().validate(tmp.path());
        assert_eq!(
            result.issues(),
            &[ValidationIssue::MissingAccessor {
                file: tmp.path().join("src/metadata.rs"),
                accessor: "description".to_string(),
            }]
        );
        assert!(result.summary().contains("fn description"));
    }

    #[test]
    fn test_declares_matching() {
        assert!(declares_fn("fn name(&self)", "name"));
        assert!(declares_fn("fn name<T>()", "name"));
        assert!(!declares_fn("fn names(&self)", "name"));
        assert!(!declares_fn("fn_name", "name"));
        assert!(declares_struct("pub struct ModuleEntry;", "ModuleEntry"));
        assert!(declares_struct("struct ModuleEntry{", "ModuleEntry"));
    }
}
