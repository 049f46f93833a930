//! Model discovery.
//!
//! Walks the configured source roots, parses every PHP file once into the
//! class registry, and filters the registry down to concrete Eloquent
//! models. Nothing here (or anywhere downstream) loads the audited code:
//! "is this a model" is answered by following `extends` chains through the
//! registry until a known framework base class is reached.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::php::{self, PhpClass};

/// Framework classes that make a subclass an Eloquent model.
const MODEL_BASES: &[&str] = &[
    "Illuminate\\Database\\Eloquent\\Model",
    "Illuminate\\Foundation\\Auth\\User",
    "Illuminate\\Database\\Eloquent\\Relations\\Pivot",
    "Illuminate\\Database\\Eloquent\\Relations\\MorphPivot",
];

/// Directories never worth descending into.
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", ".git", "storage"];

/// All classes parsed during a run, keyed by fully-qualified name.
///
/// The registry doubles as the per-file metadata cache: each file is parsed
/// exactly once, and every later phase (extraction, table resolution)
/// resolves classes through it.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, PhpClass>,
}

impl ClassRegistry {
    pub fn get(&self, fqcn: &str) -> Option<&PhpClass> {
        self.classes.get(fqcn)
    }

    pub fn insert(&mut self, class: PhpClass) {
        self.classes.entry(class.fqcn.clone()).or_insert(class);
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Table name for a class: its `$table` declaration, or the framework's
    /// naming convention. `None` when the class was never scanned.
    pub fn table_of(&self, fqcn: &str) -> Option<String> {
        let class = self.get(fqcn)?;
        Some(match &class.table {
            Some(table) => table.clone(),
            None => crate::naming::default_table(&class.name),
        })
    }

    /// Whether the class (transitively) extends one of the Eloquent bases.
    /// Chains through scanned classes; an unscanned parent that is not a
    /// known base ends the walk.
    pub fn is_model(&self, fqcn: &str) -> bool {
        let mut current = fqcn;
        // Bounded walk; inheritance chains deeper than this are cycles.
        for _ in 0..32 {
            let Some(class) = self.get(current) else {
                return MODEL_BASES.contains(&current);
            };
            let Some(parent) = resolve_extends(class) else {
                return false;
            };
            if MODEL_BASES.contains(&parent.as_str()) {
                return true;
            }
            match self.classes.get_key_value(&parent) {
                Some((key, _)) => current = key.as_str(),
                None => return false,
            }
        }
        false
    }
}

fn resolve_extends(class: &PhpClass) -> Option<String> {
    class.extends.as_deref().map(|token| class.resolve(token))
}

/// Scans source roots for concrete Eloquent models.
pub struct ModelScanner {
    paths: Vec<PathBuf>,
    excluded: Vec<String>,
}

impl ModelScanner {
    pub fn new(paths: Vec<PathBuf>, excluded: Vec<String>) -> Self {
        Self { paths, excluded }
    }

    /// Walk all roots and return the registry plus the de-duplicated,
    /// sorted list of concrete model class names. Roots that do not exist
    /// are skipped silently.
    pub fn scan(&self) -> (ClassRegistry, Vec<String>) {
        let mut registry = ClassRegistry::default();

        for root in &self.paths {
            if root.is_dir() {
                scan_dir(root, &mut registry);
            }
        }

        let mut models: Vec<String> = registry
            .classes
            .values()
            .filter(|c| !c.is_abstract)
            .filter(|c| !self.excluded.contains(&c.fqcn))
            .map(|c| c.fqcn.clone())
            .filter(|fqcn| registry.is_model(fqcn))
            .collect();
        models.sort();

        (registry, models)
    }
}

fn scan_dir(dir: &Path, registry: &mut ClassRegistry) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if SKIPPED_DIRS.contains(&name) {
                continue;
            }
            scan_dir(&path, registry);
        } else if path.extension().is_some_and(|ext| ext == "php") {
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            if let Some(class) = php::parse_class(&path, &contents) {
                registry.insert(class);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn fixture_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "User.php",
            "<?php\nnamespace App\\Models;\nuse Illuminate\\Database\\Eloquent\\Model;\nclass User extends Model {}\n",
        );
        write(
            dir.path(),
            "Admin.php",
            "<?php\nnamespace App\\Models;\nclass Admin extends User {}\n",
        );
        write(
            dir.path(),
            "BaseModel.php",
            "<?php\nnamespace App\\Models;\nuse Illuminate\\Database\\Eloquent\\Model;\nabstract class BaseModel extends Model {}\n",
        );
        write(
            dir.path(),
            "Helper.php",
            "<?php\nnamespace App\\Support;\nclass Helper {}\n",
        );
        write(
            dir.path(),
            "vendor/Ignored.php",
            "<?php\nnamespace Vendor;\nuse Illuminate\\Database\\Eloquent\\Model;\nclass Ignored extends Model {}\n",
        );
        dir
    }

    #[test]
    fn test_finds_concrete_models_only() {
        let dir = fixture_tree();
        let scanner = ModelScanner::new(vec![dir.path().to_path_buf()], vec![]);
        let (_, models) = scanner.scan();

        assert_eq!(
            models,
            vec!["App\\Models\\Admin".to_string(), "App\\Models\\User".to_string()]
        );
    }

    #[test]
    fn test_transitive_inheritance_through_scanned_classes() {
        let dir = fixture_tree();
        let scanner = ModelScanner::new(vec![dir.path().to_path_buf()], vec![]);
        let (registry, _) = scanner.scan();

        assert!(registry.is_model("App\\Models\\Admin"));
        assert!(registry.is_model("App\\Models\\BaseModel"));
        assert!(!registry.is_model("App\\Support\\Helper"));
    }

    #[test]
    fn test_exclusion_list() {
        let dir = fixture_tree();
        let scanner = ModelScanner::new(
            vec![dir.path().to_path_buf()],
            vec!["App\\Models\\Admin".to_string()],
        );
        let (_, models) = scanner.scan();
        assert_eq!(models, vec!["App\\Models\\User".to_string()]);
    }

    #[test]
    fn test_missing_root_is_skipped() {
        let scanner = ModelScanner::new(vec![PathBuf::from("/does/not/exist")], vec![]);
        let (registry, models) = scanner.scan();
        assert!(registry.is_empty());
        assert!(models.is_empty());
    }

    #[test]
    fn test_duplicate_roots_collapse() {
        let dir = fixture_tree();
        let root = dir.path().to_path_buf();
        let scanner = ModelScanner::new(vec![root.clone(), root], vec![]);
        let (_, models) = scanner.scan();
        assert_eq!(models.len(), 2);
    }

    #[test]
    fn test_table_of_uses_declaration_then_convention() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Post.php",
            "<?php\nnamespace App\\Models;\nuse Illuminate\\Database\\Eloquent\\Model;\nclass Post extends Model {\n protected $table = 'articles';\n}\n",
        );
        write(
            dir.path(),
            "Category.php",
            "<?php\nnamespace App\\Models;\nuse Illuminate\\Database\\Eloquent\\Model;\nclass Category extends Model {}\n",
        );
        let scanner = ModelScanner::new(vec![dir.path().to_path_buf()], vec![]);
        let (registry, _) = scanner.scan();

        assert_eq!(registry.table_of("App\\Models\\Post").as_deref(), Some("articles"));
        assert_eq!(
            registry.table_of("App\\Models\\Category").as_deref(),
            Some("categories")
        );
        assert_eq!(registry.table_of("App\\Models\\Nope"), None);
    }
}
