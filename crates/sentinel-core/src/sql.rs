//! SQL template loading.
//!
//! Templates are plain `.sql` files addressed by name under a conventional
//! directory (default `sql/`). Arguments are rendered into the text with
//! minijinja before execution.

use minijinja::Environment;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{SensorError, SensorResult};

/// Loads and renders named SQL templates.
pub struct SqlTemplates {
    dir: PathBuf,
    env: Environment<'static>,
}

impl SqlTemplates {
    /// Create a loader rooted at the given directory.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            env: Environment::new(),
        }
    }

    /// Read `<dir>/<name>.sql`.
    pub fn load(&self, name: &str) -> SensorResult<String> {
        let path = self.dir.join(format!("{}.sql", name));
        std::fs::read_to_string(&path).map_err(|e| {
            SensorError::Template(format!("Cannot read {}: {}", path.display(), e))
        })
    }

    /// Load a named template and render its arguments into the text.
    /// With no arguments the file content is returned as-is.
    pub fn render(
        &self,
        name: &str,
        args: Option<&HashMap<String, serde_json::Value>>,
    ) -> SensorResult<String> {
        let sql = self.load(name)?;
        match args {
            Some(args) if !args.is_empty() => self.render_str(&sql, args),
            _ => Ok(sql),
        }
    }

    /// Render a SQL string with the given arguments.
    pub fn render_str(
        &self,
        sql: &str,
        args: &HashMap<String, serde_json::Value>,
    ) -> SensorResult<String> {
        let tmpl = self
            .env
            .template_from_str(sql)
            .map_err(|e| SensorError::Template(format!("Template parse error: {}", e)))?;

        tmpl.render(args)
            .map_err(|e| SensorError::Template(format!("Template render error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sensor.sql"),
            "SELECT MAX(updated_at) FROM events",
        )
        .unwrap();

        let templates = SqlTemplates::new(dir.path());
        let sql = templates.load("sensor").unwrap();
        assert_eq!(sql, "SELECT MAX(updated_at) FROM events");
    }

    #[test]
    fn test_load_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let templates = SqlTemplates::new(dir.path());

        let result = templates.load("nope");
        assert!(matches!(result, Err(SensorError::Template(_))));
    }

    #[test]
    fn test_render_with_args() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sensor.sql"),
            "SELECT MAX(updated_at) FROM {{ table }} WHERE region = '{{ region }}'",
        )
        .unwrap();

        let templates = SqlTemplates::new(dir.path());
        let mut args = HashMap::new();
        args.insert("table".to_string(), json!("events"));
        args.insert("region".to_string(), json!("eu-west-1"));

        let sql = templates.render("sensor", Some(&args)).unwrap();
        assert_eq!(
            sql,
            "SELECT MAX(updated_at) FROM events WHERE region = 'eu-west-1'"
        );
    }

    #[test]
    fn test_render_without_args_is_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sensor.sql"), "SELECT 1").unwrap();

        let templates = SqlTemplates::new(dir.path());
        assert_eq!(templates.render("sensor", None).unwrap(), "SELECT 1");
    }
}
