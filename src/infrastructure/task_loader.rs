//! Task file loading.
//!
//! `.yaml`/`.yml` files are read as YAML, everything else as JSON.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::models::EvaluationTask;

pub struct TaskLoader;

impl TaskLoader {
    pub fn load(path: impl AsRef<Path>) -> Result<EvaluationTask> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read task file {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let task = if is_yaml {
            EvaluationTask::from_yaml_str(&text)
        } else {
            EvaluationTask::from_json_str(&text)
        };
        task.with_context(|| format!("Invalid task file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::TaskConfigError;
    use crate::domain::models::CombineMode;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_and_yaml() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("task.json");
        std::fs::write(&json_path, r#"{"queries": [[{"names": "lakers"}]]}"#).unwrap();
        let yaml_path = dir.path().join("task.yml");
        std::fs::write(&yaml_path, "mode: all\nquery_sets:\n  - [[{names: lakers}]]\n").unwrap();

        assert_eq!(TaskLoader::load(&json_path).unwrap().n_queries(), 1);
        assert_eq!(TaskLoader::load(&yaml_path).unwrap().mode, CombineMode::All);
    }

    #[test]
    fn test_invalid_task_keeps_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(&path, r#"[[{"max_price": "cheap"}]]"#).unwrap();

        let err = TaskLoader::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaskConfigError>(),
            Some(TaskConfigError::InvalidGroup { query: 0, group: 0, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(TaskLoader::load("/definitely/not/here.json").is_err());
    }
}
