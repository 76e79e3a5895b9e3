//! Template store: builtin catalog plus user templates persisted as one JSON
//! file each, and the active template id persisted in `config.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DEFAULT_TEMPLATE_ID;
use crate::error::TemplateError;
use crate::template::{Template, builtin_templates};

const TEMPLATES_DIR: &str = "templates";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Serialize, Deserialize)]
struct ActiveTemplate {
    current_template: String,
}

/// ISO-8601 local timestamp used for `created_at`/`updated_at`
fn timestamp() -> String {
    Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// All templates known to the viewer and which one is active
pub struct TemplateStore {
    dir: PathBuf,
    templates: Vec<Template>,
    current_id: String,
}

impl TemplateStore {
    /// Open the store rooted at `dir`, loading user templates and the active id
    pub fn open(dir: &Path) -> Self {
        let mut store = Self {
            dir: dir.to_path_buf(),
            templates: builtin_templates().to_vec(),
            current_id: DEFAULT_TEMPLATE_ID.to_string(),
        };
        if let Err(e) = fs::create_dir_all(store.templates_dir()) {
            warn!(dir = %dir.display(), error = %e, "cannot create template directory");
        }
        store.load_user_templates();
        store.load_config();
        store
    }

    fn templates_dir(&self) -> PathBuf {
        self.dir.join(TEMPLATES_DIR)
    }

    fn template_path(&self, id: &str) -> PathBuf {
        self.templates_dir().join(format!("{}.json", file_stem(id)))
    }

    fn load_user_templates(&mut self) {
        let Ok(entries) = fs::read_dir(self.templates_dir()) else {
            return;
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            match Template::load_from_file(&path) {
                // User files never shadow a builtin or an earlier file
                Ok(mut template) if self.get(&template.id).is_none() => {
                    template.is_builtin = false;
                    self.templates.push(template);
                }
                Ok(template) => {
                    debug!(id = %template.id, path = %path.display(), "ignoring duplicate template id");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to load template"),
            }
        }
    }

    fn load_config(&mut self) {
        let path = self.dir.join(CONFIG_FILE);
        let Ok(text) = fs::read_to_string(&path) else {
            return;
        };
        match serde_json::from_str::<ActiveTemplate>(&text) {
            Ok(config) if self.get(&config.current_template).is_some() => {
                self.current_id = config.current_template;
            }
            Ok(config) => {
                warn!(id = %config.current_template, "active template no longer exists");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "malformed config file"),
        }
    }

    fn save_config(&self) -> Result<(), TemplateError> {
        let config = ActiveTemplate {
            current_template: self.current_id.clone(),
        };
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(CONFIG_FILE), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    /// The active template, or the default builtin if it has gone missing
    pub fn current(&self) -> &Template {
        self.get(&self.current_id)
            .or_else(|| self.get(DEFAULT_TEMPLATE_ID))
            .unwrap_or(&builtin_templates()[0])
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn all(&self) -> &[Template] {
        &self.templates
    }

    pub fn builtins(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(|t| t.is_builtin)
    }

    pub fn user_templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter().filter(|t| !t.is_builtin)
    }

    /// Make `id` the active template and persist the choice
    pub fn switch_template(&mut self, id: &str) -> Result<(), TemplateError> {
        if self.get(id).is_none() {
            return Err(TemplateError::UnknownTemplate { id: id.to_string() });
        }
        self.current_id = id.to_string();
        self.save_config()
    }

    /// Persist a user template, stamping its timestamps
    pub fn save_template(&mut self, mut template: Template) -> Result<(), TemplateError> {
        let builtin_id = template.is_builtin
            || self.get(&template.id).is_some_and(|existing| existing.is_builtin);
        if builtin_id {
            return Err(TemplateError::Builtin { id: template.id });
        }

        template.updated_at = timestamp();
        if template.created_at.is_empty() {
            template.created_at = template.updated_at.clone();
        }

        fs::create_dir_all(self.templates_dir())?;
        template.save_to_file(&self.template_path(&template.id))?;

        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
        Ok(())
    }

    /// Delete a user template; deleting the active one falls back to the default
    pub fn delete_template(&mut self, id: &str) -> Result<(), TemplateError> {
        let Some(pos) = self.templates.iter().position(|t| t.id == id) else {
            return Err(TemplateError::UnknownTemplate { id: id.to_string() });
        };
        if self.templates[pos].is_builtin {
            return Err(TemplateError::Builtin { id: id.to_string() });
        }

        let path = self.template_path(id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.templates.remove(pos);

        if self.current_id == id {
            self.current_id = DEFAULT_TEMPLATE_ID.to_string();
            self.save_config()?;
        }
        Ok(())
    }

    /// Create an empty user template with a fresh id. It is not written until saved.
    pub fn create_template(&mut self, name: &str, description: &str) -> &Template {
        let seed = Local::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let mut n: u64 = 0;
        let id = loop {
            let candidate = format!("custom_{:08x}", (seed.wrapping_add(n)) as u32);
            if self.get(&candidate).is_none() {
                break candidate;
            }
            n += 1;
        };

        let now = timestamp();
        let template = Template {
            created_at: now.clone(),
            updated_at: now,
            ..Template::new(&id, name, description)
        };
        self.templates.push(template);
        &self.templates[self.templates.len() - 1]
    }

    /// Write template `id` to an arbitrary path
    pub fn export_template(&self, id: &str, path: &Path) -> Result<(), TemplateError> {
        let template = self
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate { id: id.to_string() })?;
        template.save_to_file(path)
    }

    /// Import a template file as a user template, renaming its id on conflict
    pub fn import_template(&mut self, path: &Path) -> Result<&Template, TemplateError> {
        let mut template = Template::load_from_file(path)?;
        if self.get(&template.id).is_some() {
            let original = template.id.clone();
            let mut counter = 1;
            while self.get(&format!("{original}_{counter}")).is_some() {
                counter += 1;
            }
            template.id = format!("{original}_{counter}");
        }
        template.is_builtin = false;

        let id = template.id.clone();
        self.save_template(template)?;
        self.get(&id)
            .ok_or(TemplateError::UnknownTemplate { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::HighlightRule;

    #[test]
    fn test_open_empty_dir_has_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path());
        assert_eq!(store.current_id(), "general");
        assert_eq!(store.builtins().count(), 5);
        assert_eq!(store.user_templates().count(), 0);
        assert!(dir.path().join("templates").is_dir());
    }

    #[test]
    fn test_save_and_reload_user_template() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::open(dir.path());
        let mut template = Template::new("app", "App", "my app");
        template.rules.push(HighlightRule::regex("Timeout", r"timeout=\d+", "#FF0000", "", 8));
        store.save_template(template).unwrap();

        let saved = store.get("app").unwrap();
        assert!(!saved.created_at.is_empty());
        assert_eq!(saved.created_at, saved.updated_at);
        assert!(dir.path().join("templates/app.json").is_file());

        let reopened = TemplateStore::open(dir.path());
        let loaded = reopened.get("app").unwrap();
        assert_eq!(loaded.rules, store.get("app").unwrap().rules);
    }

    #[test]
    fn test_builtins_are_immutable() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::open(dir.path());

        let mut general = store.get("general").unwrap().clone();
        general.rules.clear();
        assert!(matches!(store.save_template(general.clone()), Err(TemplateError::Builtin { .. })));

        general.is_builtin = false;
        assert!(matches!(store.save_template(general), Err(TemplateError::Builtin { .. })));
        assert!(matches!(store.delete_template("nginx"), Err(TemplateError::Builtin { .. })));
        assert_eq!(store.get("general").unwrap().rules.len(), 5);
    }

    #[test]
    fn test_switch_persists_active_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::open(dir.path());
        store.switch_template("nginx").unwrap();
        assert!(matches!(
            store.switch_template("nope"),
            Err(TemplateError::UnknownTemplate { .. })
        ));
        assert_eq!(store.current().id, "nginx");

        let reopened = TemplateStore::open(dir.path());
        assert_eq!(reopened.current_id(), "nginx");
    }

    #[test]
    fn test_delete_active_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::open(dir.path());
        store.save_template(Template::new("mine", "Mine", "")).unwrap();
        store.switch_template("mine").unwrap();

        store.delete_template("mine").unwrap();
        assert_eq!(store.current_id(), "general");
        assert!(store.get("mine").is_none());
        assert!(!dir.path().join("templates/mine.json").exists());
        assert_eq!(TemplateStore::open(dir.path()).current_id(), "general");
    }

    #[test]
    fn test_user_file_cannot_shadow_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        let mut fake = Template::new("general", "Hijacked", "");
        fake.is_builtin = false;
        fake.save_to_file(&dir.path().join("templates/general.json")).unwrap();
        fs::write(dir.path().join("templates/broken.json"), "{not json").unwrap();

        let store = TemplateStore::open(dir.path());
        assert_eq!(store.get("general").unwrap().name, "General");
        assert_eq!(store.all().len(), 5);
    }

    #[test]
    fn test_create_template_ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::open(dir.path());
        let a = store.create_template("A", "").id.clone();
        let b = store.create_template("B", "").id.clone();
        assert!(a.starts_with("custom_"));
        assert_ne!(a, b);
        assert!(!store.get(&a).unwrap().is_builtin);
    }

    #[test]
    fn test_import_renames_conflicting_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TemplateStore::open(dir.path());
        let export = dir.path().join("nginx-export.json");
        store.export_template("nginx", &export).unwrap();

        let imported = store.import_template(&export).unwrap();
        assert_eq!(imported.id, "nginx_1");
        assert!(!imported.is_builtin);
        let imported_rules = imported.rules.clone();
        assert_eq!(imported_rules, store.get("nginx").unwrap().rules);

        let again = store.import_template(&export).unwrap();
        assert_eq!(again.id, "nginx_2");
    }
}
