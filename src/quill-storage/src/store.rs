//! The project collection and the active-project pointer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::kv::KeyValueStore;
use crate::project::Project;

/// Key holding the serialized project array.
pub const PROJECTS_KEY: &str = "projects";
/// Key holding the active project id.
pub const CURRENT_PROJECT_KEY: &str = "currentProjectId";

/// All projects of one client session, persisted on every mutation.
pub struct ProjectStore {
    kv: Arc<dyn KeyValueStore>,
    projects: Vec<Project>,
    current_id: String,
}

impl std::fmt::Debug for ProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore")
            .field("projects", &self.projects.len())
            .field("current_id", &self.current_id)
            .finish_non_exhaustive()
    }
}

/// Parse the stored project array, skipping entries that cannot be read.
fn parse_projects(raw: &str) -> Vec<Project> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Stored projects are unreadable, starting fresh");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Project>(entry) {
            Ok(project) => Some(project),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable project entry");
                None
            }
        })
        .collect()
}

fn most_recent(projects: &[Project]) -> Option<&Project> {
    projects.iter().max_by_key(|p| p.last_modified)
}

impl ProjectStore {
    /// Load projects from `kv`, migrating legacy entries, and pick the
    /// active one: the saved id if it still exists, else the most recently
    /// modified project, else a new empty project.
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let projects = match kv.get(PROJECTS_KEY)? {
            Some(raw) => parse_projects(&raw),
            None => Vec::new(),
        };
        let saved_id = kv.get(CURRENT_PROJECT_KEY)?;

        let current_id = saved_id
            .filter(|id| projects.iter().any(|p| &p.id == id))
            .or_else(|| most_recent(&projects).map(|p| p.id.clone()));

        let mut store = Self {
            kv,
            projects,
            current_id: current_id.clone().unwrap_or_default(),
        };

        match current_id {
            Some(id) => {
                info!(projects = store.projects.len(), current = %id, "Loaded projects");
                store.persist()?;
            }
            None => {
                info!("No saved projects, creating a new one");
                store.create()?;
            }
        }
        Ok(store)
    }

    /// The active project.
    pub fn current(&self) -> &Project {
        self.projects
            .iter()
            .find(|p| p.id == self.current_id)
            .unwrap_or_else(|| &self.projects[0])
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn get(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// All projects, most recently modified first.
    pub fn list(&self) -> Vec<&Project> {
        let mut projects: Vec<&Project> = self.projects.iter().collect();
        projects.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        projects
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Create an empty project and make it active.
    pub fn create(&mut self) -> Result<&Project> {
        let project = Project::new();
        debug!(id = %project.id, "Created project");
        self.current_id = project.id.clone();
        self.projects.push(project);
        self.persist()?;
        Ok(self.current())
    }

    /// Make `id` the active project.
    pub fn select(&mut self, id: &str) -> Result<&Project> {
        if self.get(id).is_none() {
            return Err(StorageError::ProjectNotFound(id.to_string()));
        }
        self.current_id = id.to_string();
        self.kv.set(CURRENT_PROJECT_KEY, &self.current_id)?;
        Ok(self.current())
    }

    /// Mutate the active project and persist.
    pub fn update_current<R>(&mut self, f: impl FnOnce(&mut Project) -> R) -> Result<R> {
        let id = self.current().id.clone();
        self.update(&id, f)
    }

    /// Mutate project `id` and persist.
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut Project) -> R) -> Result<R> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StorageError::ProjectNotFound(id.to_string()))?;
        let result = f(project);
        self.persist()?;
        Ok(result)
    }

    /// Delete project `id`. Deleting the active project activates the most
    /// recent remaining one, or a new project when none remain.
    pub fn delete(&mut self, id: &str) -> Result<Project> {
        let index = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StorageError::ProjectNotFound(id.to_string()))?;
        let removed = self.projects.remove(index);
        info!(id = %removed.id, title = %removed.title, "Deleted project");

        if removed.id == self.current_id {
            match most_recent(&self.projects).map(|p| p.id.clone()) {
                Some(next) => self.current_id = next,
                None => {
                    self.create()?;
                    return Ok(removed);
                }
            }
        }
        self.persist()?;
        Ok(removed)
    }

    /// Write the project array and active id.
    pub fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.projects)?;
        self.kv.set(PROJECTS_KEY, &raw)?;
        self.kv.set(CURRENT_PROJECT_KEY, &self.current_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileStore, MemoryStore};
    use crate::project::UNTITLED;
    use pretty_assertions::assert_eq;

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn test_first_load_creates_project() {
        let kv = memory();
        let store = ProjectStore::load(kv.clone()).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.current().title, UNTITLED);
        assert_eq!(
            kv.get(CURRENT_PROJECT_KEY).unwrap().as_deref(),
            Some(store.current_id())
        );
        assert!(kv.get(PROJECTS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_restores_saved_current_project() {
        let kv = memory();
        kv.set(
            PROJECTS_KEY,
            r#"[{"id":"a","title":"Alpha","outline":"","lastModified":10},
                {"id":"b","title":"Beta","outline":"","lastModified":20}]"#,
        )
        .unwrap();
        kv.set(CURRENT_PROJECT_KEY, "a").unwrap();

        let store = ProjectStore::load(kv).unwrap();
        assert_eq!(store.current().title, "Alpha");
    }

    #[test]
    fn test_falls_back_to_most_recent() {
        let kv = memory();
        kv.set(
            PROJECTS_KEY,
            r#"[{"id":"a","title":"Alpha","lastModified":10},
                {"id":"b","title":"Beta","lastModified":20}]"#,
        )
        .unwrap();
        kv.set(CURRENT_PROJECT_KEY, "gone").unwrap();

        let store = ProjectStore::load(kv).unwrap();
        assert_eq!(store.current().title, "Beta");
        let titles: Vec<&str> = store.list().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Beta", "Alpha"]);
    }

    #[test]
    fn test_corrupt_entries_are_skipped() {
        let kv = memory();
        kv.set(
            PROJECTS_KEY,
            r#"[{"title":"no id"},{"id":"ok","title":"Fine","lastModified":1}]"#,
        )
        .unwrap();

        let store = ProjectStore::load(kv.clone()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.current().title, "Fine");

        kv.set(PROJECTS_KEY, "not json").unwrap();
        let store = ProjectStore::load(kv).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.current().title, UNTITLED);
    }

    #[test]
    fn test_update_persists() {
        let kv = memory();
        let mut store = ProjectStore::load(kv.clone()).unwrap();
        store
            .update_current(|p| {
                p.title = "Paper Tigers".into();
                p.set_outline("body");
            })
            .unwrap();

        let reloaded = ProjectStore::load(kv).unwrap();
        assert_eq!(reloaded.current().title, "Paper Tigers");
        assert_eq!(reloaded.current().outline(), "body");
        assert_eq!(reloaded.current().history().len(), 2);
    }

    #[test]
    fn test_select_unknown_project() {
        let mut store = ProjectStore::load(memory()).unwrap();
        assert!(matches!(
            store.select("missing"),
            Err(StorageError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_delete_active_activates_most_recent() {
        let mut store = ProjectStore::load(memory()).unwrap();
        let first = store.current_id().to_string();
        store.update_current(|p| p.last_modified = 100).unwrap();
        let second = store.create().unwrap().id.clone();
        store.update_current(|p| p.last_modified = 50).unwrap();
        let third = store.create().unwrap().id.clone();
        store.update_current(|p| p.last_modified = 10).unwrap();

        store.delete(&third).unwrap();
        assert_eq!(store.current_id(), first);
        assert!(store.get(&second).is_some());

        store.delete(&second).unwrap();
        assert_eq!(store.current_id(), first);
    }

    #[test]
    fn test_delete_last_creates_new() {
        let mut store = ProjectStore::load(memory()).unwrap();
        let only = store.current_id().to_string();

        let removed = store.delete(&only).unwrap();
        assert_eq!(removed.id, only);
        assert_eq!(store.len(), 1);
        assert_ne!(store.current_id(), only);
    }

    #[test]
    fn test_file_backed_session() {
        let tmp = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(tmp.path()).unwrap());

        let mut store = ProjectStore::load(kv.clone()).unwrap();
        let id = store.current_id().to_string();
        store.update_current(|p| p.set_outline("draft")).unwrap();
        drop(store);

        let store = ProjectStore::load(kv).unwrap();
        assert_eq!(store.current_id(), id);
        assert_eq!(store.current().outline(), "draft");
    }
}
