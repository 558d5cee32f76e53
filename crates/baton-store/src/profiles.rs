use crate::atomic::write_atomic;
use crate::layout::StoreLayout;
use crate::StoreError;
use baton_schema::validation::MAX_PROFILE_NAME_LENGTH;
use baton_schema::{Profile, ProfileId};
use chrono::Utc;
use std::fs;
use std::sync::Mutex;
use tracing::{debug, info};

/// What the switch engine needs from the profile set: lookup by id and the
/// process-wide active-profile marker.
pub trait ProfileRepository: Send + Sync {
    fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError>;

    fn active_profile(&self) -> Result<Option<ProfileId>, StoreError>;

    /// Point the marker at `id`, or clear it with `None`. Activating a
    /// profile stamps its `last_used`.
    fn set_active_profile(&self, id: Option<&ProfileId>) -> Result<(), StoreError>;
}

pub fn validate_profile_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidName(
            "profile name cannot be empty".to_owned(),
        ));
    }
    if name.chars().count() > MAX_PROFILE_NAME_LENGTH {
        return Err(StoreError::InvalidName(format!(
            "profile name must be at most {MAX_PROFILE_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn check_unique(profiles: &[Profile], candidate: &Profile) -> Result<(), StoreError> {
    if let Some(existing) = profiles
        .iter()
        .find(|p| p.id != candidate.id && p.name_matches(&candidate.name))
    {
        return Err(StoreError::NameConflict {
            name: candidate.name.clone(),
            existing_id: existing.id.to_string(),
        });
    }
    Ok(())
}

/// Resolve `key` as an exact id first, then as a case-insensitive name.
fn find_in<'a>(profiles: &'a [Profile], key: &str) -> Option<&'a Profile> {
    profiles
        .iter()
        .find(|p| p.id == key)
        .or_else(|| profiles.iter().find(|p| p.name_matches(key)))
}

/// Profiles persisted as one JSON array in `profiles.json`; the active marker
/// is a separate one-line file holding the profile id.
pub struct JsonProfileStore {
    layout: StoreLayout,
}

impl JsonProfileStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// All profiles, sorted by name.
    pub fn list(&self) -> Result<Vec<Profile>, StoreError> {
        let path = self.layout.profiles_file();
        if !path.try_exists()? {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let mut profiles: Vec<Profile> = serde_json::from_str(&content)?;
        profiles.sort_by_key(|p| p.name.to_lowercase());
        Ok(profiles)
    }

    fn save(&self, profiles: &[Profile]) -> Result<(), StoreError> {
        self.layout.initialize()?;
        let content = serde_json::to_string_pretty(profiles)?;
        write_atomic(&self.layout.profiles_file(), content.as_bytes())
    }

    pub fn find(&self, key: &str) -> Result<Profile, StoreError> {
        let profiles = self.list()?;
        find_in(&profiles, key)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(key.to_owned()))
    }

    /// Add a profile. Names must be unique ignoring case.
    pub fn create(&self, profile: Profile) -> Result<Profile, StoreError> {
        validate_profile_name(&profile.name)?;
        let mut profiles = self.list()?;
        check_unique(&profiles, &profile)?;
        if profiles.iter().any(|p| p.id == profile.id) {
            return Err(StoreError::NameConflict {
                name: profile.name.clone(),
                existing_id: profile.id.to_string(),
            });
        }
        profiles.push(profile.clone());
        self.save(&profiles)?;
        info!("created profile '{}' ({})", profile.name, profile.id);
        Ok(profile)
    }

    /// Remove a profile by id or name. Clears the marker if it pointed at it.
    pub fn remove(&self, key: &str) -> Result<Profile, StoreError> {
        let mut profiles = self.list()?;
        let target = find_in(&profiles, key)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(key.to_owned()))?;
        profiles.retain(|p| p.id != target.id);
        self.save(&profiles)?;
        if self.active_profile()?.as_ref() == Some(&target.id) {
            self.set_active_profile(None)?;
        }
        info!("removed profile '{}' ({})", target.name, target.id);
        Ok(target)
    }
}

impl ProfileRepository for JsonProfileStore {
    fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError> {
        Ok(self.list()?.into_iter().find(|p| &p.id == id))
    }

    fn active_profile(&self) -> Result<Option<ProfileId>, StoreError> {
        let path = self.layout.active_marker();
        if !path.try_exists()? {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let id = content.trim();
        Ok((!id.is_empty()).then(|| ProfileId::new(id)))
    }

    fn set_active_profile(&self, id: Option<&ProfileId>) -> Result<(), StoreError> {
        let marker = self.layout.active_marker();
        match id {
            Some(id) => {
                let mut profiles = self.list()?;
                let profile = profiles
                    .iter_mut()
                    .find(|p| &p.id == id)
                    .ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))?;
                profile.last_used = Some(Utc::now());
                self.save(&profiles)?;
                write_atomic(&marker, format!("{id}\n").as_bytes())?;
                debug!("active profile set to {id}");
            }
            None => {
                match fs::remove_file(&marker) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                debug!("active profile cleared");
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    profiles: Vec<Profile>,
    active: Option<ProfileId>,
    fail_marker_writes: bool,
    marker_writes: u32,
}

/// In-memory repository for tests and embedding.
#[derive(Default)]
pub struct MemoryProfileStore {
    state: Mutex<MemoryState>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            state.profiles.extend(profiles);
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Io(std::io::Error::other(format!("lock poisoned: {e}"))))
    }

    pub fn insert(&self, profile: Profile) -> Result<(), StoreError> {
        validate_profile_name(&profile.name)?;
        let mut state = self.lock()?;
        check_unique(&state.profiles, &profile)?;
        state.profiles.retain(|p| p.id != profile.id);
        state.profiles.push(profile);
        Ok(())
    }

    pub fn find(&self, key: &str) -> Result<Profile, StoreError> {
        let state = self.lock()?;
        find_in(&state.profiles, key)
            .cloned()
            .ok_or_else(|| StoreError::ProfileNotFound(key.to_owned()))
    }

    /// Make every subsequent `set_active_profile` fail.
    pub fn fail_marker_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_marker_writes = fail;
        }
    }

    /// Number of marker updates attempted so far.
    pub fn marker_writes(&self) -> u32 {
        self.state.lock().map(|s| s.marker_writes).unwrap_or(0)
    }
}

impl ProfileRepository for MemoryProfileStore {
    fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>, StoreError> {
        let state = self.lock()?;
        Ok(state.profiles.iter().find(|p| &p.id == id).cloned())
    }

    fn active_profile(&self) -> Result<Option<ProfileId>, StoreError> {
        Ok(self.lock()?.active.clone())
    }

    fn set_active_profile(&self, id: Option<&ProfileId>) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.marker_writes += 1;
        if state.fail_marker_writes {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "marker write refused",
            )));
        }
        if let Some(id) = id {
            let profile = state
                .profiles
                .iter_mut()
                .find(|p| &p.id == id)
                .ok_or_else(|| StoreError::ProfileNotFound(id.to_string()))?;
            profile.last_used = Some(Utc::now());
        }
        state.active = id.cloned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baton_schema::{ServerConfig, ServerMap};

    fn profile(name: &str) -> Profile {
        let mut servers = ServerMap::new();
        servers.insert("git".to_owned(), ServerConfig::new("npx"));
        Profile::new(name, servers)
    }

    fn json_store(dir: &std::path::Path) -> JsonProfileStore {
        JsonProfileStore::new(StoreLayout::new(dir.join("data")))
    }

    #[test]
    fn create_list_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(dir.path());
        let dev = store.create(profile("dev")).unwrap();
        store.create(profile("Alpha")).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alpha", "dev"]);
        assert_eq!(store.find("DEV").unwrap().id, dev.id);
        assert_eq!(store.find(dev.id.as_str()).unwrap().name, "dev");
        assert!(matches!(
            store.find("missing"),
            Err(StoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn unreadable_data_dir_is_an_error_not_empty() {
        let dir = tempfile::tempdir().unwrap();
        // `data` is a regular file, so every path below it fails to stat.
        std::fs::write(dir.path().join("data"), b"").unwrap();
        let store = json_store(dir.path());
        assert!(matches!(store.list(), Err(StoreError::Io(_))));
        assert!(matches!(store.active_profile(), Err(StoreError::Io(_))));
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(dir.path());
        store.create(profile("Dev")).unwrap();
        let err = store.create(profile("dev")).unwrap_err();
        assert!(matches!(err, StoreError::NameConflict { .. }));
    }

    #[test]
    fn create_rejects_blank_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = json_store(dir.path()).create(profile("   ")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
    }

    #[test]
    fn active_marker_round_trip_stamps_last_used() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(dir.path());
        let dev = store.create(profile("dev")).unwrap();
        assert!(store.active_profile().unwrap().is_none());

        store.set_active_profile(Some(&dev.id)).unwrap();
        assert_eq!(store.active_profile().unwrap(), Some(dev.id.clone()));
        let stored = store.get_profile(&dev.id).unwrap().unwrap();
        assert!(stored.last_used.is_some());
        assert_eq!(stored.created_at, dev.created_at);

        store.set_active_profile(None).unwrap();
        assert!(store.active_profile().unwrap().is_none());
    }

    #[test]
    fn activating_unknown_profile_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(dir.path());
        let err = store
            .set_active_profile(Some(&ProfileId::new("nope")))
            .unwrap_err();
        assert!(matches!(err, StoreError::ProfileNotFound(_)));
    }

    #[test]
    fn removing_active_profile_clears_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = json_store(dir.path());
        let dev = store.create(profile("dev")).unwrap();
        store.set_active_profile(Some(&dev.id)).unwrap();
        store.remove("dev").unwrap();
        assert!(store.active_profile().unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn memory_store_marker_and_failure_toggle() {
        let dev = profile("dev");
        let store = MemoryProfileStore::with_profiles([dev.clone()]);
        store.set_active_profile(Some(&dev.id)).unwrap();
        assert_eq!(store.active_profile().unwrap(), Some(dev.id.clone()));

        store.fail_marker_writes(true);
        assert!(store.set_active_profile(None).is_err());
        assert_eq!(store.active_profile().unwrap(), Some(dev.id.clone()));
        assert_eq!(store.marker_writes(), 2);
    }

    #[test]
    fn memory_store_rejects_duplicate_names() {
        let store = MemoryProfileStore::new();
        store.insert(profile("dev")).unwrap();
        assert!(matches!(
            store.insert(profile("DEV")),
            Err(StoreError::NameConflict { .. })
        ));
    }
}
