//! World-definition file loader: walks a directory tree once at startup and
//! installs every object it finds into the [`WorldCache`], per §6 ("Loaded
//! from a directory tree at startup. Accepted: YAML and JSON ... Also
//! `.g`").
//!
//! No teacher analogue (the teacher has no file-tree world loader);
//! `serde_yaml`/`serde_json`/`walkdir` are the standard idiomatic crates for
//! this job and are enrichment additions to the teacher's dependency stack.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use gaia_domain::{AccountId, GValue, Object, ObjectId};
use gaia_app::WorldCache;
use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum WorldLoadError {
    #[error("reading {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("parsing {path} as YAML: {source}")]
    Yaml { path: String, #[source] source: serde_yaml::Error },

    #[error("parsing {path} as JSON: {source}")]
    Json { path: String, #[source] source: serde_json::Error },
}

/// Author-facing shape of a world-definition document: the same fields as
/// the persisted [`Object`], minus the timestamps and revision a freshly
/// authored object doesn't have yet (those are stamped by [`Object::new`]
/// and by the store on first write).
#[derive(Deserialize)]
struct ObjectDef {
    id: ObjectId,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parents: Vec<ObjectId>,
    #[serde(default)]
    attributes: BTreeMap<String, GValue>,
    #[serde(default)]
    location: Option<ObjectId>,
    #[serde(default)]
    contents: BTreeSet<ObjectId>,
    #[serde(default)]
    owner: Option<AccountId>,
}

impl From<ObjectDef> for Object {
    fn from(def: ObjectDef) -> Self {
        let mut object = Object::new(def.id, def.display_name).with_parents(def.parents);
        object.description = def.description;
        object.location = def.location;
        object.contents = def.contents;
        object.owner = def.owner;
        for (name, value) in def.attributes {
            object.set_attribute(name, value);
        }
        object
    }
}

/// One or more objects in a single YAML/JSON document, matching §6's "each
/// document either a single object or an array of objects, same schema as
/// the persisted form".
#[derive(Deserialize)]
#[serde(untagged)]
enum ObjectDocument {
    One(ObjectDef),
    Many(Vec<ObjectDef>),
}

/// Walks `root` and installs every `.yaml`/`.yml`/`.json`/`.g` file it finds
/// into `cache`. Returns the number of objects installed.
pub async fn load_directory(root: &Path, cache: &WorldCache) -> Result<usize, WorldLoadError> {
    let mut count = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => {
                count += load_yaml(path, cache).await?;
            }
            Some("json") => {
                count += load_json(path, cache).await?;
            }
            Some("g") => {
                load_g_source(path, cache).await?;
                count += 1;
            }
            _ => {}
        }
    }
    Ok(count)
}

async fn load_yaml(path: &Path, cache: &WorldCache) -> Result<usize, WorldLoadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorldLoadError::Io { path: path.display().to_string(), source })?;
    let doc: ObjectDocument =
        serde_yaml::from_str(&text).map_err(|source| WorldLoadError::Yaml { path: path.display().to_string(), source })?;
    Ok(install(doc, cache))
}

async fn load_json(path: &Path, cache: &WorldCache) -> Result<usize, WorldLoadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorldLoadError::Io { path: path.display().to_string(), source })?;
    let doc: ObjectDocument =
        serde_json::from_str(&text).map_err(|source| WorldLoadError::Json { path: path.display().to_string(), source })?;
    Ok(install(doc, cache))
}

/// Assigns the file's contents to the `run` attribute of the object whose
/// ID equals the file's base name (without extension), per §6. If the
/// object is not already in the cache this creates a bare stub for it; a
/// YAML/JSON file defining the rest of the object may be loaded before or
/// after this one, since `put` always overwrites unconditionally.
async fn load_g_source(path: &Path, cache: &WorldCache) -> Result<(), WorldLoadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| WorldLoadError::Io { path: path.display().to_string(), source })?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let id = ObjectId::new(stem);

    let mut object = match cache.get(&id).await {
        Ok(existing) => existing,
        Err(_) => Object::new(id.clone(), stem),
    };
    object.set_attribute("run", GValue::Source(text));
    cache.put(object);
    Ok(())
}

fn install(doc: ObjectDocument, cache: &WorldCache) -> usize {
    match doc {
        ObjectDocument::One(object) => {
            cache.put(object);
            1
        }
        ObjectDocument::Many(objects) => {
            let count = objects.len();
            for object in objects {
                cache.put(object);
            }
            count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_ports::{StoreError, WorldStorePort};
    use std::sync::Arc;

    struct NullStore;

    #[async_trait::async_trait]
    impl WorldStorePort for NullStore {
        async fn fetch(&self, id: &ObjectId) -> Result<Object, StoreError> {
            Err(StoreError::NotFound { entity: "object", id: id.to_string() })
        }
        async fn store(&self, _o: &Object, _p: Option<&gaia_domain::Revision>) -> Result<gaia_domain::Revision, StoreError> {
            Ok(gaia_domain::Revision::new("1"))
        }
        async fn delete_by_id(&self, _id: &ObjectId, _p: Option<&gaia_domain::Revision>) -> Result<(), StoreError> {
            Ok(())
        }
        async fn list_by_index(&self, _n: &str, _k: &str) -> Result<Vec<Object>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn loads_a_tree_of_yaml_json_and_g_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("room.yaml"),
            "id: room\ndisplay_name: a room\ndescription: dim\nparents: []\nattributes: {}\ncontents: []\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("items.json"),
            r#"[{"id":"#sword","display_name":"a sword","description":"","parents":[],"attributes":{},"contents":[]},
               {"id":"#shield","display_name":"a shield","description":"","parents":[],"attributes":{},"contents":[]}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("room.g"), "[log \"hi\"]").unwrap();

        let cache = WorldCache::new(Arc::new(NullStore));
        let count = load_directory(dir.path(), &cache).await.unwrap();
        assert_eq!(count, 3);

        let room = cache.get(&ObjectId::new("room")).await.unwrap();
        assert_eq!(room.attributes.get("run"), Some(&GValue::Source("[log \"hi\"]".to_string())));
    }
}
