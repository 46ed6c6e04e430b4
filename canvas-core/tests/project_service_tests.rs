//! Orchestrator behaviour against in-memory collaborators: authorization,
//! error precedence, side-effect ordering and partial failure.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use canvas_core::{
    registry::merge_patch, ErrorKind, FolderPath, IdentityService, NodeAttributes, NodeId,
    NodeService, ProjectCreate, ProjectError, ProjectId, ProjectRef, ProjectService,
    ProjectUpdate, Record, RecordFilter, Registry, Service, ServiceError, StorageService, UserId,
    WiringError,
};
use rstest::rstest;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

type CallLog = Arc<Mutex<Vec<String>>>;

fn log(calls: &CallLog, entry: impl Into<String>) {
    calls.lock().unwrap().push(entry.into());
}

#[derive(Default)]
struct MemoryRegistry {
    records: Mutex<BTreeMap<String, Record>>,
    // Drops the record just before a write lands, as a concurrent delete would.
    lose_on_write: bool,
    calls: CallLog,
}

impl MemoryRegistry {
    fn lose_if_racing(&self, id: &str) {
        if self.lose_on_write {
            self.records.lock().unwrap().remove(id);
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn create(&self, id: &str, mut record: Record) -> Result<(), ServiceError> {
        log(&self.calls, "registry.create");
        record.insert("id".into(), Value::from(id));
        self.records.lock().unwrap().insert(id.to_owned(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, ServiceError> {
        log(&self.calls, "registry.get");
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn read(&self, filter: &RecordFilter) -> Result<Vec<Record>, ServiceError> {
        log(&self.calls, "registry.read");
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update(&self, id: &str, patch: Record) -> Result<bool, ServiceError> {
        log(&self.calls, "registry.update");
        self.lose_if_racing(id);
        match self.records.lock().unwrap().get_mut(id) {
            Some(record) => {
                merge_patch(record, patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        log(&self.calls, "registry.delete");
        self.lose_if_racing(id);
        Ok(self.records.lock().unwrap().remove(id).is_some())
    }
}

struct Users {
    known: HashSet<UserId>,
    calls: CallLog,
}

#[async_trait]
impl IdentityService for Users {
    async fn exists(&self, user: &UserId) -> Result<bool, ServiceError> {
        log(&self.calls, format!("identity.exists {user}"));
        Ok(self.known.contains(user))
    }
}

#[derive(Default)]
struct Nodes {
    live: Mutex<BTreeMap<NodeId, NodeAttributes>>,
    next: Mutex<u32>,
    fail_delete: bool,
    calls: CallLog,
}

impl Nodes {
    fn contains(&self, node: &NodeId) -> bool {
        self.live.lock().unwrap().contains_key(node)
    }

    fn count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

#[async_trait]
impl NodeService for Nodes {
    async fn create(
        &self,
        parent: Option<&NodeId>,
        attributes: NodeAttributes,
    ) -> Result<NodeId, ServiceError> {
        log(&self.calls, "node.create");
        assert!(parent.is_none(), "project roots are top-level nodes");
        let mut next = self.next.lock().unwrap();
        *next += 1;
        let id = NodeId::from(format!("node-{next}"));
        self.live.lock().unwrap().insert(id.clone(), attributes);
        Ok(id)
    }

    async fn exists(&self, node: &NodeId) -> Result<bool, ServiceError> {
        log(&self.calls, "node.exists");
        Ok(self.contains(node))
    }

    async fn delete(&self, node: &NodeId) -> Result<(), ServiceError> {
        log(&self.calls, "node.delete");
        if self.fail_delete {
            return Err(ServiceError::new(Service::Node, "node backend unavailable"));
        }
        self.live.lock().unwrap().remove(node);
        Ok(())
    }
}

#[derive(Default)]
struct Folders {
    present: Mutex<HashSet<String>>,
    fail_create: bool,
    calls: CallLog,
}

impl Folders {
    fn contains(&self, path: &str) -> bool {
        self.present.lock().unwrap().contains(path)
    }
}

#[async_trait]
impl StorageService for Folders {
    async fn create_folder(&self, owner_key: &str, project_key: &str) -> Result<(), ServiceError> {
        log(&self.calls, "storage.create_folder");
        if self.fail_create {
            return Err(ServiceError::new(Service::Storage, "quota exceeded"));
        }
        self.present
            .lock()
            .unwrap()
            .insert(format!("{owner_key}/{project_key}"));
        Ok(())
    }

    async fn remove_folder(&self, path: &FolderPath) -> Result<(), ServiceError> {
        log(&self.calls, "storage.remove_folder");
        if self.present.lock().unwrap().remove(&path.to_string()) {
            Ok(())
        } else {
            Err(ServiceError::new(Service::Storage, format!("no folder {path}")))
        }
    }
}

struct Fixture {
    service: ProjectService,
    registry: Arc<MemoryRegistry>,
    nodes: Arc<Nodes>,
    folders: Arc<Folders>,
    calls: CallLog,
}

#[derive(Default)]
struct Faults {
    fail_node_delete: bool,
    fail_folder_create: bool,
    lose_record_on_write: bool,
}

fn fixture() -> Fixture {
    fixture_with(Faults::default())
}

fn fixture_with(faults: Faults) -> Fixture {
    let calls = CallLog::default();
    let registry = Arc::new(MemoryRegistry {
        lose_on_write: faults.lose_record_on_write,
        calls: calls.clone(),
        ..MemoryRegistry::default()
    });
    let users = Arc::new(Users {
        known: [alice(), bob()].into_iter().collect(),
        calls: calls.clone(),
    });
    let nodes = Arc::new(Nodes {
        fail_delete: faults.fail_node_delete,
        calls: calls.clone(),
        ..Nodes::default()
    });
    let folders = Arc::new(Folders {
        fail_create: faults.fail_folder_create,
        calls: calls.clone(),
        ..Folders::default()
    });
    let service = ProjectService::builder()
        .registry(registry.clone())
        .identity(users)
        .nodes(nodes.clone())
        .storage(folders.clone())
        .build()
        .expect("fully wired");
    Fixture {
        service,
        registry,
        nodes,
        folders,
        calls,
    }
}

impl Fixture {
    fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

fn alice() -> UserId {
    UserId::from("alice")
}
fn bob() -> UserId {
    UserId::from("bob")
}
fn ghost() -> UserId {
    UserId::from("ghost")
}

// ---------------------------------------------------------------------------
// 1. Wiring
// ---------------------------------------------------------------------------

#[test]
fn builder_rejects_missing_collaborators() {
    let err = ProjectService::builder().build().err().expect("unwired");
    assert_eq!(err, WiringError::Missing(Service::Registry));

    let calls = CallLog::default();
    let err = ProjectService::builder()
        .registry(Arc::new(MemoryRegistry::default()))
        .identity(Arc::new(Users {
            known: HashSet::new(),
            calls,
        }))
        .nodes(Arc::new(Nodes::default()))
        .build()
        .err()
        .expect("storage missing");
    assert_eq!(err, WiringError::Missing(Service::Storage));
}

// ---------------------------------------------------------------------------
// 2. Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_provisions_node_record_and_folder_in_order() {
    let fx = fixture();
    let project = fx
        .service
        .create(&alice(), ProjectCreate::named("site"))
        .await
        .expect("create");

    assert_eq!(project.owner_id, alice());
    assert_eq!(project.name, "site");
    assert!(fx.nodes.contains(&project.core_node_id));
    assert!(fx.folders.contains(&format!("alice/{}", project.id)));
    assert_eq!(
        fx.take_calls(),
        [
            "identity.exists alice",
            "node.create",
            "registry.create",
            "storage.create_folder",
        ]
    );

    let stored = fx.service.get_for_owner(&alice(), &project.id).await.expect("get");
    assert_eq!(stored, project);
}

#[tokio::test]
async fn create_anchors_each_project_on_a_fresh_container_node() {
    let fx = fixture();
    let first = fx.service.create(&alice(), ProjectCreate::named("a")).await.unwrap();
    let second = fx.service.create(&alice(), ProjectCreate::named("b")).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.core_node_id, second.core_node_id);
    let live = fx.nodes.live.lock().unwrap();
    assert_eq!(live[&first.core_node_id], NodeAttributes::project_root());
}

#[tokio::test]
async fn create_with_unknown_initiator_touches_nothing() {
    let fx = fixture();
    let err = fx
        .service
        .create(&ghost(), ProjectCreate::named("site"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::IdentityNotFound(ref u) if *u == ghost()));
    assert_eq!(fx.take_calls(), ["identity.exists ghost"]);
    assert_eq!(fx.nodes.count(), 0);
}

#[tokio::test]
async fn failed_folder_step_leaves_node_and_record_in_place() {
    let fx = fixture_with(Faults {
        fail_folder_create: true,
        ..Faults::default()
    });
    let err = fx
        .service
        .create(&alice(), ProjectCreate::named("site"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProjectError::Service(ServiceError { service: Service::Storage, .. })
    ));
    assert_eq!(fx.nodes.count(), 1);
    assert_eq!(fx.registry.records.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// 3. Read and authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn non_owner_is_not_allowed_to_read() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();

    let err = fx.service.get_for_owner(&bob(), &project.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
}

#[tokio::test]
async fn missing_project_is_reported_before_authorization() {
    let fx = fixture();
    let err = fx
        .service
        .get_for_owner(&bob(), &ProjectId::from("nope"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectNotFound);
}

#[rstest]
#[case::get("get")]
#[case::update("update")]
#[case::delete("delete")]
#[case::list("list")]
#[case::by_node("by_node")]
#[tokio::test]
async fn unknown_initiator_wins_over_missing_target(#[case] operation: &str) {
    let fx = fixture();
    let missing = ProjectId::from("missing");
    let result = match operation {
        "get" => fx.service.get_for_owner(&ghost(), &missing).await.map(drop),
        "update" => fx
            .service
            .update(&ghost(), &missing, ProjectUpdate::default())
            .await,
        "delete" => fx.service.delete(&ghost(), &missing).await,
        "list" => fx.service.list_by_owner(&ghost(), &ghost()).await.map(drop),
        "by_node" => fx
            .service
            .get_for_owner_by_root_node(&ghost(), &NodeId::from("missing"))
            .await
            .map(drop),
        _ => unreachable!(),
    };
    let err = result.unwrap_err();
    assert!(matches!(err, ProjectError::IdentityNotFound(ref u) if *u == ghost()), "got: {err}");
}

#[rstest]
#[case::update("update")]
#[case::delete("delete")]
#[tokio::test]
async fn writes_to_a_missing_project_are_not_found(#[case] operation: &str) {
    let fx = fixture();
    let missing = ProjectId::from("missing");
    let result = match operation {
        "update" => fx
            .service
            .update(&alice(), &missing, ProjectUpdate::default())
            .await,
        "delete" => fx.service.delete(&alice(), &missing).await,
        _ => unreachable!(),
    };
    let err = result.unwrap_err();
    assert!(
        matches!(err, ProjectError::ProjectNotFound(ProjectRef::Id(ref id)) if *id == missing),
        "got: {err}"
    );
    assert_eq!(fx.take_calls(), ["identity.exists alice", "registry.get"]);
}

// ---------------------------------------------------------------------------
// 4. List
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_by_owner_returns_only_owned_projects() {
    let fx = fixture();
    fx.service.create(&alice(), ProjectCreate::named("a")).await.unwrap();
    fx.service.create(&alice(), ProjectCreate::named("b")).await.unwrap();
    fx.service.create(&bob(), ProjectCreate::named("c")).await.unwrap();

    let mut names: Vec<_> = fx
        .service
        .list_by_owner(&alice(), &alice())
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    assert_eq!(names, ["a", "b"]);
}

#[tokio::test]
async fn list_by_owner_with_no_projects_is_empty() {
    let fx = fixture();
    let projects = fx.service.list_by_owner(&bob(), &bob()).await.expect("list");
    assert!(projects.is_empty());
}

#[tokio::test]
async fn list_for_unknown_target_reports_the_target() {
    let fx = fixture();
    let err = fx.service.list_by_owner(&alice(), &ghost()).await.unwrap_err();
    assert!(matches!(err, ProjectError::IdentityNotFound(ref u) if *u == ghost()));
}

#[tokio::test]
async fn listing_someone_elses_projects_is_not_allowed() {
    let fx = fixture();
    fx.service.create(&bob(), ProjectCreate::named("c")).await.unwrap();
    let err = fx.service.list_by_owner(&alice(), &bob()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
}

#[tokio::test]
async fn non_owner_listing_never_decodes_records() {
    let fx = fixture();
    let thin = serde_json::json!({ "owner_id": "alice", "name": "thin" });
    if let Value::Object(record) = thin {
        fx.registry
            .records
            .lock()
            .unwrap()
            .insert("p-thin".to_owned(), record);
    }

    let err = fx.service.list_by_owner(&bob(), &alice()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
    assert!(!fx.take_calls().iter().any(|c| c == "registry.read"));

    let err = fx.service.list_by_owner(&alice(), &alice()).await.unwrap_err();
    assert!(matches!(err, ProjectError::MalformedRecord { ref id, .. } if id == "p-thin"));
}

// ---------------------------------------------------------------------------
// 5. Update
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_changes_only_supplied_fields() {
    let fx = fixture();
    let fields = ProjectCreate {
        name: "site".into(),
        description: Some("landing page".into()),
        metadata: BTreeMap::from([("theme".to_owned(), "dark".to_owned())]),
    };
    let before = fx.service.create(&alice(), fields).await.unwrap();

    let changes: ProjectUpdate = serde_json::from_str(
        r#"{"name":"x","id":"forged","owner_id":"bob","core_node_id":"node-99"}"#,
    )
    .unwrap();
    fx.service.update(&alice(), &before.id, changes).await.expect("update");

    let after = fx.service.get_for_owner(&alice(), &before.id).await.unwrap();
    assert_eq!(after.name, "x");
    assert_eq!(after.id, before.id);
    assert_eq!(after.owner_id, before.owner_id);
    assert_eq!(after.core_node_id, before.core_node_id);
    assert_eq!(after.description, before.description);
    assert_eq!(after.metadata, before.metadata);
    assert_eq!(after.created_at, before.created_at);
}

#[tokio::test]
async fn update_by_non_owner_does_not_write() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    fx.take_calls();

    let changes = ProjectUpdate {
        name: Some("hijacked".into()),
        ..ProjectUpdate::default()
    };
    let err = fx.service.update(&bob(), &project.id, changes).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
    assert!(!fx.take_calls().iter().any(|c| c == "registry.update"));
}

#[tokio::test]
async fn update_racing_a_delete_is_not_found() {
    let fx = fixture_with(Faults {
        lose_record_on_write: true,
        ..Faults::default()
    });
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();

    let changes = ProjectUpdate {
        name: Some("renamed".into()),
        ..ProjectUpdate::default()
    };
    let err = fx.service.update(&alice(), &project.id, changes).await.unwrap_err();
    assert!(
        matches!(err, ProjectError::ProjectNotFound(ProjectRef::Id(ref id)) if *id == project.id),
        "got: {err}"
    );
}

// ---------------------------------------------------------------------------
// 6. Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_record_node_and_folder_in_order() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    fx.take_calls();

    fx.service.delete(&alice(), &project.id).await.expect("delete");
    assert_eq!(
        fx.take_calls(),
        [
            "identity.exists alice",
            "registry.get",
            "registry.delete",
            "node.delete",
            "storage.remove_folder",
        ]
    );

    let err = fx.service.get_for_owner(&alice(), &project.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectNotFound);
    assert!(!fx.nodes.contains(&project.core_node_id));
    assert!(!fx.folders.contains(&format!("alice/{}", project.id)));
}

#[tokio::test]
async fn failed_node_delete_keeps_record_deleted() {
    let fx = fixture_with(Faults {
        fail_node_delete: true,
        ..Faults::default()
    });
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    fx.take_calls();

    let err = fx.service.delete(&alice(), &project.id).await.unwrap_err();
    assert!(matches!(
        err,
        ProjectError::Service(ServiceError { service: Service::Node, .. })
    ));
    assert!(!fx.take_calls().iter().any(|c| c == "storage.remove_folder"));
    assert!(fx.registry.records.lock().unwrap().is_empty());
    assert!(fx.nodes.contains(&project.core_node_id));
    assert!(fx.folders.contains(&format!("alice/{}", project.id)));
}

#[tokio::test]
async fn delete_by_non_owner_is_not_allowed() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    let err = fx.service.delete(&bob(), &project.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
    assert_eq!(fx.registry.records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn delete_racing_another_delete_leaves_node_and_folder_alone() {
    let fx = fixture_with(Faults {
        lose_record_on_write: true,
        ..Faults::default()
    });
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    fx.take_calls();

    let err = fx.service.delete(&alice(), &project.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectNotFound);

    let calls = fx.take_calls();
    assert_eq!(calls.last().map(String::as_str), Some("registry.delete"));
    assert!(!calls.iter().any(|c| c == "node.delete"));
    assert!(fx.nodes.contains(&project.core_node_id));
    assert!(fx.folders.contains(&format!("alice/{}", project.id)));
}

// ---------------------------------------------------------------------------
// 7. Root node lookups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_by_root_node_finds_the_owning_project() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    let found = fx
        .service
        .get_by_root_node(&project.core_node_id)
        .await
        .expect("lookup");
    assert_eq!(found.id, project.id);
}

#[tokio::test]
async fn get_by_root_node_distinguishes_missing_node_from_orphan_node() {
    let fx = fixture();
    let err = fx
        .service
        .get_by_root_node(&NodeId::from("node-404"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NodeNotFound);

    let orphan = fx
        .nodes
        .create(None, NodeAttributes::project_root())
        .await
        .unwrap();
    let err = fx.service.get_by_root_node(&orphan).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProjectNotFound);
}

#[tokio::test]
async fn get_by_root_node_flags_duplicate_claims() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();
    let mut clone = fx.registry.get(project.id.as_str()).await.unwrap().unwrap();
    clone.remove("id");
    fx.registry.create("duplicate", clone).await.unwrap();

    let err = fx
        .service
        .get_by_root_node(&project.core_node_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ProjectError::AmbiguousRootNode { matches: 2, .. }));
}

#[tokio::test]
async fn owner_lookup_by_root_node_checks_ownership() {
    let fx = fixture();
    let project = fx.service.create(&alice(), ProjectCreate::named("site")).await.unwrap();

    let found = fx
        .service
        .get_for_owner_by_root_node(&alice(), &project.core_node_id)
        .await
        .expect("owner lookup");
    assert_eq!(found.id, project.id);

    let err = fx
        .service
        .get_for_owner_by_root_node(&bob(), &project.core_node_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAllowed);
}

// ---------------------------------------------------------------------------
// 8. Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_each_get_their_own_resources() {
    let fx = fixture();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = fx.service.clone();
            tokio::spawn(async move {
                service
                    .create(&alice(), ProjectCreate::named(format!("p{i}")))
                    .await
            })
        })
        .collect();

    let mut nodes = HashSet::new();
    for handle in handles {
        let project = handle.await.expect("join").expect("create");
        assert!(nodes.insert(project.core_node_id));
    }
    assert_eq!(fx.nodes.count(), 8);
    assert_eq!(
        fx.service.list_by_owner(&alice(), &alice()).await.unwrap().len(),
        8
    );
}
