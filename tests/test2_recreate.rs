mod common;

use std::sync::Arc;

use docker_update_mgr::app::{AppConfig, AppCore};
use docker_update_mgr::docker::DockerError;
use docker_update_mgr::domain::UpdateStatus;
use docker_update_mgr::ports::{DockerPort, MockDockerPort, MockRegistryPort};

use common::{CallLog, local_image, outside_guard, snapshot, summary};

const OLD_ID: &str = "old-id";
const NEW_ID: &str = "new-id";

fn core_with(docker: MockDockerPort) -> AppCore {
    core_with_registry(docker, MockRegistryPort::new())
}

fn core_with_registry(docker: MockDockerPort, registry: MockRegistryPort) -> AppCore {
    let docker: Arc<dyn DockerPort> = Arc::new(docker);
    let guard = outside_guard(Arc::clone(&docker));
    AppCore::new(docker, Arc::new(registry), guard, &AppConfig::default())
}

/// Registry that reports `digest` for `repository:tag`, exactly `times` times.
fn expect_digest(
    registry: &mut MockRegistryPort,
    repository: &'static str,
    tag: &'static str,
    digest: &'static str,
    times: usize,
) {
    registry
        .expect_manifest_digest()
        .withf(move |r| r.repository == repository && r.tag == tag)
        .times(times)
        .returning(move |_| Ok(digest.to_string()));
}

/// A daemon on which every step of the swap succeeds. `new_image_id` is the
/// image the replacement ends up running.
fn happy_daemon(log: &CallLog, new_image_id: &'static str) -> MockDockerPort {
    let mut docker = MockDockerPort::new();
    docker.expect_inspect_container().returning(move |id| {
        if id == NEW_ID {
            Ok(snapshot(NEW_ID, "web", "nginx:1.25", new_image_id))
        } else {
            Ok(snapshot(OLD_ID, "web", "nginx:1.25", "sha256:old"))
        }
    });
    let l = log.clone();
    docker.expect_pull_image().returning(move |image, _| {
        l.push(format!("pull {image}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_create_container().returning(move |name, body| {
        assert!(name.starts_with("web-update-"));
        assert_eq!(body.config.image.as_deref(), Some("nginx:1.25"));
        assert_eq!(body.config.env, Some(vec!["TZ=UTC".to_string()]));
        l.push("create");
        Ok(NEW_ID.to_string())
    });
    let l = log.clone();
    docker.expect_stop_container().returning(move |id| {
        l.push(format!("stop {id}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_rename_container().returning(move |id, name| {
        let name = if name.starts_with("web-old-") { "web-old" } else { name };
        l.push(format!("rename {id} {name}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_start_container().returning(move |id| {
        l.push(format!("start {id}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_remove_container().returning(move |id, force| {
        assert!(force);
        l.push(format!("remove {id}"));
        Ok(())
    });
    docker
}

#[tokio::test]
async fn swap_runs_in_order_and_records_success() {
    let log = CallLog::default();
    let core = core_with(happy_daemon(&log, "sha256:fresh"));

    let outcome = core.update(OLD_ID, None).await.expect("update runs");

    assert!(outcome.success);
    assert!(outcome.image_changed);
    assert!(!outcome.tag_changed);
    assert!(!outcome.self_update);
    assert_eq!(
        log.calls(),
        vec![
            "pull nginx:1.25",
            "create",
            "stop old-id",
            "rename old-id web-old",
            "rename new-id web",
            "start new-id",
            "remove old-id",
        ]
    );

    let journal = core.journal();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].status, UpdateStatus::Success);
    assert_eq!(journal[0].old_image_id, "sha256:old");
    assert_eq!(journal[0].new_image_id.as_deref(), Some("sha256:fresh"));
}

#[tokio::test]
async fn unchanged_image_is_still_a_success() {
    let log = CallLog::default();
    let core = core_with(happy_daemon(&log, "sha256:old"));

    let outcome = core.update(OLD_ID, None).await.expect("update runs");

    assert!(outcome.success);
    assert!(!outcome.image_changed);
    assert!(outcome.message.contains("unchanged"));
}

#[tokio::test]
async fn target_tag_pulls_the_new_tag() {
    let log = CallLog::default();
    let mut docker = MockDockerPort::new();
    docker
        .expect_inspect_container()
        .returning(|id| Ok(snapshot(id, "web", "nginx:1.25", "sha256:old")));
    let l = log.clone();
    docker.expect_pull_image().returning(move |image, _| {
        l.push(format!("pull {image}"));
        Err(DockerError::Pull("manifest unknown".to_string()))
    });
    let core = core_with(docker);

    let outcome = core.update(OLD_ID, Some("1.26")).await.expect("update runs");

    assert!(outcome.tag_changed);
    assert_eq!(log.calls(), vec!["pull nginx:1.26"]);
    assert_eq!(outcome.entry.new_image, "nginx:1.26");
}

#[tokio::test]
async fn pull_failure_leaves_original_untouched() {
    let mut docker = MockDockerPort::new();
    docker
        .expect_inspect_container()
        .returning(|_| Ok(snapshot(OLD_ID, "web", "nginx:1.25", "sha256:old")));
    docker
        .expect_pull_image()
        .returning(|_, _| Err(DockerError::Pull("network unreachable".to_string())));
    docker.expect_create_container().never();
    docker.expect_stop_container().never();
    docker.expect_remove_container().never();
    let core = core_with(docker);

    let outcome = core.update(OLD_ID, None).await.expect("update runs");

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Pull failed"));
    assert_eq!(core.journal()[0].status, UpdateStatus::Failed);
}

#[tokio::test]
async fn failed_start_restores_original_container() {
    let log = CallLog::default();
    let mut docker = MockDockerPort::new();
    docker
        .expect_inspect_container()
        .returning(|_| Ok(snapshot(OLD_ID, "web", "nginx:1.25", "sha256:old")));
    docker.expect_pull_image().returning(|_, _| Ok(()));
    docker
        .expect_create_container()
        .returning(|_, _| Ok(NEW_ID.to_string()));
    let l = log.clone();
    docker.expect_stop_container().returning(move |id| {
        l.push(format!("stop {id}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_rename_container().returning(move |id, name| {
        let name = if name.starts_with("web-old-") { "web-old" } else { name };
        l.push(format!("rename {id} {name}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_start_container().returning(move |id| {
        l.push(format!("start {id}"));
        if id == NEW_ID {
            Err(DockerError::Api {
                status: 500,
                message: "port is already allocated".to_string(),
            })
        } else {
            Ok(())
        }
    });
    let l = log.clone();
    docker.expect_remove_container().returning(move |id, _| {
        l.push(format!("remove {id}"));
        Ok(())
    });
    let core = core_with(docker);

    let outcome = core.update(OLD_ID, None).await.expect("update runs");

    assert!(!outcome.success);
    assert!(outcome.message.contains("original container restored"));
    assert_eq!(
        log.calls(),
        vec![
            "stop old-id",
            "rename old-id web-old",
            "rename new-id web",
            "start new-id",
            "remove new-id",
            "rename old-id web",
            "start old-id",
        ]
    );
    assert_eq!(core.journal()[0].status, UpdateStatus::Failed);
}

#[tokio::test]
async fn already_stopped_container_is_not_an_error() {
    let mut docker = MockDockerPort::new();
    docker.expect_inspect_container().returning(|id| {
        let mut s = snapshot(id, "web", "nginx:1.25", "sha256:old");
        s.running = false;
        Ok(s)
    });
    docker.expect_pull_image().returning(|_, _| Ok(()));
    docker
        .expect_create_container()
        .returning(|_, _| Ok(NEW_ID.to_string()));
    docker.expect_stop_container().returning(|_| {
        Err(DockerError::Api {
            status: 304,
            message: String::new(),
        })
    });
    docker.expect_rename_container().returning(|_, _| Ok(()));
    docker.expect_start_container().returning(|_| Ok(()));
    docker.expect_remove_container().returning(|_, _| Ok(()));
    let core = core_with(docker);

    let outcome = core.update(OLD_ID, None).await.expect("update runs");

    assert!(outcome.success);
}

#[tokio::test]
async fn missing_container_is_an_error() {
    let mut docker = MockDockerPort::new();
    docker
        .expect_inspect_container()
        .returning(|id| Err(DockerError::NotFound(id.to_string())));
    let core = core_with(docker);

    assert!(core.update("ghost", None).await.is_err());
    assert!(core.journal().is_empty());
}

#[tokio::test]
async fn update_evicts_old_and_new_image_from_cache() {
    let mut docker = MockDockerPort::new();
    docker.expect_list_containers().returning(|_| {
        Ok(vec![
            summary(OLD_ID, "web", "nginx:1.25", "sha256:old"),
            summary("canary-id", "canary", "nginx:1.26", "sha256:c"),
            summary("cache-id", "cache", "redis:7", "sha256:r"),
        ])
    });
    docker.expect_list_images().returning(|| {
        Ok(vec![
            local_image("sha256:old", "nginx:1.25", "sha256:d125"),
            local_image("sha256:c", "nginx:1.26", "sha256:d126"),
            local_image("sha256:r", "redis:7", "sha256:d7"),
        ])
    });
    docker
        .expect_inspect_container()
        .returning(|_| Ok(snapshot(OLD_ID, "web", "nginx:1.25", "sha256:old")));
    docker
        .expect_pull_image()
        .returning(|_, _| Err(DockerError::Pull("manifest unknown".to_string())));

    let mut registry = MockRegistryPort::new();
    // Both nginx tags are looked up again after the update; redis stays cached.
    expect_digest(&mut registry, "library/nginx", "1.25", "sha256:d125", 2);
    expect_digest(&mut registry, "library/nginx", "1.26", "sha256:d126", 2);
    expect_digest(&mut registry, "library/redis", "7", "sha256:d7", 1);
    registry
        .expect_manifest_digest()
        .withf(|r| r.tag == "latest")
        .returning(|r| Ok(format!("sha256:latest-{}", r.repository)));
    let core = core_with_registry(docker, registry);

    core.check(false).await.expect("first check");
    let outcome = core.update(OLD_ID, Some("1.26")).await.expect("update runs");
    assert!(!outcome.success);
    let checks = core.check(false).await.expect("second check");

    assert_eq!(checks.len(), 3);
    assert!(checks.iter().all(|c| c.check.error.is_none()));
}

#[tokio::test]
async fn batch_isolates_a_failed_container() {
    let log = CallLog::default();
    let mut docker = MockDockerPort::new();
    docker.expect_list_containers().returning(|_| {
        Ok(vec![
            summary("a-id", "web-a", "redis:alpine", "sha256:a"),
            summary("b-id", "web-b", "nginx:stable", "sha256:b"),
        ])
    });
    docker.expect_list_images().returning(|| {
        Ok(vec![
            local_image("sha256:a", "redis:alpine", "sha256:old-a"),
            local_image("sha256:b", "nginx:stable", "sha256:old-b"),
        ])
    });
    docker.expect_inspect_container().returning(|id| match id {
        "a-id" => Ok(snapshot("a-id", "web-a", "redis:alpine", "sha256:a")),
        "b-new" => Ok(snapshot("b-new", "web-b", "nginx:stable", "sha256:fresh")),
        _ => Ok(snapshot("b-id", "web-b", "nginx:stable", "sha256:b")),
    });
    let l = log.clone();
    docker.expect_pull_image().returning(move |image, _| {
        l.push(format!("pull {image}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_create_container().returning(move |name, _| {
        if name.starts_with("web-a-update-") {
            return Err(DockerError::Api {
                status: 500,
                message: "no space left on device".to_string(),
            });
        }
        l.push(format!("create {name}"));
        Ok("b-new".to_string())
    });
    let l = log.clone();
    docker.expect_stop_container().returning(move |id| {
        l.push(format!("stop {id}"));
        Ok(())
    });
    docker.expect_rename_container().returning(|_, _| Ok(()));
    let l = log.clone();
    docker.expect_start_container().returning(move |id| {
        l.push(format!("start {id}"));
        Ok(())
    });
    let l = log.clone();
    docker.expect_remove_container().returning(move |id, _| {
        l.push(format!("remove {id}"));
        Ok(())
    });

    let mut registry = MockRegistryPort::new();
    expect_digest(&mut registry, "library/redis", "alpine", "sha256:new-a", 1);
    expect_digest(&mut registry, "library/nginx", "stable", "sha256:new-b", 1);
    let core = core_with_registry(docker, registry);

    let batch = core.update_all().await.expect("batch runs");

    assert_eq!(batch.items.len(), 2);
    assert_eq!(batch.failures(), 1);
    let first = batch.items[0].outcome.as_ref().expect("outcome");
    assert_eq!(batch.items[0].container_name, "web-a");
    assert!(!first.success);
    assert!(first.message.starts_with("Create failed"));
    let second = batch.items[1].outcome.as_ref().expect("outcome");
    assert!(second.success);
    assert!(second.image_changed);

    let calls = log.calls();
    assert!(!calls.contains(&"stop a-id".to_string()));
    assert!(calls.contains(&"stop b-id".to_string()));
    assert!(calls.contains(&"start b-new".to_string()));
    assert!(calls.contains(&"remove b-id".to_string()));
}
