//! Integration tests for the service layer
//!
//! These tests verify:
//! - Render requests apply authorization and accounting end to end
//! - Admin list edits from raw tokens
//! - Status and stats reports
//! - Module activation from the persisted module list

use anyhow::anyhow;
use async_trait::async_trait;
use camino::Utf8PathBuf;
use md2image::models::{DEFAULT_MODULE, IdentityStats, ListName};
use md2image::services::{
    CHANNEL_AUTOCONVERT, ControlService, ListOp, ModuleContext, ModuleRegistry, RenderRequestError,
    RenderService, Renderer,
};
use md2image::services::UsageAccounting;
use md2image::{StateManager, StateStore, StoreError};
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Renderer stand-in that fails on inputs containing "FAIL"
#[derive(Default)]
struct StubRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render_markdown(&self, markdown: &str, width: u32) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if markdown.contains("FAIL") {
            return Err(anyhow!("page crashed"));
        }
        Ok(format!("png:{}:{}", width, markdown.len()).into_bytes())
    }
}

struct Fixture {
    state: StateManager,
    control: ControlService,
    render: RenderService,
    renderer: Arc<StubRenderer>,
    dir: TempDir,
}

fn create_fixture(admins: Vec<i64>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(dir.path().join("state.json")).unwrap();
    let state = StateManager::new(StateStore::open(&path).unwrap());
    let renderer = Arc::new(StubRenderer::default());
    let render = RenderService::new(state.clone(), renderer.clone(), admins, 1024);

    Fixture {
        control: ControlService::new(state.clone()),
        state,
        render,
        renderer,
        dir,
    }
}

#[tokio::test]
async fn test_render_lifecycle_counts() {
    let fx = create_fixture(vec![]);

    fx.render.render_for(10, "# one", None).await.unwrap();
    fx.render.render_for(10, "# two", Some(500)).await.unwrap();
    let failed = fx.render.render_for(11, "FAIL", None).await;
    assert!(matches!(failed, Err(RenderRequestError::Render(_))));

    let stats = fx.control.get_stats().unwrap();
    assert_eq!(stats.total_requests, 3);
    assert_eq!(stats.render_success, 2);
    assert_eq!(stats.render_failed, 1);
    assert_eq!(
        stats.per_identity[&10],
        IdentityStats {
            requests: 2,
            render_success: 2
        }
    );
    assert_eq!(
        stats.per_identity[&11],
        IdentityStats {
            requests: 1,
            render_success: 0
        }
    );
    assert_eq!(fx.renderer.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_render_width_is_forwarded() {
    let fx = create_fixture(vec![]);

    let default = fx.render.render_for(1, "abc", None).await.unwrap();
    let custom = fx.render.render_for(1, "abc", Some(320)).await.unwrap();

    assert_eq!(default, b"png:1024:3");
    assert_eq!(custom, b"png:320:3");
}

#[tokio::test]
async fn test_private_mode_with_whitelist() {
    let fx = create_fixture(vec![1]);
    fx.control.set_public_status(false).unwrap();
    fx.control
        .modify_list(ListName::Whitelist, &[2], &[])
        .unwrap();

    assert!(fx.render.render_for(1, "admin", None).await.is_ok());
    assert!(fx.render.render_for(2, "listed", None).await.is_ok());
    assert!(matches!(
        fx.render.render_for(3, "stranger", None).await,
        Err(RenderRequestError::Unauthorized(3))
    ));

    // Rejections never reach the renderer or the counters
    assert_eq!(fx.renderer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(fx.control.get_stats().unwrap().total_requests, 2);
}

#[tokio::test]
async fn test_blacklisted_admin_is_denied() {
    let fx = create_fixture(vec![1]);
    fx.control
        .modify_list(ListName::Blacklist, &[1], &[])
        .unwrap();

    assert!(matches!(
        fx.render.render_for(1, "text", None).await,
        Err(RenderRequestError::Unauthorized(1))
    ));
}

#[test]
fn test_modify_list_from_tokens() {
    let fx = create_fixture(vec![]);

    let edit = fx
        .control
        .modify_list_from_tokens(ListName::Whitelist, ListOp::Add, ["5", "abc", "-100", "5"])
        .unwrap();
    assert_eq!(edit.applied, vec![5, -100, 5]);
    assert_eq!(edit.skipped, vec!["abc".to_string()]);
    assert_eq!(edit.entries, vec![-100, 5]);

    let edit = fx
        .control
        .modify_list_from_tokens(ListName::Whitelist, ListOp::Remove, ["5", "7"])
        .unwrap();
    assert_eq!(edit.entries, vec![-100]);
    assert!(edit.skipped.is_empty());

    // Only the targeted list changes
    assert!(fx.control.get_list(ListName::Blacklist).unwrap().is_empty());
}

#[test]
fn test_status_and_stats_reports() {
    let fx = create_fixture(vec![]);
    fx.control
        .modify_list(ListName::Blacklist, &[9, 8], &[])
        .unwrap();
    fx.state
        .mutate(|s| {
            s.stats.total_requests = 4;
            s.stats.render_success = 3;
            s.stats.render_failed = 1;
        })
        .unwrap();

    let status = fx.control.status().unwrap();
    assert!(status.public_enabled);
    assert_eq!(status.whitelist_len, 0);
    assert_eq!(status.blacklist_len, 2);
    assert_eq!(status.total_requests, 4);

    let report = fx.control.stats().unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["stats"]["render_failed"], 1);
    assert_eq!(json["config"]["blacklist"], serde_json::json!([8, 9]));
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_modules_from_persisted_configuration() {
    let fx = create_fixture(vec![]);
    let registry = ModuleRegistry::builtin();
    let ctx = ModuleContext {
        render: fx.render.clone(),
    };

    let enabled = fx.state.read(|s| s.config.enabled_modules.clone()).unwrap();
    assert_eq!(enabled, vec![DEFAULT_MODULE.to_string()]);

    let activation = registry.activate(&enabled, &ctx);
    assert_eq!(activation.names(), vec![CHANNEL_AUTOCONVERT]);

    let png = activation.dispatch_channel_post("post").await.unwrap();
    assert_eq!(png, Some(b"png:1024:4".to_vec()));
    assert_eq!(fx.control.get_stats().unwrap().total_requests, 1);
}

#[tokio::test]
async fn test_disabled_modules_do_nothing() {
    let fx = create_fixture(vec![]);
    fx.control
        .set_enabled_modules(vec!["retired_module".to_string()])
        .unwrap();

    let enabled = fx.state.read(|s| s.config.enabled_modules.clone()).unwrap();
    let activation = ModuleRegistry::builtin().activate(
        &enabled,
        &ModuleContext {
            render: fx.render.clone(),
        },
    );

    assert!(activation.active.is_empty());
    assert_eq!(activation.unknown, vec!["retired_module".to_string()]);
    assert_eq!(activation.dispatch_channel_post("post").await.unwrap(), None);
    assert_eq!(fx.renderer.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_render_from_blocking_caller() {
    let fx = create_fixture(vec![]);

    let png = tokio_test::block_on(fx.render.render_unattributed("sync", Some(100))).unwrap();

    assert_eq!(png, b"png:100:4");
    let stats = fx.control.get_stats().unwrap();
    assert_eq!(stats.total_requests, 1);
    assert!(stats.per_identity.is_empty());
}

#[tokio::test]
async fn test_unwritable_store_fails_every_write_path() {
    let fx = create_fixture(vec![]);
    fx.control
        .modify_list(ListName::Blacklist, &[5], &[])
        .unwrap();
    let document = fx.dir.path().join("state.json");
    let before = fs::read(&document).unwrap();

    // A directory where the lock file belongs makes the store unwritable
    let lock_path = fx.dir.path().join("state.json.lock");
    fs::remove_file(&lock_path).unwrap();
    fs::create_dir(&lock_path).unwrap();

    let result = fx.state.mutate(|s| s.config.blacklist.clear());
    assert!(matches!(result, Err(StoreError::StoreUnavailable { .. })));

    let accounting = UsageAccounting::new(fx.state.clone());
    assert!(matches!(
        accounting.record_attempt(),
        Err(StoreError::StoreUnavailable { .. })
    ));

    let rendered = fx.render.render_for(1, "# hi", None).await;
    assert!(matches!(
        rendered,
        Err(RenderRequestError::Store(StoreError::StoreUnavailable { .. }))
    ));
    assert_eq!(fx.renderer.calls.load(Ordering::SeqCst), 0);

    // Reads still work and see the last complete document
    assert_eq!(fs::read(&document).unwrap(), before);
    assert_eq!(fx.control.get_list(ListName::Blacklist).unwrap(), vec![5]);
    assert_eq!(
        fx.state.metrics().mutation_failures.load(Ordering::Relaxed),
        3
    );
}
