//! End-to-end pipeline tests over local block sources.
//!
//! These exercise the full orchestrator with the real generator and writer
//! and a recording installer, against fixture host projects on disk.

use blockpm::cache::{Cache, SyncOutcome};
use blockpm::generator::ScaffoldGenerator;
use blockpm::integrator::{CollectingSink, IntegrateOptions, Integrator, Stage, StageEvent};
use blockpm::source::RouteOrigin;
use blockpm::test_utils::{
    BlockSourceFixture, HostProjectFixture, RecordingInstaller, init_test_logging,
};
use blockpm::BlockpmError;
use tempfile::TempDir;

fn integrator(
    staging: &TempDir,
) -> Integrator<Cache, RecordingInstaller, ScaffoldGenerator> {
    Integrator::new(
        Cache::with_dir(staging.path().to_path_buf()),
        RecordingInstaller::new(),
        ScaffoldGenerator::new(),
    )
}

#[tokio::test]
async fn page_block_with_sub_blocks_lands_in_pages_and_components() {
    init_test_logging();
    let block = BlockSourceFixture::page("user-landing", &["fancy-card", "data-grid"]).unwrap();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let sink = CollectingSink::new();
    let result = integrator(&staging)
        .run(
            &IntegrateOptions::new(block.locator(), host.path()),
            &sink,
        )
        .await
        .unwrap();

    assert!(result.is_page_block);
    assert_eq!(result.sync, SyncOutcome::Local);
    assert_eq!(result.name, "user-landing");

    // Page files under src/pages, sub-blocks under the shared components dir.
    let page_dir = host.path().join("src/pages/UserLanding");
    assert!(page_dir.join("index.jsx").exists());
    assert!(host.path().join("src/components/FancyCard/index.jsx").exists());
    assert!(host.path().join("src/components/DataGrid/index.jsx").exists());
    // The sub-block sources were not duplicated into the page folder.
    assert!(!page_dir.join("blocks/fancy-card").exists());

    // Route injected and reported.
    assert!(result.route_created);
    assert_eq!(result.route_path, "/user-landing");
    assert_eq!(result.route_origin, RouteOrigin::Derived);
    let routes = std::fs::read_to_string(host.routes_file()).unwrap();
    assert!(routes.contains("\"/user-landing\""));
    assert!(routes.contains("UserLanding"));

    // Page mode never touches the component index.
    assert!(!result.container_import_added);
    let index = std::fs::read_to_string(host.components_index()).unwrap();
    assert!(!index.contains("UserLanding"));

    // Advisory URL from the default dev port.
    assert_eq!(
        result.view_url.as_deref(),
        Some("http://127.0.0.1:3333/user-landing")
    );

    // The log reached the sink in stage order.
    let stages = sink.succeeded_stages();
    assert_eq!(
        stages,
        vec![
            Stage::Resolve,
            Stage::Sync,
            Stage::Manifest,
            Stage::Dependencies,
            Stage::Generate,
            Stage::SubBlocks,
            Stage::Route,
            Stage::ViewUrl,
        ]
    );
    assert_eq!(sink.events(), result.log);
}

#[tokio::test]
async fn component_block_nests_sub_blocks_and_updates_the_index() {
    init_test_logging();
    // A component-mode source still listing one sub-block.
    let block = BlockSourceFixture::with_manifest(&serde_json::json!({
        "name": "@ali/fancy-card",
        "dependencies": { "classnames": "^2.3.0" },
        "blockConfig": {
            "dependencies": ["./blocks/card-footer"]
        }
    }))
    .unwrap();
    let sub_dir = block.path().join("blocks/card-footer");
    std::fs::create_dir_all(&sub_dir).unwrap();
    std::fs::write(sub_dir.join("package.json"), r#"{"name": "card-footer"}"#).unwrap();
    std::fs::write(sub_dir.join("index.jsx"), "export default () => null;\n").unwrap();

    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let sink = CollectingSink::new();
    let result = integrator(&staging)
        .run(
            &IntegrateOptions::new(block.locator(), host.path()),
            &sink,
        )
        .await
        .unwrap();

    assert!(!result.is_page_block);
    assert_eq!(result.generated.block_folder_name, "AliFancyCard");

    // Sub-block nested under the primary component's folder.
    let primary = host.path().join("src/components/AliFancyCard");
    assert!(primary.join("index.jsx").exists());
    assert!(primary.join("CardFooter/index.jsx").exists());

    // Container index exports the component; nothing touched the routes.
    assert!(result.container_import_added);
    let index = std::fs::read_to_string(host.components_index()).unwrap();
    assert!(index.contains("export { default as AliFancyCard } from './AliFancyCard';"));
    assert!(!result.route_created);
    assert_eq!(std::fs::read_to_string(host.routes_file()).unwrap().trim(), "[]");
    assert!(result.view_url.is_none());
}

#[tokio::test]
async fn sub_block_locator_may_point_outside_the_source_dir() {
    init_test_logging();
    // A page whose sub-block lives in a sibling directory, reached via `..`.
    let outer = TempDir::new().unwrap();
    let page_dir = outer.path().join("landing");
    std::fs::create_dir_all(&page_dir).unwrap();
    std::fs::write(
        page_dir.join("package.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "name": "landing",
            "blockConfig": {
                "specVersion": "0.1",
                "dependencies": ["../shared-ui"]
            }
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(page_dir.join("index.jsx"), "export default () => null;\n").unwrap();

    let sub_dir = outer.path().join("shared-ui");
    std::fs::create_dir_all(&sub_dir).unwrap();
    std::fs::write(sub_dir.join("package.json"), r#"{"name": "shared-ui"}"#).unwrap();
    std::fs::write(sub_dir.join("index.jsx"), "export default () => null;\n").unwrap();

    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let sink = CollectingSink::new();
    let result = integrator(&staging)
        .run(
            &IntegrateOptions::new(page_dir.display().to_string(), host.path()),
            &sink,
        )
        .await
        .unwrap();

    assert_eq!(result.sub_blocks.len(), 1);
    assert_eq!(result.sub_blocks[0].block_folder_name, "SharedUi");
    assert!(host.path().join("src/components/SharedUi/index.jsx").exists());
}

#[tokio::test]
async fn dry_run_computes_everything_but_writes_nothing() {
    init_test_logging();
    let block = BlockSourceFixture::page("user-landing", &["fancy-card"]).unwrap();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let store = Cache::with_dir(staging.path().to_path_buf());
    let installer = RecordingInstaller::new();
    let pipeline = Integrator::new(store, installer, ScaffoldGenerator::new());

    let mut options = IntegrateOptions::new(block.locator(), host.path());
    options.dry_run = true;

    let sink = CollectingSink::new();
    let result = pipeline.run(&options, &sink).await.unwrap();

    // All paths computed.
    assert_eq!(
        result.generated.block_folder_path,
        host.path().join("src/pages/UserLanding")
    );
    assert!(!result.generated.generated_paths.is_empty());
    assert_eq!(result.sub_blocks.len(), 1);
    assert!(result.view_url.is_some());

    // Nothing materialized in the host project.
    assert!(!result.generated.block_folder_path.exists());
    assert!(!host.path().join("src/components/FancyCard").exists());
    assert_eq!(std::fs::read_to_string(host.routes_file()).unwrap().trim(), "[]");
    assert_eq!(std::fs::read_to_string(host.components_index()).unwrap(), "");
    assert!(!result.route_created);
    assert!(!result.container_import_added);
}

#[tokio::test]
async fn explicit_route_path_is_normalized() {
    init_test_logging();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    for raw in ["demo", "/demo"] {
        let block = BlockSourceFixture::page("some-page", &[]).unwrap();
        let mut options = IntegrateOptions::new(block.locator(), host.path());
        options.route_path = Some(raw.to_string());
        options.dry_run = true;

        let result = integrator(&staging)
            .run(&options, &blockpm::integrator::NullSink)
            .await
            .unwrap();
        assert_eq!(result.route_path, "/demo", "raw input {raw:?}");
        assert_eq!(result.route_origin, RouteOrigin::Explicit);
    }
}

#[tokio::test]
async fn sub_block_failure_aborts_with_typed_error() {
    init_test_logging();
    let block = BlockSourceFixture::page("user-landing", &["fancy-card"]).unwrap();
    // Break the sub-block: remove its manifest.
    std::fs::remove_file(block.path().join("blocks/fancy-card/package.json")).unwrap();

    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let sink = CollectingSink::new();
    let err = integrator(&staging)
        .run(
            &IntegrateOptions::new(block.locator(), host.path()),
            &sink,
        )
        .await
        .unwrap_err();

    let err = err.downcast::<BlockpmError>().unwrap();
    assert!(matches!(err, BlockpmError::SubBlockGenerationFailed { .. }));

    // The tree build fails during the manifest stage, before any host write.
    assert!(sink.events().iter().any(|e| matches!(
        e,
        StageEvent::StageFailed { stage: Stage::Manifest, .. }
    )));
    assert_eq!(std::fs::read_to_string(host.routes_file()).unwrap().trim(), "[]");
}

#[tokio::test]
async fn missing_source_is_gated_before_any_mutation() {
    init_test_logging();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let err = integrator(&staging)
        .run(
            &IntegrateOptions::new("/nonexistent/block", host.path()),
            &blockpm::integrator::NullSink,
        )
        .await
        .unwrap_err();

    let err = err.downcast::<BlockpmError>().unwrap();
    assert!(matches!(err, BlockpmError::MissingSourceFiles { .. }));
}

#[tokio::test]
async fn host_without_config_routes_skips_injection() {
    init_test_logging();
    let block = BlockSourceFixture::page("landing", &[]).unwrap();
    let host = HostProjectFixture::without_routes().unwrap();
    let staging = TempDir::new().unwrap();

    let result = integrator(&staging)
        .run(
            &IntegrateOptions::new(block.locator(), host.path()),
            &blockpm::integrator::NullSink,
        )
        .await
        .unwrap();

    // Generation succeeded, route injection downgraded to a skip.
    assert!(host.path().join("src/pages/Landing/index.jsx").exists());
    assert!(!result.route_created);
    assert!(!host.routes_file().exists());
}

#[tokio::test]
async fn layout_block_gets_nested_routes_placeholder() {
    init_test_logging();
    let block = BlockSourceFixture::page("admin-shell", &[]).unwrap();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let mut options = IntegrateOptions::new(block.locator(), host.path());
    options.layout = true;

    integrator(&staging)
        .run(&options, &blockpm::integrator::NullSink)
        .await
        .unwrap();

    let routes: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(host.routes_file()).unwrap()).unwrap();
    assert_eq!(routes[0]["path"], "/admin-shell");
    assert_eq!(routes[0]["routes"], serde_json::json!([]));
}

#[tokio::test]
async fn repeated_add_is_idempotent_for_route_and_import() {
    init_test_logging();
    let block = BlockSourceFixture::component("fancy-card").unwrap();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let pipeline = integrator(&staging);
    let options = IntegrateOptions::new(block.locator(), host.path());

    let first = pipeline.run(&options, &blockpm::integrator::NullSink).await.unwrap();
    assert!(first.container_import_added);

    let second = pipeline.run(&options, &blockpm::integrator::NullSink).await.unwrap();
    assert!(!second.container_import_added);

    let index = std::fs::read_to_string(host.components_index()).unwrap();
    assert_eq!(index.matches("FancyCard").count(), 2, "one export line, two mentions");
    assert_eq!(index.matches("default as FancyCard").count(), 1);
}

#[tokio::test]
async fn skip_deps_reaches_the_installer_as_a_skip() {
    init_test_logging();
    let block = BlockSourceFixture::component("fancy-card").unwrap();
    let host = HostProjectFixture::new().unwrap();
    let staging = TempDir::new().unwrap();

    let store = Cache::with_dir(staging.path().to_path_buf());
    let installer = RecordingInstaller::new();
    let pipeline = Integrator::new(store, installer, ScaffoldGenerator::new());

    let mut options = IntegrateOptions::new(block.locator(), host.path());
    options.skip_deps = true;
    let result = pipeline.run(&options, &blockpm::integrator::NullSink).await.unwrap();

    assert!(result.install.skipped);
}
