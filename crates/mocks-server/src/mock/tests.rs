use super::*;
use crate::config::MocksConfig;
use crate::variant_handlers::MockRequest;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::{HeaderMap, Method};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Fixture {
    mock: Arc<Mock>,
    options: Arc<Options>,
    alerts: Alerts,
    loaders: MockLoaders,
}

fn fixture(config: MocksConfig) -> Fixture {
    let options = Options::new(&config);
    let alerts = Alerts::new();
    let mock = Mock::new(
        &options,
        &alerts.collection("mock"),
        Arc::new(VariantHandlers::default()),
    );
    let loaders = mock.create_loaders("test");
    Fixture {
        mock,
        options,
        alerts,
        loaders,
    }
}

fn selecting(id: &str) -> MocksConfig {
    let mut config = MocksConfig::default();
    config.mock.collections.selected = Some(id.to_string());
    config
}

fn user_routes() -> Vec<Value> {
    vec![
        json!({
            "id": "get-user",
            "url": "/api/users/:id",
            "method": "GET",
            "variants": [
                {"id": "1", "type": "json", "options": {"status": 200, "body": {"name": "John"}}},
                {"id": "2", "type": "json", "options": {"status": 200, "body": {"name": "Jane"}}}
            ]
        }),
        json!({
            "id": "get-users",
            "url": "/api/users",
            "method": "GET",
            "variants": [
                {"id": "all", "type": "json", "options": {"status": 200, "body": []}},
                {"id": "error", "type": "status", "options": {"status": 500}}
            ]
        }),
        json!({
            "id": "health",
            "url": "/api/health",
            "method": "GET",
            "delay": 500,
            "variants": [
                {"id": "ok", "type": "status", "options": {"status": 200}, "delay": 0},
                {"id": "slow", "type": "status", "options": {"status": 200}}
            ]
        }),
    ]
}

fn user_collections() -> Vec<Value> {
    vec![
        json!({"id": "base", "routes": ["get-users:all", "get-user:1"]}),
        json!({"id": "alt", "from": "base", "routes": ["get-user:2"]}),
    ]
}

fn load(fixture: &Fixture, routes: Vec<Value>, collections: Vec<Value>) {
    fixture.loaders.load(routes, collections);
}

fn served(mock: &Mock) -> Vec<String> {
    mock.current_route_variants()
        .iter()
        .map(|v| v.route_variant_id())
        .collect()
}

async fn get(mock: &Mock, path: &str) -> Option<Value> {
    let matched = mock.mounted().find(&Method::GET, path)?;
    let request = MockRequest {
        method: Method::GET,
        uri: path.parse().unwrap(),
        headers: HeaderMap::new(),
        params: matched.params.clone(),
        body: Bytes::new(),
    };
    let response = matched.mounted.responder().respond(&request).await;
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Some(serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_selected_collection_decides_the_served_variant() {
    let f = fixture(selecting("alt"));
    load(&f, user_routes(), user_collections());

    assert_eq!(f.mock.selected_collection().as_deref(), Some("alt"));
    assert_eq!(
        get(&f.mock, "/api/users/1").await,
        Some(json!({"name": "Jane"}))
    );

    f.mock.select_collection("base").unwrap();
    assert_eq!(f.mock.selected_collection().as_deref(), Some("base"));
    assert_eq!(
        get(&f.mock, "/api/users/1").await,
        Some(json!({"name": "John"}))
    );
}

#[test]
fn test_inherited_route_keeps_base_position() {
    let f = fixture(selecting("alt"));
    load(&f, user_routes(), user_collections());

    let alt = f.mock.collection("alt").unwrap();
    assert_eq!(alt.defined_routes, vec!["get-user:2"]);
    assert_eq!(alt.routes, vec!["get-users:all", "get-user:2"]);
    assert_eq!(served(&f.mock), vec!["get-users:all", "get-user:2"]);
}

#[test]
fn test_recompute_is_idempotent() {
    let f = fixture(selecting("alt"));
    load(&f, user_routes(), user_collections());
    f.mock.use_route_variant("health:ok").unwrap();

    let before = served(&f.mock);
    f.mock.recompute();
    f.mock.recompute();
    assert_eq!(served(&f.mock), before);
}

#[test]
fn test_custom_route_variant_and_restore() {
    let f = fixture(selecting("base"));
    load(&f, user_routes(), user_collections());
    let original = served(&f.mock);

    f.mock.use_route_variant("get-user:2").unwrap();
    assert_eq!(served(&f.mock), vec!["get-users:all", "get-user:2"]);

    f.mock.use_route_variant("health:slow").unwrap();
    assert_eq!(
        served(&f.mock),
        vec!["get-users:all", "get-user:2", "health:slow"]
    );
    assert_eq!(
        f.mock.custom_route_variants(),
        vec!["get-user:2", "health:slow"]
    );

    f.mock.use_route_variant("health:ok").unwrap();
    assert_eq!(
        f.mock.custom_route_variants(),
        vec!["get-user:2", "health:ok"]
    );

    f.mock.restore_route_variants();
    assert_eq!(served(&f.mock), original);
    assert!(f.mock.custom_route_variants().is_empty());
}

#[test]
fn test_unknown_custom_route_variant_changes_nothing() {
    let f = fixture(selecting("base"));
    load(&f, user_routes(), user_collections());
    let before = served(&f.mock);

    let err = f.mock.use_route_variant("get-user:99").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Route variant with id \"get-user:99\" was not found"
    );
    assert_eq!(served(&f.mock), before);
    assert!(f.mock.custom_route_variants().is_empty());
}

#[test]
fn test_custom_route_variants_survive_selection_and_reload() {
    let f = fixture(selecting("base"));
    load(&f, user_routes(), user_collections());
    f.mock.use_route_variant("get-users:error").unwrap();

    f.mock.select_collection("alt").unwrap();
    assert_eq!(served(&f.mock), vec!["get-users:error", "get-user:2"]);

    // The variant disappears from the definitions: it is skipped, not lost
    let mut routes = user_routes();
    routes[1]["variants"].as_array_mut().unwrap().pop();
    f.loaders.routes.load(routes);
    assert_eq!(served(&f.mock), vec!["get-users:all", "get-user:2"]);
    assert_eq!(f.mock.custom_route_variants(), vec!["get-users:error"]);

    f.loaders.routes.load(user_routes());
    assert_eq!(served(&f.mock), vec!["get-users:error", "get-user:2"]);
}

#[test]
fn test_duplicated_collection_keeps_first_data() {
    let f = fixture(selecting("x"));
    load(
        &f,
        user_routes(),
        vec![
            json!({"id": "x", "routes": ["get-user:1"]}),
            json!({"id": "x", "routes": ["get-user:2"]}),
        ],
    );

    let collections = f.mock.plain_collections();
    assert_eq!(collections.len(), 1);
    assert_eq!(
        serde_json::to_value(&collections[0]).unwrap(),
        json!({"id": "x", "from": null, "definedRoutes": ["get-user:1"], "routes": ["get-user:1"]})
    );
    assert!(f
        .alerts
        .find("mock:collections:load:x:duplicated")
        .is_some());
}

#[test]
fn test_unresolvable_reference_excludes_collection() {
    let f = fixture(selecting("base"));
    let mut collections = user_collections();
    collections.push(json!({"id": "bad", "routes": ["no-such-route:1"]}));
    load(&f, user_routes(), collections);

    let ids: Vec<String> = f.mock.collections().iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec!["base", "alt"]);

    let bad_alerts: Vec<String> = f
        .alerts
        .flat()
        .into_iter()
        .map(|a| a.id)
        .filter(|id| id.contains(":bad:"))
        .collect();
    assert_eq!(bad_alerts, vec!["mock:collections:load:bad:variants"]);
    assert!(f.alerts.find("mock:collections:load").is_some());
}

#[test]
fn test_selection_falls_back_to_first_collection() {
    let f = fixture(selecting("nope"));
    load(&f, user_routes(), user_collections());

    assert_eq!(f.mock.selected_collection().as_deref(), Some("base"));
    assert!(f.alerts.find("mock:collections:selected").is_some());

    f.options
        .mock
        .selected_collection
        .set(Some("alt".to_string()));
    assert_eq!(f.mock.selected_collection().as_deref(), Some("alt"));
    assert!(f.alerts.find("mock:collections:selected").is_none());
}

#[test]
fn test_select_unknown_collection_fails() {
    let f = fixture(selecting("base"));
    load(&f, user_routes(), user_collections());

    assert!(matches!(
        f.mock.select_collection("ghost"),
        Err(MockError::CollectionNotFound(_))
    ));
    assert_eq!(f.mock.selected_collection().as_deref(), Some("base"));
}

#[test]
fn test_no_collections() {
    let f = fixture(MocksConfig::default());
    load(&f, user_routes(), vec![]);

    assert_eq!(f.mock.selected_collection(), None);
    assert!(f.mock.mounted().is_empty());
    assert!(f.alerts.find("mock:collections:empty").is_some());
}

#[test]
fn test_load_waits_for_every_loader() {
    let f = fixture(selecting("base"));
    let plugin = f.mock.create_loaders("plugin");

    load(&f, user_routes(), user_collections());
    assert!(f.mock.routes().is_empty());

    plugin.routes.load(vec![]);
    plugin.collections.load(vec![json!({"id": "extra", "routes": ["health:ok"]})]);
    assert_eq!(f.mock.routes().len(), 3);
    assert_eq!(f.mock.collections().len(), 3);
}

#[test]
fn test_delay_precedence() {
    let mut config = selecting("base");
    config.mock.routes.delay = 1000;
    let f = fixture(config);
    load(&f, user_routes(), user_collections());

    assert_eq!(f.mock.delay_for("health:ok"), Some(0));
    assert_eq!(f.mock.delay_for("health:slow"), Some(500));
    assert_eq!(f.mock.delay_for("get-user:1"), Some(1000));
    assert_eq!(f.mock.delay_for("missing:1"), None);

    f.options.mock.delay.set(20);
    assert_eq!(f.mock.delay_for("get-user:1"), Some(20));
}

#[test]
fn test_on_change_notifications() {
    let f = fixture(selecting("base"));
    let changes = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&changes);
    let subscription = f.mock.on_change(move || {
        c.fetch_add(1, Ordering::SeqCst);
    });

    load(&f, user_routes(), user_collections());
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    f.mock.use_route_variant("get-user:2").unwrap();
    f.mock.restore_route_variants();
    assert_eq!(changes.load(Ordering::SeqCst), 3);

    subscription.unsubscribe();
    f.mock.restore_route_variants();
    assert_eq!(changes.load(Ordering::SeqCst), 3);
}

#[test]
fn test_reload_of_routes_and_collections_notifies_once() {
    let f = fixture(selecting("alt"));
    load(&f, user_routes(), user_collections());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (mock, alerts, s) = (Arc::downgrade(&f.mock), f.alerts.clone(), Arc::clone(&seen));
    let subscription = f.mock.on_change(move || {
        if let Some(mock) = mock.upgrade() {
            s.lock()
                .push((mock.selected_collection(), served(&mock), alerts.flat().len()));
        }
    });

    let mut routes = user_routes();
    routes[0]["variants"][1]["id"] = json!("jane");
    let collections = vec![
        json!({"id": "base", "routes": ["get-users:all", "get-user:1"]}),
        json!({"id": "alt", "from": "base", "routes": ["get-user:jane"]}),
    ];
    f.loaders.load(routes, collections);

    assert_eq!(
        *seen.lock(),
        vec![(
            Some("alt".to_string()),
            vec!["get-users:all".to_string(), "get-user:jane".to_string()],
            0
        )]
    );
    assert!(f.alerts.flat().is_empty());
    subscription.unsubscribe();
}

#[test]
fn test_alert_listeners_may_read_the_mock() {
    let f = fixture(selecting("base"));
    load(&f, user_routes(), user_collections());

    let reads = Arc::new(AtomicUsize::new(0));
    let (mock, r) = (Arc::downgrade(&f.mock), Arc::clone(&reads));
    let _subscription = f.alerts.on_change(move || {
        if let Some(mock) = mock.upgrade() {
            let _ = mock.collections();
            let _ = mock.current_route_variants();
            r.fetch_add(1, Ordering::SeqCst);
        }
    });

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let options = Arc::clone(&f.options);
    std::thread::spawn(move || {
        options
            .mock
            .selected_collection
            .set(Some("unknown".to_string()));
        let _ = done_tx.send(());
    });

    assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    assert!(reads.load(Ordering::SeqCst) > 0);
    assert_eq!(f.mock.selected_collection().as_deref(), Some("base"));
    assert!(f.alerts.find("mock:collections:selected").is_some());
}

#[test]
fn test_plain_projections() {
    let f = fixture(selecting("base"));
    load(&f, user_routes(), user_collections());

    let routes = serde_json::to_value(f.mock.plain_routes()).unwrap();
    assert_eq!(
        routes[2],
        json!({
            "id": "health",
            "url": "/api/health",
            "method": "GET",
            "delay": 500,
            "variants": ["health:ok", "health:slow"]
        })
    );

    let variants = serde_json::to_value(f.mock.plain_variants()).unwrap();
    assert_eq!(variants.as_array().unwrap().len(), 6);
    assert_eq!(
        variants[4],
        json!({
            "id": "health:ok",
            "route": "health",
            "type": "status",
            "disabled": false,
            "preview": {"status": 200},
            "delay": 0
        })
    );
}

#[test]
fn test_route_validation_isolated_in_mock() {
    let f = fixture(selecting("base"));
    let mut routes = user_routes();
    routes.push(json!({"id": "broken", "method": "GET", "variants": []}));
    routes.push(json!({"id": "other", "url": "/other", "method": "GET", "variants": [
        {"id": "v", "type": "status", "options": {"status": 201}}
    ]}));
    load(&f, routes, user_collections());

    let ids: Vec<String> = f.mock.routes().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec!["get-user", "get-users", "health", "other"]);
    let alerts: Vec<String> = f.alerts.flat().into_iter().map(|a| a.id).collect();
    assert_eq!(alerts, vec!["mock:routes:load:broken:validation"]);
}
