//! REST API tests, driven through the router without binding a socket.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use base64::Engine;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use registry_admin::server::{AppState, create_router};
use registry_admin::store::{SqliteStore, Store};
use registry_admin::types::{Access, RegistryEntry};

const ADMIN: (&str, &str) = ("admin", "admin");
const EVENTS_MEDIA_TYPE: &str = "application/vnd.docker.distribution.events.v1+json";

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response is not JSON")
    }
}

struct TestApp {
    _temp_dir: TempDir,
    store: Arc<SqliteStore>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let store = Arc::new(SqliteStore::new(temp_dir.path().join("test.db")));
        store
            .connect(CancellationToken::new())
            .expect("failed to connect");
        let router = create_router(Arc::new(AppState::new(store.clone())));
        Self {
            _temp_dir: temp_dir,
            store,
            router,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        auth: Option<(&str, &str)>,
        body: Option<(&str, String)>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((login, password)) = auth {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{login}:{password}"));
            builder = builder.header(header::AUTHORIZATION, format!("Basic {encoded}"));
        }
        let request = match body {
            Some((content_type, body)) => builder
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        Reply {
            status,
            headers,
            body,
        }
    }

    async fn get(&self, uri: &str, auth: (&str, &str)) -> Reply {
        self.send(Method::GET, uri, Some(auth), None).await
    }

    async fn delete(&self, uri: &str, auth: (&str, &str)) -> Reply {
        self.send(Method::DELETE, uri, Some(auth), None).await
    }

    async fn post(&self, uri: &str, auth: (&str, &str), body: Value) -> Reply {
        self.send(
            Method::POST,
            uri,
            Some(auth),
            Some(("application/json", body.to_string())),
        )
        .await
    }

    async fn put(&self, uri: &str, auth: (&str, &str), body: Value) -> Reply {
        self.send(
            Method::PUT,
            uri,
            Some(auth),
            Some(("application/json", body.to_string())),
        )
        .await
    }

    async fn add_user(&self, login: &str, role: &str) -> i64 {
        let reply = self
            .post(
                "/api/v1/users",
                ADMIN,
                json!({"login": login, "name": login, "password": "password", "role": role}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.json()["data"]["id"].as_i64().expect("user id")
    }

    async fn push_events(&self, auth: (&str, &str), events: Value) -> Reply {
        self.send(
            Method::POST,
            "/api/v1/registry/events",
            Some(auth),
            Some((EVENTS_MEDIA_TYPE, json!({ "events": events }).to_string())),
        )
        .await
    }

    fn add_entry(&self, name: &str, tag: &str) {
        let mut entry = RegistryEntry {
            repository_name: name.to_string(),
            tag: tag.to_string(),
            digest: format!("sha256:{name}-{tag}"),
            timestamp: 100,
            ..Default::default()
        };
        self.store
            .create_repository(&mut entry)
            .expect("failed to create entry");
    }

    fn grant(&self, owner: i64, resource_name: &str) {
        let mut access = Access {
            owner,
            name: format!("{resource_name} pull"),
            resource_type: "repository".to_string(),
            resource_name: resource_name.to_string(),
            action: "pull".to_string(),
            ..Default::default()
        };
        self.store
            .create_access(&mut access)
            .expect("failed to create access");
    }
}

fn list_uri(path: &str, filter: Value, range: [i64; 2], sort: [&str; 2]) -> String {
    format!(
        "{path}?filter={}&range={}&sort={}",
        urlencoding::encode(&filter.to_string()),
        urlencoding::encode(&json!(range).to_string()),
        urlencoding::encode(&json!(sort).to_string()),
    )
}

fn push_event(repository: &str, tag: &str, digest: &str) -> Value {
    json!({
        "id": format!("push-{repository}-{tag}"),
        "timestamp": "2022-10-31T16:06:35.291Z",
        "action": "push",
        "target": {
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "size": 708,
            "digest": digest,
            "repository": repository,
            "tag": tag,
            "references": [{
                "mediaType": "application/vnd.docker.container.image.v1+json",
                "size": 1469,
                "digest": "sha256:config"
            }]
        }
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(&reply.body[..], b"OK");
}

#[tokio::test]
async fn test_requires_basic_auth() {
    let app = TestApp::new();

    let reply = app.send(Method::GET, "/api/v1/users", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        reply.headers[header::WWW_AUTHENTICATE],
        "Basic realm=\"registry-admin\""
    );

    let reply = app.get("/api/v1/users", ("admin", "wrong")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.json()["error"], "Invalid login or password");
}

#[tokio::test]
async fn test_user_crud() {
    let app = TestApp::new();

    let reply = app
        .post(
            "/api/v1/users",
            ADMIN,
            json!({"login": "dev", "name": "Dev", "password": "secret", "role": "user"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let created = reply.json()["data"].clone();
    assert!(created.get("password").is_none());
    assert_eq!(created["group"], 1);
    let id = created["id"].as_i64().unwrap();

    let reply = app.get("/api/v1/users/dev", ADMIN).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"]["id"], id);
    assert!(reply.json()["data"].get("password").is_none());

    let reply = app
        .put(
            &format!("/api/v1/users/{id}"),
            ADMIN,
            json!({"name": "Developer", "login": "renamed"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"]["name"], "Developer");
    assert_eq!(reply.json()["data"]["login"], "dev");

    // The stored password survives an update without one.
    let reply = app.get("/api/v1/registry/catalog", ("dev", "secret")).await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.delete(&format!("/api/v1/users/{id}"), ADMIN).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let reply = app.get(&format!("/api/v1/users/{id}"), ADMIN).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_permissions() {
    let app = TestApp::new();
    app.add_user("viewer", "user").await;
    app.add_user("lead", "manager").await;
    let viewer = ("viewer", "password");
    let lead = ("lead", "password");

    let reply = app.get("/api/v1/users", viewer).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.get("/api/v1/users", lead).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["total"], 3);

    let reply = app
        .post("/api/v1/groups", lead, json!({"name": "devs"}))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["error"], "Admin access required");
}

#[tokio::test]
async fn test_disabled_user_is_rejected() {
    let app = TestApp::new();
    let id = app.add_user("dev", "admin").await;

    let reply = app
        .put(&format!("/api/v1/users/{id}"), ADMIN, json!({"disabled": true}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.get("/api/v1/users", ("dev", "password")).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_list_users_with_filter_range_and_sort() {
    let app = TestApp::new();
    for login in ["foo", "bar", "baz", "qux"] {
        app.add_user(login, "user").await;
    }

    let uri = list_uri(
        "/api/v1/users",
        json!({"q": "ba", "disabled": 0}),
        [0, 0],
        ["id", "ASC"],
    );
    let reply = app.get(&uri, ADMIN).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::CONTENT_RANGE], "users 0-0/2");
    let body = reply.json();
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["login"], "bar");
    assert!(body["data"][0].get("password").is_none());

    let uri = list_uri("/api/v1/users", json!({}), [1, 3], ["login", "DESC"]);
    let reply = app.get(&uri, ADMIN).await;
    assert_eq!(reply.headers[header::CONTENT_RANGE], "users 1-3/5");
    let logins: Vec<_> = reply.json()["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["login"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(logins, vec!["foo", "baz", "bar"]);
}

#[tokio::test]
async fn test_bad_list_queries() {
    let app = TestApp::new();

    let reply = app.get("/api/v1/users?filter=%7Bnot-json", ADMIN).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let uri = list_uri("/api/v1/users", json!({}), [0, 9], ["id;drop", "asc"]);
    let reply = app.get(&uri, ADMIN).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_errors() {
    let app = TestApp::new();

    let reply = app.post("/api/v1/users", ADMIN, json!({})).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.json()["error"],
        "required user fields not set: Login, Name, Password, role '' not allowed"
    );

    app.add_user("dev", "user").await;
    let reply = app
        .post(
            "/api/v1/users",
            ADMIN,
            json!({"login": "dev", "name": "Dev", "password": "x", "role": "user"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .put("/api/v1/groups/999", ADMIN, json!({"name": "ghost"}))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_delete_itself() {
    let app = TestApp::new();
    let reply = app.delete("/api/v1/users/1", ADMIN).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app.get("/api/v1/users/admin", ADMIN).await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_access_rules() {
    let app = TestApp::new();
    let id = app.add_user("dev", "user").await;

    let rule = json!({
        "owner_id": id,
        "name": "web pull",
        "type": "repository",
        "resource_name": "app/web",
        "action": "pull:push"
    });
    let reply = app.post("/api/v1/access", ADMIN, rule.clone()).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let access_id = reply.json()["data"]["id"].as_i64().unwrap();

    let reply = app.post("/api/v1/access", ADMIN, rule).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .put(
            &format!("/api/v1/access/{access_id}"),
            ADMIN,
            json!({"action": "pull:drop"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .post(
            "/api/v1/access",
            ADMIN,
            json!({"owner_id": id, "name": "x", "type": "bucket", "resource_name": "x", "action": "pull"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .put(
            &format!("/api/v1/access/{access_id}"),
            ADMIN,
            json!({"disabled": true}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"]["disabled"], true);
    assert_eq!(reply.json()["data"]["resource_name"], "app/web");
}

#[tokio::test]
async fn test_delete_user_removes_access_rules() {
    let app = TestApp::new();
    let id = app.add_user("dev", "user").await;
    app.grant(id, "app/web");
    app.grant(id, "app/api");

    let uri = list_uri(
        "/api/v1/access",
        json!({"owner_id": id}),
        [0, 9],
        ["id", "ASC"],
    );
    assert_eq!(app.get(&uri, ADMIN).await.json()["total"], 2);

    let reply = app.delete(&format!("/api/v1/users/{id}"), ADMIN).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let reply = app.get(&uri, ADMIN).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["total"], 0);
}

#[tokio::test]
async fn test_delete_group_removes_group_rules() {
    let app = TestApp::new();
    let reply = app
        .post("/api/v1/groups", ADMIN, json!({"name": "devs"}))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let group_id = reply.json()["data"]["id"].as_i64().unwrap();

    let reply = app
        .post(
            "/api/v1/access",
            ADMIN,
            json!({"owner_id": group_id, "is_group": true, "name": "devs pull",
                   "type": "repository", "resource_name": "app/web", "action": "pull"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let access_id = reply.json()["data"]["id"].as_i64().unwrap();

    let reply = app.delete(&format!("/api/v1/groups/{group_id}"), ADMIN).await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let reply = app.get(&format!("/api/v1/access/{access_id}"), ADMIN).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registry_events() {
    let app = TestApp::new();

    let reply = app
        .push_events(
            ADMIN,
            json!([
                push_event("app/web", "latest", "sha256:one"),
                {"action": "push", "target": {"repository": "app/web", "digest": "sha256:blob"}},
                {"action": "mount", "target": {"repository": "app/web"}}
            ]),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"], json!({"processed": 1, "skipped": 2}));

    let pull = json!({"action": "pull", "target": {"repository": "app/web", "tag": "latest"}});
    let reply = app.push_events(ADMIN, json!([pull.clone(), pull])).await;
    assert_eq!(reply.status, StatusCode::OK);

    // A second push of the tag refreshes the entry in place.
    let reply = app
        .push_events(ADMIN, json!([push_event("app/web", "latest", "sha256:two")]))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = app.get("/api/v1/registry/catalog", ADMIN).await;
    let body = reply.json();
    assert_eq!(body["total"], 1);
    let entry = &body["data"][0];
    assert_eq!(entry["digest"], "sha256:two");
    assert_eq!(entry["config_digest"], "sha256:config");
    assert_eq!(entry["pull_counter"], 2);
    assert_eq!(entry["size"], 708);
    assert_eq!(entry["timestamp"], 1667232395);

    let id = entry["id"].as_i64().unwrap();
    let reply = app.get(&format!("/api/v1/registry/catalog/{id}"), ADMIN).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json()["data"]["raw"].as_str().unwrap().contains("sha256:two"));

    let delete = json!({"action": "delete", "target": {"repository": "app/web", "digest": "sha256:two"}});
    let reply = app.push_events(ADMIN, json!([delete])).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/v1/registry/catalog", ADMIN).await.json()["total"],
        0
    );
}

#[tokio::test]
async fn test_registry_events_keep_keyword_names_intact() {
    let app = TestApp::new();

    for digest in ["sha256:one", "sha256:two"] {
        let reply = app
            .push_events(ADMIN, json!([push_event("update-service", "latest", digest)]))
            .await;
        assert_eq!(reply.status, StatusCode::OK, "push {digest}");
    }

    let pull = json!({"action": "pull", "target": {"repository": "update-service", "tag": "latest"}});
    let reply = app.push_events(ADMIN, json!([pull])).await;
    assert_eq!(reply.status, StatusCode::OK);

    let entry = app
        .store
        .get_repository_by_name_tag("update-service", "latest")
        .unwrap()
        .expect("entry missing");
    assert_eq!(entry.digest, "sha256:two");
    assert_eq!(entry.pull_counter, 1);

    let reply = app.get("/api/v1/registry/catalog?group_by=none", ADMIN).await;
    assert_eq!(reply.json()["total"], 1);
}

#[tokio::test]
async fn test_registry_events_reject_bad_envelopes() {
    let app = TestApp::new();

    let reply = app
        .send(
            Method::POST,
            "/api/v1/registry/events",
            Some(ADMIN),
            Some((EVENTS_MEDIA_TYPE, "not json".to_string())),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let missing_digest = json!({"action": "push", "target": {"repository": "app/web", "tag": "v1"}});
    let reply = app.push_events(ADMIN, json!([missing_digest])).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_visibility() {
    let app = TestApp::new();
    let id = app.add_user("dev", "user").await;
    app.add_entry("app/web", "1.0");
    app.add_entry("app/web", "1.1");
    app.add_entry("app/api", "1.0");
    app.grant(id, "app/web");

    let reply = app.get("/api/v1/registry/catalog", ("dev", "password")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["repository_name"], "app/web");

    let reply = app
        .get("/api/v1/registry/catalog?group_by=none", ("dev", "password"))
        .await;
    assert_eq!(reply.json()["total"], 2);

    let reply = app.get("/api/v1/registry/catalog", ADMIN).await;
    assert_eq!(reply.json()["total"], 2);

    let reply = app.get("/api/v1/registry/catalog?group_by=none", ADMIN).await;
    assert_eq!(reply.json()["total"], 3);

    let reply = app.get("/api/v1/registry/catalog?group_by=%6Eone", ADMIN).await;
    assert_eq!(reply.json()["total"], 3);

    let reply = app.get("/api/v1/registry/catalog/1", ("dev", "password")).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_garbage_collection() {
    let app = TestApp::new();
    app.add_entry("app/web", "1.0");
    app.grant(7, "app/web");

    let reply = app
        .post("/api/v1/registry/gc", ADMIN, json!({"sync_date": 200}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.json()["data"],
        json!({"repositories": 1, "access": 1})
    );

    let reply = app
        .post("/api/v1/registry/gc", ADMIN, json!({"sync_date": 200}))
        .await;
    assert_eq!(
        reply.json()["data"],
        json!({"repositories": 0, "access": 0})
    );
}
