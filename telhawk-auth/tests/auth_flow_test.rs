//! End-to-end flows against a live PostgreSQL. Each test provisions its own
//! database, runs the embedded migrations, and drives the router directly.
//!
//! All tests are ignored by default; run them with a reachable
//! `DATABASE_URL` and `cargo test -- --ignored`.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use sqlx::postgres::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

use telhawk_auth::config::{
    AuditConfig, AuthConfig, DatabaseConfig, ForwardConfig, JwtConfig, SecurityConfig,
    ServerConfig,
};
use telhawk_auth::models::{HecToken, User};
use telhawk_auth::services::{
    AuditLogger, AuthService, ContainmentIndex, Database, HecService, TokenService, UserService,
};
use telhawk_auth::utils::ids::new_id;
use telhawk_auth::utils::password::{hash_password, Password};
use telhawk_auth::{build_router, AppState};
use telhawk_core::config::Config as CoreConfig;

const TEST_BCRYPT_COST: u32 = 4;

struct TestHarness {
    app: Router,
    db: Database,
    pool: PgPool,
}

async fn setup() -> TestHarness {
    dotenvy::dotenv().ok();
    let admin_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a PostgreSQL server");

    let db_name = format!("telhawk_auth_test_{}", Uuid::new_v4().simple());
    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");
    sqlx::query(&format!(r#"CREATE DATABASE "{}""#, db_name))
        .execute(&admin_pool)
        .await
        .expect("create test database");

    let base = admin_url
        .rsplit_once('/')
        .map(|(base, _)| base)
        .expect("database url with a path");
    let test_url = format!("{}/{}", base, db_name);

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    let config = AuthConfig {
        common: CoreConfig {
            port: 0,
            log_level: "error".to_string(),
        },
        service_name: "telhawk-auth-test".to_string(),
        service_version: "0.0.0".to_string(),
        database: DatabaseConfig {
            url: test_url,
            max_connections: 5,
            min_connections: 1,
        },
        jwt: JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
        },
        audit: AuditConfig {
            secret: "test-audit-secret".to_string(),
        },
        forward: ForwardConfig {
            enabled: false,
            url: String::new(),
            token: String::new(),
        },
        security: SecurityConfig {
            bcrypt_cost: TEST_BCRYPT_COST,
        },
        server: ServerConfig {
            read_timeout_seconds: 5,
            write_timeout_seconds: 5,
            idle_timeout_seconds: 5,
        },
    };

    let database = Database::new(pool.clone());
    let tokens = TokenService::new(&config.jwt);
    let audit = AuditLogger::new(database.clone(), &config.audit.secret, None);
    let containment = Arc::new(ContainmentIndex::new(database.clone()));

    let state = AppState {
        auth: AuthService::new(
            database.clone(),
            tokens.clone(),
            audit.clone(),
            config.jwt.refresh_token_ttl_days,
        ),
        users: UserService::new(
            database.clone(),
            audit.clone(),
            Arc::clone(&containment),
            config.security.bcrypt_cost,
        ),
        hec: HecService::new(database.clone(), tokens, audit.clone()),
        db: database.clone(),
        audit,
        containment,
        config,
    };

    TestHarness {
        app: build_router(state),
        db: database,
        pool,
    }
}

fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let mut req = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let addr: SocketAddr = "203.0.113.9:55000".parse().expect("addr");
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

fn bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        "Authorization",
        format!("Bearer {}", token).parse().expect("header"),
    );
    req
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    }
}

async fn seed_user(
    db: &Database,
    username: &str,
    password: &str,
    organization_id: Option<Uuid>,
    client_id: Option<Uuid>,
) -> User {
    let hash = hash_password(&Password::new(password.to_string()), TEST_BCRYPT_COST)
        .expect("hash password");
    let user = User::new(
        username.to_string(),
        format!("{}@example.com", username),
        hash.into_string(),
        vec!["viewer".to_string()],
        organization_id,
        client_id,
        None,
    );
    db.create_user(&user).await.expect("seed user");
    user
}

async fn seed_organization(pool: &PgPool, slug: &str) -> Uuid {
    let id = new_id();
    sqlx::query(
        "INSERT INTO organizations (id, version_id, name, slug) VALUES ($1, $1, $2, $3)",
    )
    .bind(id)
    .bind(slug.to_uppercase())
    .bind(slug)
    .execute(pool)
    .await
    .expect("seed organization");
    id
}

async fn seed_client(pool: &PgPool, organization_id: Uuid, slug: &str) -> Uuid {
    let id = new_id();
    sqlx::query(
        "INSERT INTO clients (id, version_id, organization_id, name, slug) VALUES ($1, $1, $2, $3, $4)",
    )
    .bind(id)
    .bind(organization_id)
    .bind(slug.to_uppercase())
    .bind(slug)
    .execute(pool)
    .await
    .expect("seed client");
    id
}

/// Insert a role carrying the named permissions and grant it to the user.
async fn grant_role(
    pool: &PgPool,
    user_id: Uuid,
    slug: &str,
    ordinal: i16,
    permissions: &[(&str, &str)],
    organization_id: Option<Uuid>,
    client_id: Option<Uuid>,
) {
    let role_id = new_id();
    sqlx::query(
        "INSERT INTO roles (id, version_id, name, slug, ordinal) VALUES ($1, $1, $2, $3, $4)",
    )
    .bind(role_id)
    .bind(slug.to_uppercase())
    .bind(slug)
    .bind(ordinal)
    .execute(pool)
    .await
    .expect("seed role");

    for (resource, action) in permissions {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, id FROM permissions WHERE resource = $2 AND action = $3
            "#,
        )
        .bind(role_id)
        .bind(resource)
        .bind(action)
        .execute(pool)
        .await
        .expect("link permission");
    }

    sqlx::query(
        r#"
        INSERT INTO user_roles (id, user_id, role_id, organization_id, client_id)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(role_id)
    .bind(organization_id)
    .bind(client_id)
    .execute(pool)
    .await
    .expect("grant role");
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/login",
            Some(serde_json::json!({"username": username, "password": password})),
        ))
        .await
        .expect("login request");
    let status = response.status();
    (status, json_body(response).await)
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn happy_path_login() {
    let h = setup().await;
    seed_user(&h.db, "alice", "p@ssw0rd", None, None).await;

    let (status, body) = login(&h.app, "alice", "p@ssw0rd").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["access_token"].as_str().unwrap().is_empty());
    assert!(!body["refresh_token"].as_str().unwrap().is_empty());
    assert_eq!(body["expires_in"], 900);
    assert_eq!(body["token_type"], "Bearer");

    // A session row exists for the issued access token.
    let session = h
        .db
        .find_session_by_access_token(body["access_token"].as_str().unwrap())
        .await
        .expect("session row");
    assert!(session.is_active());

    // One audit row with action=login, result=success.
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_log WHERE action = 'login' AND result = 'success'",
    )
    .fetch_one(&h.pool)
    .await
    .expect("audit count");
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn login_failures_are_indistinguishable() {
    let h = setup().await;

    let mut disabled = seed_user(&h.db, "dora", "p@ssw0rd", None, None).await;
    disabled.disabled_at = Some(chrono::Utc::now());
    disabled.version_id = new_id();
    h.db.update_user(&disabled).await.expect("disable");

    let deleted = seed_user(&h.db, "dave", "p@ssw0rd", None, None).await;
    h.db.delete_user(deleted.id, deleted.id).await.expect("delete");

    seed_user(&h.db, "wanda", "p@ssw0rd", None, None).await;

    let attempts = [
        ("nobody", "p@ssw0rd"),
        ("dora", "p@ssw0rd"),
        ("dave", "p@ssw0rd"),
        ("wanda", "wrong-password"),
    ];

    let mut bodies = Vec::new();
    for (username, password) in attempts {
        let (status, body) = login(&h.app, username, password).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        bodies.push(body);
    }

    // Identical opaque bodies for all four failure modes.
    assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));

    // Distinct audit reasons, in order.
    let reasons: Vec<(String,)> = sqlx::query_as(
        "SELECT reason FROM audit_log WHERE action = 'login' AND result = 'failure' ORDER BY id",
    )
    .fetch_all(&h.pool)
    .await
    .expect("reasons");
    let reasons: Vec<&str> = reasons.iter().map(|(r,)| r.as_str()).collect();
    assert_eq!(
        reasons,
        vec![
            "user not found",
            "account disabled or deleted",
            "account disabled or deleted",
            "invalid password",
        ]
    );
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn revocation_invalidates_a_signed_token() {
    let h = setup().await;
    seed_user(&h.db, "alice", "p@ssw0rd", None, None).await;

    let (_, tokens) = login(&h.app, "alice", "p@ssw0rd").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();
    let refresh = tokens["refresh_token"].as_str().unwrap().to_string();

    let response = h
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/validate",
            Some(serde_json::json!({"token": access})),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["valid"], true);

    let response = h
        .app
        .clone()
        .oneshot(bearer(
            request(
                "POST",
                "/auth/revoke",
                Some(serde_json::json!({"token": refresh})),
            ),
            &access,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The JWT itself has not expired, yet validation now fails.
    let response = h
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/validate",
            Some(serde_json::json!({"token": access})),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["valid"], false);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn permission_changes_flag_stale_tokens() {
    let h = setup().await;
    seed_user(&h.db, "alice", "p@ssw0rd", None, None).await;

    let (_, tokens) = login(&h.app, "alice", "p@ssw0rd").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();

    // Permission-affecting change behind the token's back.
    let mut updated = h.db.find_user_by_username("alice").await.expect("reload");
    updated.permissions_version += 1;
    updated.version_id = new_id();
    h.db.update_user(&updated).await.expect("bump version");

    let response = h
        .app
        .clone()
        .oneshot(request(
            "POST",
            "/auth/validate",
            Some(serde_json::json!({"token": access})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["permissions_version"], 2);
    assert_eq!(body["token_permissions_version"], 1);
    assert_eq!(body["permissions_stale"], true);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn cross_organization_update_is_denied() {
    let h = setup().await;
    let org1 = seed_organization(&h.pool, "org1").await;
    let org2 = seed_organization(&h.pool, "org2").await;
    seed_client(&h.pool, org1, "c1").await;

    let bob = seed_user(&h.db, "bob", "p@ssw0rd", Some(org1), None).await;
    grant_role(
        &h.pool,
        bob.id,
        "org1-admin",
        20,
        &[("users", "update")],
        Some(org1),
        None,
    )
    .await;

    let carol = seed_user(&h.db, "carol", "p@ssw0rd", Some(org2), None).await;

    let (_, tokens) = login(&h.app, "bob", "p@ssw0rd").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();

    let response = h
        .app
        .clone()
        .oneshot(bearer(
            request(
                "PATCH",
                &format!("/users/update?id={}", carol.id),
                Some(serde_json::json!({"email": "carol@elsewhere.example.com"})),
            ),
            &access,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["errors"][0]["code"], "forbidden");
    assert_eq!(body["errors"][0]["permission"], "users:update");

    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM audit_log WHERE action = 'user_update' AND result = 'failure'",
    )
    .fetch_one(&h.pool)
    .await
    .expect("audit count");
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn machine_token_secret_appears_exactly_once() {
    let h = setup().await;
    let org = seed_organization(&h.pool, "org1").await;
    let client = seed_client(&h.pool, org, "c1").await;

    let admin = seed_user(&h.db, "admin", "p@ssw0rd", None, None).await;
    grant_role(
        &h.pool,
        admin.id,
        "token-admin",
        10,
        &[("tokens", "create"), ("tokens", "read")],
        None,
        None,
    )
    .await;

    let (_, tokens) = login(&h.app, "admin", "p@ssw0rd").await;
    let access = tokens["access_token"].as_str().unwrap().to_string();

    // A seeded 25-char secret masks to first8...last8.
    let seeded = HecToken::new(
        "abcdefgh123456789ijklmnop".to_string(),
        "seeded".to_string(),
        admin.id,
        client,
        admin.id,
        None,
    );
    h.db.create_hec_token(&seeded).await.expect("seed hec token");

    let response = h
        .app
        .clone()
        .oneshot(bearer(
            request(
                "POST",
                "/hec/tokens",
                Some(serde_json::json!({"name": "ingest", "client_id": client})),
            ),
            &access,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let full_secret = created["data"]["attributes"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(full_secret.len() > 16);

    let response = h
        .app
        .clone()
        .oneshot(bearer(request("GET", "/hec/tokens", None), &access))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;

    let tokens_in_list: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["attributes"]["token"].as_str().unwrap())
        .collect();

    assert!(tokens_in_list.contains(&"abcdefgh...ijklmnop"));
    // The freshly created secret never appears in full.
    assert!(!tokens_in_list.contains(&full_secret.as_str()));
    let masked = format!("{}...{}", &full_secret[..8], &full_secret[full_secret.len() - 8..]);
    assert!(tokens_in_list.contains(&masked.as_str()));
}
