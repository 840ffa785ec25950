use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chatlists::{
    AppState,
    auth::{AuthError, ClientProvider, Clients, Identity, Principal},
    models::{CHAT_LISTS, CHAT_MESSAGES},
    store::{DocumentStore, SqliteStore},
};
use tower::ServiceExt;
use tower_sessions::{MemoryStore, SessionManagerLayer};

/// Accounts keyed by email: `(password, uid)`.
#[derive(Default)]
struct FakeIdentity {
    accounts: Mutex<HashMap<String, (String, String)>>,
}

impl FakeIdentity {
    fn principal(email: &str, uid: &str) -> Principal {
        Principal {
            uid: uid.to_owned(),
            email: Some(email.to_owned()),
            display_name: None,
        }
    }
}

#[async_trait]
impl Identity for FakeIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(AuthError::EmailExists);
        }
        if password.len() < 6 {
            return Err(AuthError::WeakPassword);
        }
        let uid = format!("uid{}", accounts.len() + 1);
        accounts.insert(email.to_owned(), (password.to_owned(), uid.clone()));
        Ok(Self::principal(email, &uid))
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        match self.accounts.lock().unwrap().get(email) {
            Some((stored, uid)) if stored == password => Ok(Self::principal(email, uid)),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn authenticate_federated(&self, _: ClientProvider, _: &str) -> Result<Principal, AuthError> {
        Err(AuthError::Cancelled)
    }
}

/// Drives the router like a browser that keeps its session cookie.
struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    async fn send(&mut self, request: Request<Body>) -> Response {
        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        let mut request = Request::get(uri);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Response {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(form.to_owned())).unwrap()).await
    }

    async fn page(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        body(response).await
    }
}

async fn body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

async fn setup() -> (Browser, SqliteStore) {
    setup_with(Clients::default()).await
}

async fn setup_with(clients: Clients) -> (Browser, SqliteStore) {
    let store = SqliteStore::in_memory().await.unwrap();
    let state = AppState {
        store: Arc::new(store.clone()),
        identity: Arc::new(FakeIdentity::default()),
        clients,
    };
    let app = chatlists::router(state).layer(SessionManagerLayer::new(MemoryStore::default()));
    (Browser { app, cookie: None }, store)
}

async fn signed_up(email: &str) -> (Browser, SqliteStore) {
    let (mut browser, store) = setup().await;
    let response = browser.post("/signup", &format!("email={email}&password=hunter22")).await;
    assert_eq!(location(&response), "/dashboard");
    (browser, store)
}

#[tokio::test]
async fn signed_out_visitors_are_sent_to_the_gate() {
    let (mut browser, _) = setup().await;

    let response = browser.get("/").await;
    assert_eq!(location(&response), "/login");

    let response = browser.get("/dashboard").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");

    let page = browser.page("/login").await;
    assert!(page.contains(r#"action="/login""#));
    assert!(!page.contains("/login/google"));
}

#[tokio::test]
async fn failed_sign_in_shows_status_once() {
    let (mut browser, _) = setup().await;

    let response = browser.post("/login", "email=nobody%40example.com&password=wrong").await;
    assert_eq!(location(&response), "/login");

    let page = browser.page("/login").await;
    assert!(page.contains("Error logging in: incorrect email or password."));

    let page = browser.page("/login").await;
    assert!(!page.contains("Error logging in"));
}

#[tokio::test]
async fn failed_sign_up_stays_in_sign_up_mode() {
    let (mut browser, _) = setup().await;

    let response = browser.post("/signup", "email=me%40example.com&password=123").await;
    assert_eq!(location(&response), "/login?mode=signup");

    let page = browser.page("/login?mode=signup").await;
    assert!(page.contains("Error creating user: password is too weak."));
    assert!(page.contains(r#"action="/signup""#));
}

#[tokio::test]
async fn sign_up_then_sign_in_reaches_the_dashboard() {
    let (mut browser, _) = signed_up("me%40example.com").await;

    let page = browser.page("/dashboard").await;
    assert!(page.contains("me@example.com"));
    assert_eq!(location(&browser.get("/login").await), "/dashboard");

    let response = browser.get("/logout").await;
    assert_eq!(location(&response), "/");
    assert_eq!(location(&browser.get("/dashboard").await), "/");

    let response = browser.post("/login", "email=me%40example.com&password=hunter22").await;
    assert_eq!(location(&response), "/dashboard");
    browser.page("/dashboard").await;
}

#[tokio::test]
async fn lists_and_messages_round_trip_through_the_pages() {
    let (mut browser, store) = signed_up("me%40example.com").await;

    browser.post("/lists", "name=Groceries").await;
    let page = browser.page("/dashboard").await;
    assert!(page.contains("Groceries"));

    let lists = store.fetch_all(CHAT_LISTS).await.unwrap();
    assert_eq!(lists.len(), 1);
    let list = lists[0].reference.id.clone();

    browser.post(&format!("/lists/{list}/select"), "").await;
    browser.post("/messages", "content=milk").await;
    let page = browser.page("/dashboard").await;
    assert!(page.contains("milk"));

    let messages = store.fetch_all(CHAT_MESSAGES).await.unwrap();
    assert_eq!(messages.len(), 1);
    let message = messages[0].reference.id.clone();

    browser.post(&format!("/messages/{message}/edit"), "").await;
    browser.post("/edit/save", "draft=oat+milk").await;
    assert!(browser.page("/dashboard").await.contains("oat milk"));

    let confirm = browser.page(&format!("/messages/{message}/delete")).await;
    assert!(confirm.contains(r#"value="yes""#));
    browser.post(&format!("/messages/{message}/delete"), "confirm=yes").await;
    assert!(store.fetch_all(CHAT_MESSAGES).await.unwrap().is_empty());
}

#[tokio::test]
async fn destructive_posts_need_confirmation() {
    let (mut browser, store) = signed_up("me%40example.com").await;
    browser.post("/lists", "name=Precious").await;
    let list = store.fetch_all(CHAT_LISTS).await.unwrap()[0].reference.id.clone();

    browser.post(&format!("/lists/{list}/delete"), "").await;
    assert_eq!(store.fetch_all(CHAT_LISTS).await.unwrap().len(), 1);

    browser.post(&format!("/lists/{list}/delete"), "confirm=yes").await;
    assert!(store.fetch_all(CHAT_LISTS).await.unwrap().is_empty());
    assert!(!browser.page("/dashboard").await.contains("Precious"));
}

#[tokio::test]
async fn refresh_picks_up_changes_from_elsewhere() {
    let (mut browser, store) = signed_up("me%40example.com").await;
    browser.post("/lists", "name=Before").await;
    let list = store.fetch_all(CHAT_LISTS).await.unwrap()[0].reference.clone();

    store
        .update(&list, chatlists::store::fields(serde_json::json!({ "name": "After" })))
        .await
        .unwrap();
    assert!(browser.page("/dashboard").await.contains("Before"));

    browser.post("/dashboard/refresh", "").await;
    let page = browser.page("/dashboard").await;
    assert!(page.contains("After"));
    assert!(!page.contains("Before"));
}

#[tokio::test]
async fn cancelled_federated_sign_in_returns_to_the_gate() {
    let (mut browser, _) = setup().await;

    let response = browser.get("/lockin/google?error=access_denied").await;
    assert_eq!(location(&response), "/login");

    let page = browser.page("/login").await;
    assert!(page.contains("Error logging in: sign-in was cancelled."));
}

#[tokio::test]
async fn callback_without_a_pending_sign_in_returns_to_the_gate() {
    let (mut browser, _) = setup().await;

    let response = browser.get("/lockin/google?state=x&code=y").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let page = browser.page("/login").await;
    assert!(page.contains("Error logging in: the sign-in request expired or was already used."));
}

#[tokio::test]
async fn callback_with_the_wrong_state_returns_to_the_gate() {
    let clients = Clients::from_json(
        &serde_json::json!({ "google": { "client_id": "id", "client_secret": "secret" } }),
        "http://localhost:8080",
    )
    .unwrap();
    let (mut browser, _) = setup_with(clients).await;

    let response = browser.get("/login/google").await;
    assert!(location(&response).starts_with("https://accounts.google.com/"));

    let response = browser.get("/lockin/google?state=forged&code=y").await;
    assert_eq!(location(&response), "/login");
    let page = browser.page("/login").await;
    assert!(page.contains("the sign-in request expired or was already used"));

    // the pending state was used up by the failed attempt
    let response = browser.get("/lockin/google?state=forged&code=y").await;
    assert_eq!(location(&response), "/login");
}
