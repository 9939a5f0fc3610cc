use crate::api::error::RequestError;
use crate::api::types::Entity;
use crate::config::ApiConfig;
use crate::store::Backend;
use async_trait::async_trait;
use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Issue tracker REST client
#[derive(Clone)]
pub struct RestClient {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
  cache_buster: Arc<CacheBuster>,
}

impl RestClient {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    // Relative joins only append to a base that ends in '/'
    let mut root = config.url.trim().to_string();
    if !root.ends_with('/') {
      root.push('/');
    }
    let base = Url::parse(&root).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base,
      token,
      cache_buster: Arc::new(CacheBuster::default()),
    })
  }

  /// API root all paths are resolved against
  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// Backend for one entity type with its named subsets (name -> path)
  pub fn collection<E: Entity>(&self, subsets: BTreeMap<String, String>) -> Collection<E> {
    Collection {
      client: self.clone(),
      subsets,
      _entity: PhantomData,
    }
  }

  fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, RequestError> {
    let mut url = self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| RequestError::InvalidUrl(format!("{}: {}", path, e)))?;
    if !query.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (key, value) in query {
        pairs.append_pair(key, value);
      }
    }
    Ok(url)
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    debug!(%method, %url, "http request");
    let builder = self.http.request(method, url);
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  async fn send(&self, builder: RequestBuilder) -> Result<Response, RequestError> {
    let response = builder.send().await.map_err(|e| {
      warn!(error = %e, "http transport failure");
      RequestError::from(e)
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let error = RequestError::from_status(status.as_u16(), &body);
    warn!(status = status.as_u16(), %error, "http request failed");
    Err(error)
  }

  pub async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T, RequestError> {
    let url = self.url(path, query)?;
    let response = self.send(self.request(Method::GET, url)).await?;
    Ok(response.json().await?)
  }

  pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: &B,
  ) -> Result<T, RequestError> {
    let url = self.url(path, &[])?;
    let response = self.send(self.request(method, url).json(body)).await?;
    Ok(response.json().await?)
  }

  pub async fn delete(&self, path: &str) -> Result<(), RequestError> {
    let url = self.url(path, &[])?;
    self.send(self.request(Method::DELETE, url)).await?;
    Ok(())
  }
}

/// Source of `cacheBuster` values: epoch milliseconds, strictly increasing
#[derive(Debug, Default)]
pub struct CacheBuster {
  last: AtomicU64,
}

impl CacheBuster {
  pub fn next(&self) -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let bump = |prev: u64| now.max(prev + 1);
    match self
      .last
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(bump(prev)))
    {
      Ok(prev) | Err(prev) => bump(prev),
    }
  }
}

/// Drop top-level relationship placeholders (an object whose `id` is `""`
/// or `-1`) before a record is written.
pub fn clean_entity<E: Serialize>(entity: &E) -> Result<Value, RequestError> {
  let mut value = serde_json::to_value(entity).map_err(|e| RequestError::Encode(e.to_string()))?;
  if let Some(object) = value.as_object_mut() {
    object.retain(|_, v| !is_placeholder_ref(v));
  }
  Ok(value)
}

fn is_placeholder_ref(value: &Value) -> bool {
  match value.as_object().and_then(|o| o.get("id")) {
    Some(id) => id.as_str() == Some("") || id.as_i64() == Some(-1),
    None => false,
  }
}

/// REST backend for one entity collection
pub struct Collection<E> {
  client: RestClient,
  subsets: BTreeMap<String, String>,
  _entity: PhantomData<fn() -> E>,
}

#[async_trait]
impl<E: Entity> Backend<E> for Collection<E> {
  async fn list(&self) -> Result<Vec<E>, RequestError> {
    let buster = self.client.cache_buster.next();
    self
      .client
      .get_json(E::COLLECTION, &[("cacheBuster", buster.to_string())])
      .await
  }

  async fn list_subset(&self, name: &str) -> Result<Vec<E>, RequestError> {
    let path = self
      .subsets
      .get(name)
      .ok_or_else(|| RequestError::UnknownSubset(name.to_string()))?;
    self.client.get_json(path, &[]).await
  }

  async fn get(&self, id: i64) -> Result<E, RequestError> {
    self
      .client
      .get_json(&format!("{}/{}", E::COLLECTION, id), &[])
      .await
  }

  async fn create(&self, entity: &E) -> Result<E, RequestError> {
    let body = clean_entity(entity)?;
    self
      .client
      .send_json(Method::POST, E::COLLECTION, &body)
      .await
  }

  async fn update(&self, entity: &E) -> Result<E, RequestError> {
    let body = clean_entity(entity)?;
    self
      .client
      .send_json(Method::PUT, E::COLLECTION, &body)
      .await
  }

  async fn delete(&self, id: i64) -> Result<(), RequestError> {
    self
      .client
      .delete(&format!("{}/{}", E::COLLECTION, id))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Comment, Issue, Priority, UserRef};
  use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
  };
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::Mutex;
  use tokio::net::TcpListener;

  #[derive(Default)]
  struct Recorded {
    list_queries: Vec<HashMap<String, String>>,
    open_queries: Vec<HashMap<String, String>>,
    bodies: Vec<Value>,
    deleted: Vec<i64>,
  }

  #[derive(Clone, Default)]
  struct Recorder(Arc<Mutex<Recorded>>);

  impl Recorder {
    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
      f(&mut self.0.lock().unwrap())
    }
  }

  async fn list_issues(
    State(rec): State<Recorder>,
    Query(params): Query<HashMap<String, String>>,
  ) -> Json<Value> {
    rec.with(|r| r.list_queries.push(params));
    Json(json!([
      {"id": 1, "number": 7, "priority": "HIGH", "resolution": "NEW"},
      {"id": 2, "number": 8, "resolution": "REVIEWED"}
    ]))
  }

  async fn open_issues(
    State(rec): State<Recorder>,
    Query(params): Query<HashMap<String, String>>,
  ) -> Json<Value> {
    rec.with(|r| r.open_queries.push(params));
    Json(json!([{"id": 1, "number": 7, "resolution": "NEW"}]))
  }

  async fn get_issue(Path(id): Path<i64>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if id == 1 {
      Ok(Json(json!({"id": 1, "number": 7, "description": "Printer on fire"})))
    } else {
      Err((
        StatusCode::NOT_FOUND,
        Json(json!({"title": "Not Found", "status": 404})),
      ))
    }
  }

  async fn create_issue(
    State(rec): State<Recorder>,
    Json(body): Json<Value>,
  ) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    rec.with(|r| r.bodies.push(body.clone()));
    if body.get("id").is_some() {
      return Err((
        StatusCode::BAD_REQUEST,
        Json(json!({
          "title": "Bad Request",
          "detail": "A new issue cannot already have an ID",
          "status": 400
        })),
      ));
    }
    let mut saved = body;
    saved["id"] = json!(41);
    Ok((StatusCode::CREATED, Json(saved)))
  }

  async fn update_issue(State(rec): State<Recorder>, Json(body): Json<Value>) -> Json<Value> {
    rec.with(|r| r.bodies.push(body.clone()));
    Json(body)
  }

  async fn delete_issue(State(rec): State<Recorder>, Path(id): Path<i64>) -> StatusCode {
    rec.with(|r| r.deleted.push(id));
    StatusCode::NO_CONTENT
  }

  async fn list_comments(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
      Some("Bearer secret") => Ok(Json(json!([{"id": 5, "description": "hi"}]))),
      _ => Err(StatusCode::UNAUTHORIZED),
    }
  }

  async fn not_json() -> &'static str {
    "<html>maintenance</html>"
  }

  async fn spawn_server() -> (String, Recorder) {
    let recorder = Recorder::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new()
      .route(
        "/api/issues",
        get(list_issues).post(create_issue).put(update_issue),
      )
      .route("/api/issues/:id", get(get_issue).delete(delete_issue))
      .route("/api/openissues", get(open_issues))
      .route("/api/reviewedissues", get(not_json))
      .route("/api/comments", get(list_comments))
      .with_state(recorder.clone());

    tokio::spawn(async move {
      let _ = axum::serve(listener, app).await;
    });

    // No trailing slash on purpose
    (format!("http://{}/api", addr), recorder)
  }

  fn client(url: &str, token: Option<&str>) -> RestClient {
    let config = ApiConfig {
      url: url.to_string(),
      timeout_secs: 5,
    };
    RestClient::new(&config, token.map(str::to_string)).unwrap()
  }

  fn issue_subsets() -> BTreeMap<String, String> {
    BTreeMap::from([
      ("open".to_string(), "openissues".to_string()),
      ("reviewed".to_string(), "reviewedissues".to_string()),
    ])
  }

  #[test]
  fn test_base_url_gets_trailing_slash() {
    let client = client("http://localhost:8080/api", None);
    assert_eq!(client.base_url().as_str(), "http://localhost:8080/api/");
  }

  #[test]
  fn test_invalid_base_url() {
    let config = ApiConfig {
      url: "not a url".into(),
      timeout_secs: 5,
    };
    assert!(RestClient::new(&config, None).is_err());
  }

  #[test]
  fn test_cache_buster_strictly_increases() {
    let buster = CacheBuster::default();
    let mut last = buster.next();
    for _ in 0..1000 {
      let next = buster.next();
      assert!(next > last);
      last = next;
    }
  }

  #[test]
  fn test_clean_entity_drops_placeholders() {
    let mut issue = Issue {
      number: Some(7),
      user: Some(UserRef {
        id: Some(-1),
        login: None,
      }),
      ..Default::default()
    };
    issue.extra.insert("reviewer".into(), json!({"id": ""}));
    issue.extra.insert("owner".into(), json!({"id": 3}));

    let cleaned = clean_entity(&issue).unwrap();
    assert_eq!(cleaned, json!({"number": 7, "owner": {"id": 3}}));
  }

  #[tokio::test]
  async fn test_list_sends_cache_buster() {
    let (url, rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let first = issues.list().await.unwrap();
    issues.list().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].priority, Some(Priority::High));

    let busters: Vec<u64> = rec.with(|r| {
      r.list_queries
        .iter()
        .map(|q| q["cacheBuster"].parse().unwrap())
        .collect()
    });
    assert_eq!(busters.len(), 2);
    assert!(busters[1] > busters[0]);
  }

  #[tokio::test]
  async fn test_subset_has_no_cache_buster() {
    let (url, rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let open = issues.list_subset("open").await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(rec.with(|r| r.open_queries[0].is_empty()));
  }

  #[tokio::test]
  async fn test_unknown_subset() {
    let (url, _rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    assert_eq!(
      issues.list_subset("archived").await.unwrap_err(),
      RequestError::UnknownSubset("archived".into())
    );
  }

  #[tokio::test]
  async fn test_undecodable_body() {
    let (url, _rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let err = issues.list_subset("reviewed").await.unwrap_err();
    assert!(matches!(err, RequestError::Decode(_)));
  }

  #[tokio::test]
  async fn test_get_one_and_not_found() {
    let (url, _rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let found = issues.get(1).await.unwrap();
    assert_eq!(found.description.as_deref(), Some("Printer on fire"));

    assert_eq!(
      issues.get(2).await.unwrap_err(),
      RequestError::Status {
        status: 404,
        message: "Not Found".into()
      }
    );
  }

  #[tokio::test]
  async fn test_create_posts_cleaned_entity() {
    let (url, rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let mut draft = Issue {
      number: Some(7),
      priority: Some(Priority::High),
      ..Default::default()
    };
    draft.extra.insert("user".into(), json!({"id": ""}));

    let saved = issues.create(&draft).await.unwrap();
    assert_eq!(saved.id, Some(41));
    assert_eq!(saved.number, Some(7));
    assert_eq!(
      rec.with(|r| r.bodies[0].clone()),
      json!({"number": 7, "priority": "HIGH"})
    );
  }

  #[tokio::test]
  async fn test_create_with_id_is_rejected() {
    let (url, _rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let err = issues
      .create(&Issue {
        id: Some(3),
        ..Default::default()
      })
      .await
      .unwrap_err();
    assert_eq!(
      err,
      RequestError::Status {
        status: 400,
        message: "A new issue cannot already have an ID".into()
      }
    );
  }

  #[tokio::test]
  async fn test_update_puts_to_collection() {
    let (url, rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    let issue = Issue {
      id: Some(1),
      number: Some(9),
      ..Default::default()
    };
    let saved = issues.update(&issue).await.unwrap();
    assert_eq!(saved, issue);
    assert_eq!(rec.with(|r| r.bodies.len()), 1);
  }

  #[tokio::test]
  async fn test_delete_by_id() {
    let (url, rec) = spawn_server().await;
    let issues: Collection<Issue> = client(&url, None).collection(issue_subsets());

    issues.delete(4).await.unwrap();
    assert_eq!(rec.with(|r| r.deleted.clone()), vec![4]);
  }

  #[tokio::test]
  async fn test_bearer_token() {
    let (url, _rec) = spawn_server().await;

    let anonymous: Collection<Comment> = client(&url, None).collection(BTreeMap::new());
    assert!(matches!(
      anonymous.list().await.unwrap_err(),
      RequestError::Status { status: 401, .. }
    ));

    let authed: Collection<Comment> = client(&url, Some("secret")).collection(BTreeMap::new());
    let comments = authed.list().await.unwrap();
    assert_eq!(comments[0].description.as_deref(), Some("hi"));
  }

  #[tokio::test]
  async fn test_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let issues: Collection<Issue> =
      client(&format!("http://{}/api/", addr), None).collection(issue_subsets());
    assert!(matches!(
      issues.list().await.unwrap_err(),
      RequestError::Transport(_)
    ));
  }
}
