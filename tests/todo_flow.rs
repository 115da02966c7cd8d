//! End-to-end flows: HTTP request → router → task queue → worker → store.

use std::num::NonZeroUsize;
use std::sync::Arc;

use todoq::app::{AppState, router};
use todoq::background::{TaskQueue, Worker};
use todoq::config::DispatchMode;
use todoq::http::{Request, Response, StatusCode};
use todoq::router::Router;
use todoq::store::{ItemId, NewItem, SharedStore, SqliteItemStore};

struct Harness {
    router: Router<AppState>,
    worker: Worker,
    store: SharedStore,
}

fn harness(dispatch: DispatchMode, capacity: usize) -> Harness {
    let store: SharedStore = Arc::new(SqliteItemStore::open_in_memory().unwrap());
    let (queue, receiver) = TaskQueue::new(capacity);
    let worker = Worker::new(receiver, Arc::clone(&store), NonZeroUsize::MIN);
    let state = AppState::new(Arc::clone(&store), queue, dispatch).unwrap();
    Harness {
        router: router(Arc::new(state)).unwrap(),
        worker,
        store,
    }
}

fn request(method: &str, path: &str, body: &str) -> Request {
    let raw = format!(
        "{method} {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\r\n{body}",
        body.len()
    );
    Request::parse(raw.as_bytes()).unwrap().0
}

async fn send(router: &Router<AppState>, method: &str, path: &str, body: &str) -> Response {
    router.route(request(method, path, body)).await
}

fn assert_redirects_to_list(response: &Response) {
    assert_eq!(response.status(), StatusCode::Found);
    assert_eq!(response.headers().get("location"), Some("/"));
}

fn seed(store: &SharedStore, count: usize) {
    for n in 1..=count {
        store
            .create(&NewItem {
                title: format!("item {n}"),
                description: None,
            })
            .unwrap();
    }
}

#[tokio::test]
async fn create_is_visible_after_the_task_runs() {
    let mut h = harness(DispatchMode::Deferred, 8);

    let response = send(&h.router, "POST", "/create/", "title=Buy+milk&description=").await;
    assert_redirects_to_list(&response);
    assert!(h.store.list().unwrap().is_empty());

    let report = h.worker.run_once().await.unwrap();
    assert!(report.succeeded);
    assert_eq!(report.detail, "Todo created: Buy milk");

    let items = h.store.list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Buy milk");
    assert_eq!(items[0].description.as_deref(), Some(""));
    assert!(!items[0].completed);

    let page = send(&h.router, "GET", "/", "").await;
    assert_eq!(page.status(), StatusCode::Ok);
    assert!(page.text().contains("Buy milk"));
}

#[tokio::test]
async fn update_with_checkbox_marks_item_completed() {
    let mut h = harness(DispatchMode::Deferred, 8);
    seed(&h.store, 5);
    let before = h.store.get(ItemId::new(5)).unwrap();

    let response = send(
        &h.router,
        "POST",
        "/update/5/",
        "title=Buy+oat+milk&description=2+litres&completed=on",
    )
    .await;
    assert_redirects_to_list(&response);
    assert!(h.worker.run_once().await.unwrap().succeeded);

    let after = h.store.get(ItemId::new(5)).unwrap();
    assert_eq!(after.title, "Buy oat milk");
    assert_eq!(after.description.as_deref(), Some("2 litres"));
    assert!(after.completed);
    assert_eq!(after.created, before.created);

    let form = send(&h.router, "GET", "/update/5/", "").await;
    assert_eq!(form.status(), StatusCode::Ok);
    assert!(form.text().contains(" checked>"));
}

#[tokio::test]
async fn unticked_checkbox_clears_completion() {
    let mut h = harness(DispatchMode::Deferred, 8);
    seed(&h.store, 1);

    send(&h.router, "POST", "/update/1/", "title=a&completed=on").await;
    h.worker.run_once().await.unwrap();
    send(&h.router, "POST", "/update/1/", "title=a").await;
    h.worker.run_once().await.unwrap();

    assert!(!h.store.get(ItemId::new(1)).unwrap().completed);
}

#[tokio::test]
async fn delete_removes_the_item() {
    let mut h = harness(DispatchMode::Deferred, 8);
    seed(&h.store, 5);

    let response = send(&h.router, "POST", "/delete/5/", "").await;
    assert_redirects_to_list(&response);
    assert!(h.worker.run_once().await.unwrap().succeeded);

    assert!(h.store.get(ItemId::new(5)).unwrap_err().is_not_found());
    assert_eq!(h.store.list().unwrap().len(), 4);
}

#[tokio::test]
async fn delete_accepts_any_method() {
    let mut h = harness(DispatchMode::Deferred, 8);
    seed(&h.store, 1);

    let response = send(&h.router, "GET", "/delete/1/", "").await;
    assert_redirects_to_list(&response);
    h.worker.run_once().await.unwrap();
    assert!(h.store.list().unwrap().is_empty());
}

#[tokio::test]
async fn deferred_delete_of_missing_item_still_redirects() {
    let mut h = harness(DispatchMode::Deferred, 8);

    let response = send(&h.router, "POST", "/delete/42/", "").await;
    assert_redirects_to_list(&response);

    let report = h.worker.run_once().await.unwrap();
    assert!(!report.succeeded);
    assert_eq!(report.name, "delete_item");
}

#[tokio::test]
async fn missing_item_pages_are_server_errors() {
    let h = harness(DispatchMode::Deferred, 8);

    let form = send(&h.router, "GET", "/update/99/", "").await;
    assert_eq!(form.status(), StatusCode::InternalServerError);
    assert!(form.text().contains("Server Error (500)"));

    let submit = send(&h.router, "POST", "/update/99/", "title=x").await;
    assert_eq!(submit.status(), StatusCode::InternalServerError);
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let h = harness(DispatchMode::Deferred, 8);

    for (method, path) in [("GET", "/update/abc/"), ("POST", "/delete/abc/")] {
        let response = send(&h.router, method, path, "").await;
        assert_eq!(response.status(), StatusCode::NotFound, "{method} {path}");
    }
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let h = harness(DispatchMode::Deferred, 8);
    let response = send(&h.router, "GET", "/nowhere/", "").await;
    assert_eq!(response.status(), StatusCode::NotFound);
}

#[tokio::test]
async fn create_page_renders_a_form() {
    let h = harness(DispatchMode::Deferred, 8);
    let response = send(&h.router, "GET", "/create/", "").await;
    assert_eq!(response.status(), StatusCode::Ok);
    assert!(response.text().contains(r#"action="/create/""#));
}

#[tokio::test]
async fn full_queue_is_service_unavailable() {
    let h = harness(DispatchMode::Deferred, 1);

    let first = send(&h.router, "POST", "/create/", "title=one").await;
    assert_redirects_to_list(&first);

    let second = send(&h.router, "POST", "/create/", "title=two").await;
    assert_eq!(second.status(), StatusCode::ServiceUnavailable);
}

#[tokio::test]
async fn blocking_dispatch_redirects_after_the_change_lands() {
    let h = harness(DispatchMode::Blocking, 8);
    let worker = tokio::spawn(h.worker.run());

    let response = send(&h.router, "POST", "/create/", "title=Buy+milk").await;
    assert_redirects_to_list(&response);
    let items = h.store.list().unwrap();
    assert_eq!(items.len(), 1);

    let path = format!("/update/{}/", items[0].id);
    send(&h.router, "POST", &path, "title=Buy+milk&completed=on").await;
    assert!(h.store.get(items[0].id).unwrap().completed);

    let missing = send(&h.router, "POST", "/delete/99/", "").await;
    assert_eq!(missing.status(), StatusCode::InternalServerError);
    assert!(missing.text().contains("Server Error (500)"));

    drop(h.router);
    worker.await.unwrap();
}
