mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use tower::ServiceExt;

use common::{roster, Console, FakeShell, HOST};
use hostroll::routes::build_router;

const BOUNDARY: &str = "hostroll-test-boundary";

async fn send(console: &Console, request: Request<Body>) -> Response {
    build_router(console.state.clone()).oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload(uri: &str, fields: &[(&str, &str)], file_name: &str, file: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::post(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn location(response: &Response) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn index_lists_hosts_and_accounts() {
    let console = Console::new(&["alice"], FakeShell::ok("")).await;
    let response = send(&console, Request::get("/?msg=Hello").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(HOST));
    assert!(html.contains("alice"));
    assert!(html.contains("Hello"));
    assert!(!html.contains("rootpw"), "admin secret must not be rendered");
}

#[tokio::test]
async fn add_ip_registers_and_redirects() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let response = send(&console, form("/add-ip", "ip=+10.0.0.9+&root_username=admin&root_password=p%40ss")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/?msg="));
    let host = console.state.registry.get("10.0.0.9").unwrap();
    assert_eq!(host.root_username, "admin");
    assert_eq!(host.root_password, "p@ss");
}

#[tokio::test]
async fn add_ip_without_address_is_a_bad_request() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let response = send(&console, form("/add-ip", "ip=&root_username=root")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn csv_upload_creates_accounts_and_renders_the_log() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let sheet = b"Username,Password\nalice,alice@123\n,x\nbob,bob@456\n";
    let response = send(&console, upload("/create-users", &[("ip", HOST)], "users.csv", sheet)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("User Creation Log"));
    assert!(html.contains("Skipped empty fields in row 3"));
    assert_eq!(roster(&console.state.registry), vec!["alice", "bob"]);

    let stored: Vec<_> = std::fs::read_dir(console.dir.path().join("uploads")).unwrap().collect();
    assert_eq!(stored.len(), 1, "upload is kept on disk");
}

#[tokio::test]
async fn upload_for_unknown_host_is_rejected() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let response = send(&console, upload("/create-users", &[("ip", "10.1.1.1")], "u.csv", b"u,p\na,b\n")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(console.shell.scripts().is_empty());
}

#[tokio::test]
async fn csv_delete_upload_removes_listed_accounts() {
    let console = Console::new(&["alice", "bob"], FakeShell::ok("")).await;
    let response = send(&console, upload("/delete-users", &[("ip", HOST)], "gone.csv", b"Username\nbob\n")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(roster(&console.state.registry), vec!["alice"]);
}

#[tokio::test]
async fn delete_selected_without_selection_redirects() {
    let console = Console::new(&["alice"], FakeShell::ok("")).await;
    let response = send(&console, form("/delete-selected", &format!("ip={HOST}"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?msg=No%20users%20selected");
    assert!(console.shell.scripts().is_empty());
}

#[tokio::test]
async fn delete_selected_removes_checked_accounts() {
    let console = Console::new(&["alice", "bob", "carol"], FakeShell::ok("")).await;
    let body = format!("ip={HOST}&selected_users=alice&selected_users=carol");
    let response = send(&console, form("/delete-selected", &body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Deleting 2 selected users"));
    assert_eq!(roster(&console.state.registry), vec!["bob"]);
}

#[tokio::test]
async fn delete_all_on_empty_roster_redirects() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let response = send(&console, form("/delete-all", &format!("ip={HOST}"))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/?msg=No%20users%20to%20delete");
}

#[tokio::test]
async fn add_ip_rejects_a_root_password_with_a_line_break() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let response = send(&console, form("/add-ip", "ip=10.0.0.9&root_username=root&root_password=a%0Ab")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!console.state.registry.contains("10.0.0.9"));
}

#[tokio::test]
async fn delete_user_on_unregistered_host_is_not_found() {
    let console = Console::new(&["alice"], FakeShell::ok("")).await;
    let response = send(&console, form("/delete-user", "server_ip=10.9.9.9&username=alice")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(console.shell.scripts().is_empty());
    assert_eq!(roster(&console.state.registry), vec!["alice"]);
}

#[tokio::test]
async fn delete_user_requires_username() {
    let console = Console::new(&["alice"], FakeShell::ok("")).await;
    let response = send(&console, form("/delete-user", &format!("server_ip={HOST}"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_save_turns_the_log_page_into_a_server_error() {
    let console = Console::with_broken_registry(&["alice"], FakeShell::ok("")).await;
    let response = send(&console, form("/delete-user", &format!("ip={HOST}&username=alice"))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("Failed to save host records"));
}

#[tokio::test]
async fn download_users_serves_csv_attachment() {
    let console = Console::new(&["alice"], FakeShell::ok("")).await;
    let response = send(&console, Request::get(format!("/download-users?ip={HOST}")).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=users_10_0_0_5_"));
    let text = body_text(response).await;
    assert!(text.starts_with("Username,Password,Server IP,Notes\n"));
    assert!(text.contains("alice,alice-pw,10.0.0.5,"));
}

#[tokio::test]
async fn download_users_requires_known_host() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let missing = send(&console, Request::get("/download-users").body(Body::empty()).unwrap()).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let unknown = send(&console, Request::get("/download-users?ip=1.2.3.4").body(Body::empty()).unwrap()).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn install_rejects_software_outside_the_catalog() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let body = format!("server_ip={HOST}&software_type=common&common_software=emacs");
    let response = send(&console, form("/install-software", &body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(console.shell.scripts().is_empty());
}

#[tokio::test]
async fn install_catalog_entry_runs_update_then_add() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    let body = format!("server_ip={HOST}&software_type=common&common_software=nodejs");
    let response = send(&console, form("/install-software", &body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let script = &console.shell.scripts()[0];
    assert!(script.contains(r"sudo -S apk update && printf '%s\n' 'rootpw' | sudo -S apk add nodejs npm"));
}

#[tokio::test]
async fn pages_and_stylesheet_render() {
    let console = Console::new(&[], FakeShell::ok("")).await;
    for uri in ["/upload-csv", "/upload-excel", "/delete-csv", "/delete-excel", "/software", "/static/styles.css"] {
        let response = send(&console, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
}
