//! Mock API responses for the drive, wiki and export endpoints

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Successful envelope around `data`
pub fn ok_envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "msg": "success", "data": data}))
}

/// Envelope carrying an application error on HTTP 200
pub fn api_error(code: i64, msg: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": code, "msg": msg}))
}

/// Drive listing item
pub fn drive_entry(token: &str, file_type: &str, name: &str) -> Value {
    json!({"token": token, "type": file_type, "name": name})
}

/// Library node
pub fn library_node(node_token: &str, obj_token: &str, obj_type: &str, title: &str, has_child: bool) -> Value {
    json!({
        "node_token": node_token,
        "obj_token": obj_token,
        "obj_type": obj_type,
        "title": title,
        "has_child": has_child,
    })
}

/// Serve a single-page listing of a drive folder (`None` = root)
pub async fn mount_drive_folder(server: &MockServer, folder_token: Option<&str>, files: Vec<Value>) {
    let mock = Mock::given(method("GET")).and(path("/drive/v1/files"));
    let mock = match folder_token {
        Some(token) => mock.and(query_param("folder_token", token)),
        None => mock.and(query_param_is_missing("folder_token")),
    };
    mock.respond_with(ok_envelope(json!({"files": files, "has_more": false})))
        .mount(server)
        .await;
}

/// Serve a single-page listing of library nodes (`None` = top level)
pub async fn mount_library_level(
    server: &MockServer,
    space_id: &str,
    parent: Option<&str>,
    items: Vec<Value>,
) {
    let mock = Mock::given(method("GET")).and(path(format!("/wiki/v2/spaces/{space_id}/nodes")));
    let mock = match parent {
        Some(token) => mock.and(query_param("parent_node_token", token)),
        None => mock.and(query_param_is_missing("parent_node_token")),
    };
    mock.respond_with(ok_envelope(json!({"items": items, "has_more": false})))
        .mount(server)
        .await;
}

/// Serve the submission of an export task for `token`
pub async fn mount_export_submit(server: &MockServer, token: &str, extension: &str, ticket: &str) {
    Mock::given(method("POST"))
        .and(path("/drive/v1/export_tasks"))
        .and(body_partial_json(json!({"token": token, "file_extension": extension})))
        .respond_with(ok_envelope(json!({"ticket": ticket})))
        .mount(server)
        .await;
}

/// Serve the status of an export task
pub async fn mount_export_status(server: &MockServer, ticket: &str, result: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v1/export_tasks/{ticket}")))
        .respond_with(ok_envelope(json!({"result": result})))
        .mount(server)
        .await;
}

/// Serve the bytes of an exported artifact
pub async fn mount_export_download(server: &MockServer, artifact_token: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v1/export_tasks/file/{artifact_token}/download")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Serve a full successful export of `token`: submit, one status query, download
pub async fn mount_successful_export(server: &MockServer, token: &str, extension: &str, body: &[u8]) {
    let ticket = format!("ticket-{token}");
    let artifact = format!("exp-{token}");
    mount_export_submit(server, token, extension, &ticket).await;
    mount_export_status(
        server,
        &ticket,
        json!({"job_status": 0, "file_token": artifact, "file_extension": extension}),
    )
    .await;
    mount_export_download(server, &artifact, body).await;
}

/// Serve the raw bytes of an uploaded file
pub async fn mount_raw_download(server: &MockServer, token: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/v1/files/{token}/download")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Serve one page of a drive folder listing, selected by its `page_token`
///
/// `page_token = None` matches the first request, which carries no cursor.
/// `listing` is the raw `data` object, so tests control `has_more` and the
/// cursor fields directly.
pub async fn mount_drive_page(
    server: &MockServer,
    folder_token: Option<&str>,
    page_token: Option<&str>,
    listing: Value,
) {
    let mock = Mock::given(method("GET")).and(path("/drive/v1/files"));
    let mock = match folder_token {
        Some(token) => mock.and(query_param("folder_token", token)),
        None => mock.and(query_param_is_missing("folder_token")),
    };
    let mock = match page_token {
        Some(cursor) => mock.and(query_param("page_token", cursor)),
        None => mock.and(query_param_is_missing("page_token")),
    };
    mock.respond_with(ok_envelope(listing)).mount(server).await;
}

/// Serve one page of a library level, selected by its `page_token`
pub async fn mount_library_page(
    server: &MockServer,
    space_id: &str,
    parent: Option<&str>,
    page_token: Option<&str>,
    listing: Value,
) {
    let mock = Mock::given(method("GET")).and(path(format!("/wiki/v2/spaces/{space_id}/nodes")));
    let mock = match parent {
        Some(token) => mock.and(query_param("parent_node_token", token)),
        None => mock.and(query_param_is_missing("parent_node_token")),
    };
    let mock = match page_token {
        Some(cursor) => mock.and(query_param("page_token", cursor)),
        None => mock.and(query_param_is_missing("page_token")),
    };
    mock.respond_with(ok_envelope(listing)).mount(server).await;
}
