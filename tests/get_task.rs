mod common;

use common::tripo_client;
use prompt2mesh::{TaskState, TaskStatus};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_get_task_success() {
    let server = MockServer::start().await;
    let task_id = "mock_task_id_123";

    Mock::given(method("GET"))
        .and(path(format!("/v2/openapi/task/{}", task_id)))
        .and(header("authorization", "Bearer test_api_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "task_id": "mock_task_id_123",
                "type": "image_to_model",
                "status": "success",
                "progress": 100,
                "create_time": 1752091365,
                "output": {
                    "generated_image": "https://example.com/image.webp"
                },
                "result": {
                    "pbr_model": {
                        "url": "https://example.com/model1.glb"
                    }
                }
            }
        })))
        .mount(&server)
        .await;

    let client = tripo_client(&server);
    let response: TaskStatus = client.get_task(task_id).await.unwrap();

    assert_eq!(response.task_id, "mock_task_id_123");
    assert_eq!(response.status, TaskState::Success);
    assert_eq!(
        response.created_at().unwrap().to_rfc3339(),
        "2025-07-09T20:02:45+00:00"
    );
    let mesh = response.result.mesh().unwrap();
    assert_eq!(mesh.url, "https://example.com/model1.glb");
}

#[tokio::test]
async fn test_get_task_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/openapi/task/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("task not found"))
        .mount(&server)
        .await;

    let client = tripo_client(&server);
    let err = client.get_task("missing").await.unwrap_err();
    assert!(err.to_string().contains("404"));
    assert!(err.to_string().contains("task not found"));
}
