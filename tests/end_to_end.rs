use code_query::config::Config;
use code_query::embeddings::OpenAiEmbeddingProvider;
use code_query::http::{HttpClient, RetryPolicy};
use code_query::llm::OpenAiChatModel;
use code_query::{CodeQueryError, Pipeline, QueryLoop};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// One constant embedding per input, so the response always matches the batch
struct EmbeddingResponder;

impl Respond for EmbeddingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = request.body_json().unwrap();
        let count = body["input"].as_array().map(Vec::len).unwrap_or(0);
        let data: Vec<Value> = (0..count)
            .map(|i| json!({ "embedding": [1.0, i as f32, 0.5], "index": i }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [ { "message": { "role": "assistant", "content": content } } ]
    }))
}

fn client(server: &MockServer) -> HttpClient {
    HttpClient::new(
        "OpenAI",
        "sk-test",
        &server.uri(),
        Duration::from_secs(5),
        RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(5)),
    )
    .unwrap()
}

fn write_repository(repo: &std::path::Path) {
    fs::write(repo.join("tsconfig.json"), r#"{ "compilerOptions": { "strict": true } }"#).unwrap();
    fs::create_dir_all(repo.join("src")).unwrap();
    fs::write(
        repo.join("src/index.ts"),
        "import { add } from './math';\nexport const three = add(1, 2);\n",
    )
    .unwrap();
    fs::write(
        repo.join("src/math.ts"),
        "export function add(a: number, b: number): number {\n  return a + b;\n}\n",
    )
    .unwrap();
}

async fn requests_to(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == endpoint)
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn test_index_then_answer_against_mock_openai() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EmbeddingResponder)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_reply("add sums two numbers"))
        .mount(&server)
        .await;

    let work = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_repository(repo.path());

    let mut config = Config::default();
    config.paths = config.paths.rooted_at(work.path());
    let paths = config.paths.clone();

    let http = client(&server);
    let chat = Arc::new(OpenAiChatModel::new(http.clone(), "gpt-3.5-turbo"));
    let summaries = Arc::new(OpenAiChatModel::new(http.clone(), "gpt-3.5-turbo").with_temperature(Some(0.0)));
    let embeddings = Arc::new(OpenAiEmbeddingProvider::new(http, "text-embedding-ada-002"));

    let store = Pipeline::new(config, summaries, embeddings)
        .load_or_build_index(repo.path())
        .await
        .unwrap();
    assert_eq!(store.len(), 4);
    assert!(paths.documents_file().is_file());
    assert!(paths.vector_store_dir.join("args.json").is_file());
    assert!(paths.vector_store_dir.join("index.json").is_file());
    assert!(!paths.error_file.exists());

    let summary_requests = requests_to(&server, "/chat/completions").await;
    assert_eq!(summary_requests.len(), 2);
    assert!(summary_requests.iter().all(|r| r["temperature"] == json!(0.0)));

    let query_loop = QueryLoop::new(Arc::new(store), chat);
    let mut output = Vec::new();
    query_loop
        .run(&b"what does add do?\nexit\n"[..], &mut output)
        .await
        .unwrap();
    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("\nAI: add sums two numbers\n"));
    assert!(output.ends_with("Bye\n"));

    let chat_requests = requests_to(&server, "/chat/completions").await;
    assert_eq!(chat_requests.len(), 3);
    let question = &chat_requests[2];
    assert!(question.get("temperature").is_none());
    assert_eq!(question["messages"][0]["role"], "system");
    assert_eq!(question["messages"][1]["content"], "what does add do?");
    let system = question["messages"][0]["content"].as_str().unwrap();
    assert_eq!(system.matches("\"sourcePath\"").count(), 3);

    // four documents in one batch, then one query embedding
    let embedding_requests = requests_to(&server, "/embeddings").await;
    assert_eq!(embedding_requests.len(), 2);
    assert_eq!(embedding_requests[0]["input"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_embedding_outage_writes_error_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let work = TempDir::new().unwrap();
    let repo = TempDir::new().unwrap();
    write_repository(repo.path());

    let mut config = Config::default();
    config.paths = config.paths.rooted_at(work.path());
    let paths = config.paths.clone();

    let http = client(&server);
    let summaries = Arc::new(OpenAiChatModel::new(http.clone(), "gpt-3.5-turbo"));
    let embeddings = Arc::new(OpenAiEmbeddingProvider::new(http, "text-embedding-ada-002"));

    let result = Pipeline::new(config, summaries, embeddings)
        .with_summaries(false)
        .load_or_build_index(repo.path())
        .await;
    let err = match result {
        Ok(_) => panic!("index build should fail"),
        Err(err) => err,
    };

    assert!(matches!(
        err.downcast_ref::<CodeQueryError>(),
        Some(CodeQueryError::EmbeddingBuildFailure { batches_done: 0, .. })
    ));
    assert!(paths.error_file.is_file());
    assert!(!paths.vector_store_dir.exists());
    // two attempts per the retry policy
    assert_eq!(requests_to(&server, "/embeddings").await.len(), 2);
}
