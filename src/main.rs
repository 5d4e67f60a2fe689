mod danmaku;
mod http_client;
mod parser;
mod patterns;
mod scheme;
mod types;

use axum::{
    extract::{Path, Query},
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::types::SchemeTarget;

#[tokio::main]
async fn main() {
    // 初始化日志
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // CORS 配置
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // 路由
    let app = Router::new()
        // 核心路由
        .route("/", get(index_handler))
        .route("/scheme", post(scheme_handler))
        .route("/api", get(api_info_handler))
        .route("/health", get(health_handler))
        // 弹幕服务端代理
        .route("/danmu/search", get(danmu_search_handler))
        .route("/danmu/comment/{id}", get(danmu_comment_handler))
        .route("/danmu/download", post(danmu_download_handler))
        .layer(cors);

    // 启动服务器
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("🚀 Emby Scheme API 启动在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// GET / - 最小前端页面
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api - API 信息
async fn api_info_handler() -> impl IntoResponse {
    Json(json!({
        "name": "Emby Scheme API",
        "version": "0.1.0",
        "description": "Emby 开通信息解析与导入 Scheme URL 生成后端",
        "endpoints": {
            "core": {
                "GET /": "解析页面",
                "POST /scheme": "解析开通信息并生成 scheme URL (JSON: {text})",
                "GET /health": "健康检查"
            },
            "danmu": {
                "GET /danmu/search": "搜索弹幕分集 (?anime=&type=&season=&episode=)",
                "GET /danmu/comment/{id}": "获取弹幕内容",
                "POST /danmu/download": "触发弹幕自动导入并等待任务结束"
            }
        },
        "auth": {
            "note": "弹幕接口需要 server 与 api_key 参数，未提供时回退到 DANMU_SERVER / DANMU_API_KEY 环境变量"
        }
    }))
}

/// 健康检查
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// POST /scheme 请求体
#[derive(Debug, Deserialize)]
struct SchemeRequest {
    text: String,
}

/// POST /scheme - 解析开通信息并生成两种 scheme URL
async fn scheme_handler(Json(req): Json<SchemeRequest>) -> Response {
    let config = parser::parse(&req.text);

    if config.lines.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "未能在文本中找到有效的服务器地址"})),
        )
            .into_response();
    }

    let forward = scheme::encode(SchemeTarget::Forward, &config);
    let senplayer = scheme::encode(SchemeTarget::SenPlayer, &config);

    info!("🔗 解析成功: {} 条线路", config.lines.len());

    Json(json!({
        "username": config.username,
        "password": config.password,
        "lines": config.lines,
        "forward": forward,
        "senplayer": senplayer,
    }))
    .into_response()
}

// ============================================================================
// 弹幕服务端代理
// ============================================================================

/// 弹幕服务端参数：请求里没给就用环境变量
fn resolve_danmu_server(
    server: Option<String>,
    api_key: Option<String>,
) -> Result<danmaku::DanmuServer, String> {
    let server = server
        .or_else(|| std::env::var("DANMU_SERVER").ok())
        .filter(|s| !s.is_empty());
    let api_key = api_key
        .or_else(|| std::env::var("DANMU_API_KEY").ok())
        .filter(|s| !s.is_empty());

    match (server, api_key) {
        (Some(server), Some(api_key)) => {
            danmaku::DanmuServer::new(&server, &api_key).map_err(|e| e.to_string())
        }
        _ => Err("弹幕服务端地址或 API Key 未配置".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct DanmuSearchQuery {
    anime: String,
    #[serde(rename = "type")]
    media_type: Option<String>,
    season: Option<u32>,
    episode: Option<u32>,
    server: Option<String>,
    api_key: Option<String>,
}

/// GET /danmu/search - 搜索弹幕分集
async fn danmu_search_handler(Query(params): Query<DanmuSearchQuery>) -> impl IntoResponse {
    let server = match resolve_danmu_server(params.server, params.api_key) {
        Ok(server) => server,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e}))).into_response();
        }
    };

    let media_type = params.media_type.unwrap_or_else(|| "tv".to_string());
    match danmaku::search_danmu(
        &server,
        &params.anime,
        &media_type,
        params.season,
        params.episode,
    )
    .await
    {
        Ok(items) => Json(json!({"animes": items})).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct DanmuServerQuery {
    server: Option<String>,
    api_key: Option<String>,
}

/// GET /danmu/comment/{id} - 获取弹幕内容
async fn danmu_comment_handler(
    Path(id): Path<i64>,
    Query(params): Query<DanmuServerQuery>,
) -> impl IntoResponse {
    let server = match resolve_danmu_server(params.server, params.api_key) {
        Ok(server) => server,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e}))).into_response();
        }
    };

    match danmaku::get_comments(&server, id).await {
        Ok(comments) => Json(comments).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// POST /danmu/download 请求体
#[derive(Debug, Deserialize)]
struct DanmuDownloadRequest {
    title: String,
    tmdb_id: Option<String>,
    #[serde(rename = "type")]
    media_type: Option<String>,
    season: Option<u32>,
    episode: Option<u32>,
    server: Option<String>,
    api_key: Option<String>,
}

/// POST /danmu/download - 触发弹幕自动导入并等待任务结束
async fn danmu_download_handler(Json(req): Json<DanmuDownloadRequest>) -> impl IntoResponse {
    let server = match resolve_danmu_server(req.server, req.api_key) {
        Ok(server) => server,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(json!({"error": e}))).into_response();
        }
    };

    let media_type = req.media_type.unwrap_or_else(|| "tv".to_string());
    match danmaku::download_danmu(
        &server,
        &req.title,
        req.tmdb_id.as_deref(),
        &media_type,
        req.season,
        req.episode,
    )
    .await
    {
        Ok(outcome) => Json(json!(outcome)).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Emby Scheme 生成器</title>
  <style>
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
      font-family: -apple-system, "PingFang SC", "Microsoft YaHei", sans-serif;
      background: linear-gradient(135deg, #1a1a2e, #16213e);
      color: #fff;
      min-height: 100vh;
      padding: 40px 20px;
    }
    .container { max-width: 720px; margin: 0 auto; }
    h1 { text-align: center; margin-bottom: 8px; }
    .subtitle {
      text-align: center;
      color: rgba(255,255,255,0.6);
      font-size: 14px;
      margin-bottom: 24px;
    }
    textarea {
      width: 100%;
      height: 180px;
      padding: 14px 18px;
      border: none;
      border-radius: 12px;
      background: rgba(255,255,255,0.1);
      color: #fff;
      font-size: 14px;
      outline: none;
      resize: vertical;
      backdrop-filter: blur(10px);
    }
    textarea::placeholder { color: rgba(255,255,255,0.5); }
    textarea:focus { background: rgba(255,255,255,0.15); }
    button {
      display: block;
      width: 100%;
      margin: 16px 0;
      padding: 14px 28px;
      border: none;
      border-radius: 12px;
      background: linear-gradient(135deg, #ff6b9d, #c44dff);
      color: #fff;
      font-size: 16px;
      font-weight: 600;
      cursor: pointer;
      transition: transform 0.2s, opacity 0.2s;
    }
    button:hover { transform: scale(1.01); }
    button:disabled { opacity: 0.6; cursor: not-allowed; }
    .result {
      background: rgba(255,255,255,0.05);
      border-radius: 12px;
      padding: 16px;
      margin-bottom: 12px;
      word-break: break-all;
      font-size: 13px;
      display: none;
    }
    .result .label {
      font-size: 12px;
      color: rgba(255,255,255,0.5);
      margin-bottom: 6px;
    }
    .result a { color: #c44dff; text-decoration: none; }
    .error { color: #ff6b6b; text-align: center; display: none; }
  </style>
</head>
<body>
  <div class="container">
    <h1>Emby Scheme 生成器</h1>
    <div class="subtitle">粘贴开通信息，生成 Forward / SenPlayer 导入链接</div>
    <textarea id="text" placeholder="用户名：alice
密码：secret1
服务器：https://emby.example.com"></textarea>
    <button id="go">生成</button>
    <div class="error" id="error"></div>
    <div class="result" id="forward"><div class="label">Forward</div><a></a></div>
    <div class="result" id="senplayer"><div class="label">SenPlayer</div><a></a></div>
  </div>
  <script>
    const btn = document.getElementById('go');
    btn.addEventListener('click', async () => {
      btn.disabled = true;
      const errorBox = document.getElementById('error');
      errorBox.style.display = 'none';
      try {
        const res = await fetch('/scheme', {
          method: 'POST',
          headers: { 'Content-Type': 'application/json' },
          body: JSON.stringify({ text: document.getElementById('text').value }),
        });
        const data = await res.json();
        if (!res.ok) throw new Error(data.error || '解析失败');
        for (const key of ['forward', 'senplayer']) {
          const box = document.getElementById(key);
          const link = box.querySelector('a');
          link.textContent = data[key] || '';
          link.href = data[key] || '#';
          box.style.display = data[key] ? 'block' : 'none';
        }
      } catch (e) {
        errorBox.textContent = e.message;
        errorBox.style.display = 'block';
      } finally {
        btn.disabled = false;
      }
    });
  </script>
</body>
</html>
"#;
