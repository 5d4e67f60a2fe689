//! 数据类型定义
//! 配置解析结果与弹幕服务端 API 的请求/响应结构

use serde::{Deserialize, Serialize};

/// 从开通信息文本解析出的服务器配置
///
/// `username`/`password` 为空字符串表示文本中没有找到对应字段，
/// 生成 scheme URL 时参数照常携带、值为空。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerConfig {
    pub username: String,
    pub password: String,
    /// 按文本中出现顺序排列，第一条为主线路，其余为备用线路
    pub lines: Vec<LineEntry>,
}

/// 单条线路
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineEntry {
    /// 线路标题，归一化后不会为空（缺省为 "线路"）
    pub title: String,
    /// 归一化后的绝对 URL
    pub url: String,
}

impl LineEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Scheme URL 的目标应用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeTarget {
    /// forward://import?type=emby&...
    Forward,
    /// senplayer://importserver?type=emby&address=...
    SenPlayer,
}

// ============================================================================
// 弹幕服务端 API 类型
// ============================================================================

/// GET /api/v2/search/episodes 响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSearchResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub animes: Vec<Anime>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anime {
    pub anime_id: i64,
    pub anime_title: String,
    /// "movie" 或剧集类型
    #[serde(rename = "type", default)]
    pub media_type: String,
    #[serde(default)]
    pub episodes: Vec<AnimeEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeEpisode {
    pub episode_id: i64,
    pub episode_title: String,
}

/// GET /api/control/library/anime/{id}/sources 响应中的单个数据源
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeSource {
    #[serde(default)]
    pub provider_name: String,
}

/// 返回给播放端的弹幕分集条目
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanmuItem {
    pub anime_id: i64,
    pub anime_title: String,
    pub episode_title: String,
}

/// POST /api/control/import/auto 的 202 响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAutoResponse {
    pub task_id: String,
}

/// GET /api/control/tasks/{id}/execution 响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTaskInfo {
    #[serde(default)]
    pub execution_task_id: Option<String>,
}

/// GET /api/control/tasks/{id} 响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusInfo {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 弹幕下载任务的最终结果，超时与失败是两种不同的结局
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed { message: String },
    Failed { message: String },
    TimedOut { message: String },
}
