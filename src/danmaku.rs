//! 弹幕服务端客户端
//! 对接 Misaka/dandanplay 风格的弹幕服务端：搜索分集、获取弹幕内容、
//! 触发自动导入并轮询任务直到终态

use crate::http_client::{get_json, post_empty};
use crate::types::{
    AnimeSource, DanmuItem, EpisodeSearchResponse, ExecutionTaskInfo, ImportAutoResponse,
    TaskOutcome, TaskStatusInfo,
};
use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 调度任务 -> 执行任务的轮询节奏
const EXECUTION_POLL_INTERVAL: Duration = Duration::from_secs(5);
const EXECUTION_POLL_ATTEMPTS: u32 = 30;

/// 执行任务状态的轮询节奏
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(10);
const TASK_POLL_ATTEMPTS: u32 = 30;

/// 弹幕服务端连接参数
#[derive(Debug, Clone)]
pub struct DanmuServer {
    /// 完整服务端地址（可含路径前缀）
    pub server: String,
    /// scheme://host 部分，控制面接口走这里
    pub host: String,
    pub api_key: String,
}

impl DanmuServer {
    pub fn new(server: &str, api_key: &str) -> Result<Self> {
        let host = extract_server_host(server)
            .ok_or_else(|| anyhow!("无效的服务器地址: {}", server))?;
        Ok(Self {
            server: server.trim().trim_end_matches('/').to_string(),
            host,
            api_key: api_key.to_string(),
        })
    }
}

/// 从服务端地址里取出 scheme://host 部分
fn extract_server_host(server: &str) -> Option<String> {
    static HOST_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)^(https?://[^/]+)").expect("host pattern"));
    HOST_RE
        .captures(server.trim())
        .map(|caps| caps[1].to_string())
}

/// 弹幕源 provider 的中文显示名
fn provider_display_name(provider: &str) -> &str {
    match provider {
        "tencent" => "腾讯视频",
        "iqiyi" => "爱奇艺",
        "youku" => "优酷视频",
        "bilibili" => "哔哩哔哩",
        "mgtv" => "芒果TV",
        "renren" => "人人影视",
        "gamer" => "巴哈姆特",
        other => other,
    }
}

/// 搜索关键词：电视剧带上季号
fn compose_query_title(title: &str, media_type: &str, season: Option<u32>) -> String {
    match season {
        Some(s) if media_type == "tv" => format!("{} S{}", title, s),
        _ => title.to_string(),
    }
}

/// 搜索弹幕分集。拿得到数据源信息时，标题前缀弹幕源名称
pub async fn search_danmu(
    server: &DanmuServer,
    title: &str,
    media_type: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> Result<Vec<DanmuItem>> {
    let query = compose_query_title(title, media_type, season);
    let mut search_url = format!(
        "{}/api/v2/search/episodes?anime={}",
        server.server,
        urlencoding::encode(&query)
    );
    if let Some(ep) = episode {
        search_url.push_str(&format!("&episode={}", ep));
    }

    let result: EpisodeSearchResponse = get_json(&search_url).await?;
    if !result.success {
        bail!(result
            .error_message
            .unwrap_or_else(|| "弹幕服务端调用失败".to_string()));
    }
    let anime = match result.animes.into_iter().next() {
        Some(anime) => anime,
        None => return Ok(Vec::new()),
    };

    // 数据源拿不到时照样返回分集，只是标题不带来源名
    let sources = match fetch_sources(server, anime.anime_id).await {
        Ok(sources) => sources,
        Err(e) => {
            warn!("获取数据源失败: {}", e);
            Vec::new()
        }
    };

    let items = anime
        .episodes
        .iter()
        .enumerate()
        .map(|(index, episode)| {
            let base_title = if anime.media_type == "movie" {
                anime.anime_title.clone()
            } else {
                episode.episode_title.clone()
            };
            let anime_title = match sources.get(index) {
                Some(source) if !source.provider_name.is_empty() => {
                    format!(
                        "[{}] {}",
                        provider_display_name(&source.provider_name),
                        base_title
                    )
                }
                _ => base_title,
            };
            DanmuItem {
                anime_id: episode.episode_id,
                anime_title,
                episode_title: episode.episode_title.clone(),
            }
        })
        .collect();

    Ok(items)
}

async fn fetch_sources(server: &DanmuServer, anime_id: i64) -> Result<Vec<AnimeSource>> {
    let url = format!(
        "{}/api/control/library/anime/{}/sources?api_key={}",
        server.host, anime_id, server.api_key
    );
    Ok(get_json(&url).await?)
}

/// 获取指定弹幕 ID 的弹幕内容，payload 原样转发
pub async fn get_comments(server: &DanmuServer, comment_id: i64) -> Result<serde_json::Value> {
    let url = format!(
        "{}/api/v2/comment/{}?withRelated=true&chConvert=1",
        server.server, comment_id
    );
    Ok(get_json(&url).await?)
}

/// 触发自动导入并等待任务结束。TMDB ID 优先，关键词兜底。
pub async fn download_danmu(
    server: &DanmuServer,
    title: &str,
    tmdb_id: Option<&str>,
    media_type: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> Result<TaskOutcome> {
    let media_type_param = if media_type == "movie" {
        "movie"
    } else {
        "tv_series"
    };

    let mut strategies: Vec<(&str, String)> = Vec::new();
    if let Some(id) = tmdb_id {
        strategies.push(("tmdb", id.to_string()));
    }
    strategies.push(("keyword", title.to_string()));

    for (search_type, search_term) in strategies {
        info!("弹幕导入: searchType={} searchTerm={}", search_type, search_term);
        match import_auto(server, search_type, &search_term, media_type_param, season, episode)
            .await
        {
            Ok(task_id) => return wait_for_download(server, &task_id).await,
            Err(e) => warn!("{} 搜索失败，尝试下一个策略: {}", search_type, e),
        }
    }

    bail!("弹幕下载失败：所有搜索策略都未成功")
}

/// 调用 /api/control/import/auto，202 之外都算失败
async fn import_auto(
    server: &DanmuServer,
    search_type: &str,
    search_term: &str,
    media_type: &str,
    season: Option<u32>,
    episode: Option<u32>,
) -> Result<String> {
    let mut url = format!(
        "{}/api/control/import/auto?searchType={}&searchTerm={}&api_key={}",
        server.host,
        search_type,
        urlencoding::encode(search_term),
        server.api_key
    );
    if let Some(s) = season {
        url.push_str(&format!("&season={}", s));
    }
    if let Some(e) = episode {
        url.push_str(&format!("&episode={}", e));
    }
    url.push_str(&format!("&mediaType={}", media_type));

    let response = post_empty(&url).await?;
    if response.status() != StatusCode::ACCEPTED {
        bail!("服务端返回状态码: {}", response.status().as_u16());
    }
    let accepted: ImportAutoResponse = response.json().await?;
    Ok(accepted.task_id)
}

/// 先等调度任务产生执行任务，再等执行任务跑完
async fn wait_for_download(server: &DanmuServer, scheduler_task_id: &str) -> Result<TaskOutcome> {
    let execution_task_id = match poll_execution_task_id(server, scheduler_task_id).await {
        Some(id) => id,
        None => {
            return Ok(TaskOutcome::TimedOut {
                message: "未找到弹幕下载执行任务，弹幕可能未成功下载".to_string(),
            });
        }
    };
    debug!("找到弹幕下载执行任务: {}", execution_task_id);
    wait_for_task(server, &execution_task_id).await
}

/// 轮询调度任务直到拿到执行任务 ID，超过次数返回 None
async fn poll_execution_task_id(server: &DanmuServer, scheduler_task_id: &str) -> Option<String> {
    for attempt in 0..EXECUTION_POLL_ATTEMPTS {
        let url = format!(
            "{}/api/control/tasks/{}/execution?api_key={}",
            server.host, scheduler_task_id, server.api_key
        );
        match get_json::<ExecutionTaskInfo>(&url).await {
            Ok(info) => {
                if let Some(id) = info.execution_task_id {
                    return Some(id);
                }
                debug!(
                    "暂未获取到执行任务ID，继续轮询 ({}/{})",
                    attempt + 1,
                    EXECUTION_POLL_ATTEMPTS
                );
            }
            Err(e) => warn!("获取执行任务ID失败: {}", e),
        }
        tokio::time::sleep(EXECUTION_POLL_INTERVAL).await;
    }
    None
}

/// 终态判定：Some(true) 成功、Some(false) 失败、None 仍在进行
fn classify_status(status: &str) -> Option<bool> {
    match status {
        "COMPLETED" | "已完成" => Some(true),
        "FAILED" | "失败" => Some(false),
        _ => None,
    }
}

/// 轮询执行任务状态直到终态；次数用尽是超时，不是失败
async fn wait_for_task(server: &DanmuServer, task_id: &str) -> Result<TaskOutcome> {
    for _ in 0..TASK_POLL_ATTEMPTS {
        match fetch_task_status(server, task_id).await {
            Ok(task) => {
                debug!(
                    "任务 {} 状态: {} 进度: {:?}",
                    task_id, task.status, task.progress
                );
                match classify_status(&task.status) {
                    Some(true) => {
                        return Ok(TaskOutcome::Completed {
                            message: "弹幕下载任务完成".to_string(),
                        });
                    }
                    Some(false) => {
                        return Ok(TaskOutcome::Failed {
                            message: format!(
                                "弹幕下载任务失败: {}",
                                task.description.unwrap_or_default()
                            ),
                        });
                    }
                    None => {}
                }
            }
            Err(e) => warn!("检查任务状态出错: {}", e),
        }
        tokio::time::sleep(TASK_POLL_INTERVAL).await;
    }

    Ok(TaskOutcome::TimedOut {
        message: "弹幕下载任务超时未完成".to_string(),
    })
}

async fn fetch_task_status(server: &DanmuServer, task_id: &str) -> Result<TaskStatusInfo> {
    let url = format!(
        "{}/api/control/tasks/{}?api_key={}",
        server.host, task_id, server.api_key
    );
    Ok(get_json(&url).await?)
}
