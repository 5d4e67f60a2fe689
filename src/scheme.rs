//! Scheme URL 生成
//! 把解析出的配置拼成 Forward / SenPlayer 的导入链接。
//! 参数一律原样拼接、不做任何编码，这是目标 App 解析 scheme 的要求。

use crate::patterns::is_generic_title;
use crate::types::{SchemeTarget, ServerConfig};
use tracing::warn;
use url::Url;

/// 生成指定目标应用的导入 scheme URL。
/// 线路为空或主线路无法按绝对 URL 解析时返回 None。
pub fn encode(target: SchemeTarget, config: &ServerConfig) -> Option<String> {
    match target {
        SchemeTarget::Forward => forward_scheme_url(config),
        SchemeTarget::SenPlayer => senplayer_scheme_url(config),
    }
}

/// 拆开的线路 URL，端口总是落实成具体数字
struct UrlParts {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

/// 重新解析存储的 URL，保证隐含端口也能拿到数值
fn split_url(raw: &str) -> Option<UrlParts> {
    let url = Url::parse(raw.trim()).ok()?;
    let scheme = url.scheme().to_string();
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    let path = match url.path() {
        "" | "/" => String::new(),
        p => p.to_string(),
    };
    Some(UrlParts {
        scheme,
        host,
        port,
        path,
    })
}

/// 通用标题 "线路" 在备用线路里换成 "备用线路{n}"
fn backup_title(title: &str, n: usize) -> String {
    if title == "线路" {
        format!("备用线路{}", n)
    } else {
        title.to_string()
    }
}

fn forward_scheme_url(config: &ServerConfig) -> Option<String> {
    let primary = config.lines.first()?;
    let parts = split_url(&primary.url)?;

    let mut url = format!(
        "forward://import?type=emby&scheme={}&host={}&port={}&username={}&password={}",
        parts.scheme, parts.host, parts.port, config.username, config.password
    );

    // 通用标题不携带信息，省略 title 参数
    let first_title = if primary.title.is_empty() {
        parts.host.clone()
    } else {
        primary.title.clone()
    };
    if !is_generic_title(&first_title) {
        url.push_str(&format!("&title={}", first_title));
    }

    for (index, line) in config.lines.iter().skip(1).enumerate() {
        let n = index + 1;
        let line_url = line.url.trim().trim_end_matches('/');
        let title = backup_title(&line.title, n);
        url.push_str(&format!("&line{}={}&line{}title={}", n, line_url, n, title));
    }

    Some(url)
}

fn senplayer_scheme_url(config: &ServerConfig) -> Option<String> {
    let primary = config.lines.first()?;
    let parts = split_url(&primary.url)?;

    let mut url = format!(
        "senplayer://importserver?type=emby&address={}&username={}&password={}",
        format_address(&parts),
        config.username,
        config.password
    );

    let mut n = 0;
    for line in config.lines.iter().skip(1) {
        let parts = match split_url(&line.url) {
            Some(p) => p,
            None => {
                warn!("备用线路格式异常，跳过: {}", line.url);
                continue;
            }
        };
        n += 1;
        let title = backup_title(&line.title, n);
        url.push_str(&format!(
            "&address{}={}&address{}name={}",
            n,
            format_address(&parts),
            n,
            title
        ));
    }

    Some(url)
}

/// address 参数必须带 scheme、host 与端口，路径可选
fn format_address(parts: &UrlParts) -> String {
    format!(
        "{}://{}:{}{}",
        parts.scheme, parts.host, parts.port, parts.path
    )
}
