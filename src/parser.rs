//! 配置文本解析器
//! 从人工粘贴的开通信息中提取用户名、密码与线路列表。
//! 逐行扫描，规则按固定优先级尝试；无法识别的行一律跳过，绝不报错。

use crate::patterns::{
    is_denylisted, FINAL_URL_RE, LABELED_ADDRESS_RE, PASSWORD_RE, PORT_RE,
    STANDALONE_ADDRESS_RE, TITLE_REWRITES, USERNAME_RE,
};
use crate::types::{LineEntry, ServerConfig};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// 缓存的无端口主机，等待后续端口行补齐
struct PendingHost {
    title: String,
    host: String,
}

/// 解析开通信息文本。同样的输入总是得到同样的输出。
pub fn parse(text: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    let mut pending: Option<PendingHost> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        // 凭据规则与地址规则互不抢占：同一行可以既写凭据又写地址。
        // 用户名、密码都只认第一次出现的值。
        let mut credential_line = false;
        if let Some(caps) = USERNAME_RE.captures(line) {
            if config.username.is_empty() {
                config.username = caps[1].to_string();
            }
            credential_line = true;
        }
        if let Some(caps) = PASSWORD_RE.captures(line) {
            if config.password.is_empty() {
                config.password = caps[1].to_string();
            }
            credential_line = true;
        }
        if credential_line {
            // 凭据行打断主机等待，挂起的主机按缺省规则成线
            flush_pending(&mut pending, &mut config.lines);
        }

        // 带标签的地址行，优先于裸地址行
        if let Some(caps) = LABELED_ADDRESS_RE.captures(line) {
            let token = caps[2].to_string();
            if looks_like_host(&token) {
                let title = normalize_title(caps[1].trim());
                flush_pending(&mut pending, &mut config.lines);
                push_or_park(title, token, &mut pending, &mut config.lines);
                continue;
            }
            // 伪匹配（比如值只是一串数字），交给后面的规则继续处理
        }

        // 整行只有一个裸地址
        if let Some(caps) = STANDALONE_ADDRESS_RE.captures(line) {
            if is_denylisted(line) {
                debug!("黑名单行跳过: {}", line);
                continue;
            }
            let scheme = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let port = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            let token = format!("{}{}{}", scheme, &caps[2], port);
            flush_pending(&mut pending, &mut config.lines);
            push_or_park("线路".to_string(), token, &mut pending, &mut config.lines);
            continue;
        }

        // 单独的端口行：只有存在挂起主机时才有意义
        if let Some(caps) = PORT_RE.captures(line) {
            if let Some(host) = pending.take() {
                let port = &caps[1];
                let url = if has_scheme(&host.host) {
                    format!("{}:{}", host.host, port)
                } else {
                    let scheme = scheme_for_port(port.parse().unwrap_or(0));
                    format!("{}://{}:{}", scheme, host.host, port)
                };
                config.lines.push(LineEntry::new(host.title, url));
            }
            continue;
        }

        if !credential_line {
            debug!("未识别行跳过: {}", line);
        }
    }

    // 文本结束，挂起的主机不能悄悄丢掉
    flush_pending(&mut pending, &mut config.lines);

    let lines = std::mem::take(&mut config.lines);
    config.lines = finalize_lines(lines);
    config
}

/// 地址 token 带端口（或本身是完整 URL）就立即成线，否则挂起等端口行
fn push_or_park(
    title: String,
    token: String,
    pending: &mut Option<PendingHost>,
    lines: &mut Vec<LineEntry>,
) {
    if has_scheme(&token) {
        lines.push(LineEntry::new(title, token));
        *pending = None;
    } else if let Some(port) = explicit_port(&token) {
        let url = format!("{}://{}", scheme_for_port(port), token);
        lines.push(LineEntry::new(title, url));
        *pending = None;
    } else {
        *pending = Some(PendingHost { title, host: token });
    }
}

/// 挂起的主机被打断或到达文本末尾时转正，缺的协议与端口交给归一化补
fn flush_pending(pending: &mut Option<PendingHost>, lines: &mut Vec<LineEntry>) {
    if let Some(host) = pending.take() {
        lines.push(LineEntry::new(host.title, host.host));
    }
}

/// 标签归一化："当前线路"、"主线路" 统一记为 "线路"
fn normalize_title(label: &str) -> String {
    for (from, to) in TITLE_REWRITES {
        if label == *from {
            return to.to_string();
        }
    }
    label.to_string()
}

fn has_scheme(token: &str) -> bool {
    token.starts_with("http://") || token.starts_with("https://")
}

/// 端口推断协议：443/8443 视为 https，其余 http
fn scheme_for_port(port: u32) -> &'static str {
    if port == 443 || port == 8443 {
        "https"
    } else {
        "http"
    }
}

/// 值像不像主机：有协议、有点号或是 IPv6 字面量
fn looks_like_host(token: &str) -> bool {
    has_scheme(token) || token.contains('.') || token.starts_with('[')
}

/// 提取 token 末尾的显式端口。IPv6 字面量内部的冒号不算端口分隔符。
fn explicit_port(token: &str) -> Option<u32> {
    let rest = token
        .strip_prefix("https://")
        .or_else(|| token.strip_prefix("http://"))
        .unwrap_or(token);
    let rest = rest.trim_end_matches('/');
    let tail = match rest.rfind(']') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    let (_, port) = tail.rsplit_once(':')?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}

/// URL 归一化：去掉尾部斜杠，补协议；裸主机补成 https://host:443。
/// 对已归一化的 URL 再调用一次结果不变。
fn normalize_url(raw: &str) -> String {
    let url = raw.trim().trim_end_matches('/');
    if has_scheme(url) {
        return url.to_string();
    }
    match explicit_port(url) {
        Some(port) => format!("{}://{}", scheme_for_port(port), url),
        None => format!("https://{}:443", url),
    }
}

/// 归一化、黑名单与格式过滤、按 origin 去重（保留先出现的条目）
fn finalize_lines(lines: Vec<LineEntry>) -> Vec<LineEntry> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for mut entry in lines {
        entry.url = normalize_url(&entry.url);
        if entry.title.is_empty() {
            entry.title = "线路".to_string();
        }

        if is_denylisted(&entry.url) {
            debug!("黑名单过滤: {}", entry.url);
            continue;
        }
        if !FINAL_URL_RE.is_match(&entry.url) {
            debug!("格式不符，跳过: {}", entry.url);
            continue;
        }
        let origin = match Url::parse(&entry.url) {
            Ok(u) => u.origin().ascii_serialization(),
            Err(e) => {
                debug!("URL 解析失败，跳过 {}: {}", entry.url, e);
                continue;
            }
        };
        if !seen.insert(origin) {
            debug!("重复线路去除: {}", entry.url);
            continue;
        }
        result.push(entry);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_labeled_config() {
        let config = parse("用户名：alice\n密码：secret1\n服务器：https://emby.example.com\n");
        assert_eq!(config.username, "alice");
        assert_eq!(config.password, "secret1");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("服务器", "https://emby.example.com")]
        );
    }

    #[test]
    fn test_first_credential_wins() {
        let config = parse("用户名：alice\n用户名：bob\n密码：one\n用户密码：two\n");
        assert_eq!(config.username, "alice");
        assert_eq!(config.password, "one");
    }

    #[test]
    fn test_credentials_with_bullets_and_pipes() {
        let text = "▎创建用户成功🎉\n\n· 用户名称 | misaka\n· 用户密码 | pass123\n· 安全密码 | pass000（仅发送一次）\n· 到期时间 | 2025-07-17 19:29:17\n· 当前线路：\nhttps://line.example.com\n\nhttps://line2.example.com\n";
        let config = parse(text);
        assert_eq!(config.username, "misaka");
        assert_eq!(config.password, "pass123");
        assert_eq!(config.lines.len(), 2);
        assert_eq!(config.lines[0].title, "线路");
        assert_eq!(config.lines[0].url, "https://line.example.com");
    }

    #[test]
    fn test_username_allows_unicode_and_emoji() {
        let config = parse("用户名：user张三-abc_123🚀\n");
        assert_eq!(config.username, "user张三-abc_123🚀");
    }

    #[test]
    fn test_pending_host_resolved_by_https_port() {
        let config = parse("主线路： line.example.com\nhttps 端口： 443\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("线路", "https://line.example.com:443")]
        );
    }

    #[test]
    fn test_pending_host_resolved_by_plain_port() {
        let config = parse("IP地址：192.168.1.200\n端口：8920\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("IP地址", "http://192.168.1.200:8920")]
        );
    }

    #[test]
    fn test_unresolved_pending_host_flushed_at_eof() {
        let config = parse("主机名：emby.example.com\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("主机名", "https://emby.example.com:443")]
        );
    }

    #[test]
    fn test_credential_line_interrupts_pending_host() {
        let config = parse("电信线路：telecom.example.com\n用户名：carol\n端口|9001\n");
        // 凭据行打断等待，端口行不再回填，主机按缺省 https:443 成线
        assert_eq!(
            config.lines,
            vec![LineEntry::new("电信线路", "https://telecom.example.com:443")]
        );
    }

    #[test]
    fn test_new_address_line_flushes_previous_pending() {
        let config = parse("服务器：emby5.example.com\n主机名：emby6.example.com\nhttps 端口：443\n");
        assert_eq!(
            config.lines,
            vec![
                LineEntry::new("服务器", "https://emby5.example.com:443"),
                LineEntry::new("主机名", "https://emby6.example.com:443"),
            ]
        );
    }

    #[test]
    fn test_labeled_inline_port_decides_scheme() {
        let config = parse("服务器：emby.example.com:8096\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("服务器", "http://emby.example.com:8096")]
        );
    }

    #[test]
    fn test_labeled_value_stops_before_note() {
        let config = parse("地址: http://line.example.com:123（其123为端口）\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("地址", "http://line.example.com:123")]
        );
    }

    #[test]
    fn test_port_line_without_pending_is_inert() {
        let config = parse("https 端口： 443\n端口：8096\n");
        assert!(config.lines.is_empty());
    }

    #[test]
    fn test_standalone_host_then_port_line() {
        let config = parse("standalone.example.com\n端口：443（备注）\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("线路", "https://standalone.example.com:443")]
        );
    }

    #[test]
    fn test_mixed_port_lines_bind_in_order() {
        let text = "主线路： line.example.com\nhttp端口：80\nhttps 端口： 443\n备用线路： line2.example.com\nhttps 端口： 443\n";
        let config = parse(text);
        assert_eq!(
            config.lines,
            vec![
                LineEntry::new("线路", "http://line.example.com:80"),
                LineEntry::new("备用线路", "https://line2.example.com:443"),
            ]
        );
    }

    #[test]
    fn test_denylist_drops_labeled_and_standalone() {
        let text = "推荐线路：https://wiki.example.com\nfaka.example.com:8080\n续费线路：https://pay.example.com:443\n";
        let config = parse(text);
        // wiki/faka 命中黑名单；续费行的 URL 本身干净，标签不影响
        assert_eq!(
            config.lines,
            vec![LineEntry::new("续费线路", "https://pay.example.com:443")]
        );
    }

    #[test]
    fn test_telegram_and_doc_links_never_parsed() {
        let text = "Telegram：https://t.me/embychannel\n说明文档：https://notion.example.com/help\n帮助页面：https://help.example.com\n";
        let config = parse(text);
        assert!(config.lines.is_empty());
    }

    #[test]
    fn test_origin_deduplication_keeps_first_title() {
        let text = "备用线路：https://emby.example.com:443\n国内线路：https://emby.example.com/\n";
        let config = parse(text);
        assert_eq!(config.lines.len(), 1);
        assert_eq!(config.lines[0].title, "备用线路");
    }

    #[test]
    fn test_two_standalone_urls_keep_order() {
        let config = parse("https://a.example.com\nhttps://b.example.com\n");
        assert_eq!(
            config.lines,
            vec![
                LineEntry::new("线路", "https://a.example.com"),
                LineEntry::new("线路", "https://b.example.com"),
            ]
        );
    }

    #[test]
    fn test_vip_host_is_not_mistaken_for_label() {
        // "vip" 里的 "ip" 不能被当成标签，整行应按裸地址处理
        let config = parse("http://emby.vip:8096\n");
        assert_eq!(
            config.lines,
            vec![LineEntry::new("线路", "http://emby.vip:8096")]
        );
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert_eq!(parse(""), ServerConfig::default());
        let config = parse("随便写点什么\nnot-a-valid-url\nftp://invalid.protocol.com\n");
        assert!(config.lines.is_empty());
        assert!(config.username.is_empty());
        assert!(config.password.is_empty());
    }

    #[test]
    fn test_normalize_url_idempotent() {
        let once = normalize_url("emby.example.com");
        assert_eq!(once, "https://emby.example.com:443");
        assert_eq!(normalize_url(&once), once);
        assert_eq!(
            normalize_url("https://emby.example.com:8096/"),
            "https://emby.example.com:8096"
        );
        assert_eq!(normalize_url("192.168.1.20:8920"), "http://192.168.1.20:8920");
        assert_eq!(normalize_url("host.example.com:8443"), "https://host.example.com:8443");
    }

    #[test]
    fn test_explicit_port_handles_ipv6_brackets() {
        assert_eq!(explicit_port("[2001:db8::1]:8920"), Some(8920));
        assert_eq!(explicit_port("[2001:db8::1]"), None);
        assert_eq!(explicit_port("https://emby.example.com:443"), Some(443));
        assert_eq!(explicit_port("emby.example.com"), None);
    }
}
