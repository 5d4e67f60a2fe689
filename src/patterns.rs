//! 解析规则表
//! 标签集合与黑名单以数据表形式维护，正则按表拼装、首次使用时编译

use once_cell::sync::Lazy;
use regex::Regex;

/// 用户名标签（长标签在前，避免被短标签抢先截断）
pub const USERNAME_LABELS: &[&str] = &["用户名称", "用户名"];

/// 密码标签
pub const PASSWORD_LABELS: &[&str] = &["用户密码", "密码"];

/// 固定的线路标签
pub const ADDRESS_LABELS: &[&str] = &["当前线路", "主线路", "服务器", "地址", "主机名"];

/// 前缀式线路标签，后面可以跟任意修饰词（如 "ip线路"、"域名国内"、"直连地址"）
pub const ADDRESS_LABEL_PREFIXES: &[&str] = &["ip", "域名", "直连"];

/// 标题重写表：这些标题与通用的 "线路" 等价
pub const TITLE_REWRITES: &[(&str, &str)] = &[("当前线路", "线路"), ("主线路", "线路")];

/// 通用标题，生成 scheme URL 时不携带 title 参数
pub const GENERIC_TITLES: &[&str] = &["线路", "地址", "服务器"];

/// 黑名单关键词：命中说明这是文档/付费/群组链接，不是服务器地址
pub const URL_DENYLIST: &[&str] = &[
    "wiki", "faka", "notion", "t.me", "telegram", "推荐", "续费", "help", "帮助",
];

/// 标签与值之间允许的分隔符：竖线、全角冒号、半角冒号
const SEPARATOR: &str = r"\s*[|：:]\s*";

/// 线路标签的正则备选分支，由上面的表拼出
fn address_label_alternation() -> String {
    let mut parts: Vec<String> = ADDRESS_LABELS.iter().map(|l| regex::escape(l)).collect();
    for prefix in ADDRESS_LABEL_PREFIXES {
        parts.push(format!(r"{}\w*", regex::escape(prefix)));
    }
    // 任何以 "线路" 结尾的词也算线路标签
    parts.push(r"\w*线路".to_string());
    parts.join("|")
}

/// 用户名行。值允许字母、数字、连字符、下划线与常见 emoji
pub static USERNAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:{}){}([\p{{L}}\p{{N}}_\-\x{{1F300}}-\x{{1FAFF}}]+)",
        USERNAME_LABELS.join("|"),
        SEPARATOR
    ))
    .expect("username pattern")
});

/// 密码行。值取第一段非空白字符
pub static PASSWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:{}){}(\S+)",
        PASSWORD_LABELS.join("|"),
        SEPARATOR
    ))
    .expect("password pattern")
});

/// 带标签的地址行。值可带协议与端口，遇到中文或括号即截断
pub static LABELED_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)((?:{})\s*){}((?:https?://)?[A-Za-z0-9\[][A-Za-z0-9.\-:\[\]]*)",
        address_label_alternation(),
        SEPARATOR
    ))
    .expect("labeled address pattern")
});

/// 整行只有一个裸地址：域名（至少一个点）、IPv4 或带方括号的 IPv6，端口可选
pub static STANDALONE_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(https?://)?([A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+|\d{1,3}(?:\.\d{1,3}){3}|\[[0-9a-fA-F:]+\])(:\d{1,5})?/?$",
    )
    .expect("standalone address pattern")
});

/// 单独的端口行
pub static PORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:https?\s*端口|端口){}(\d{{2,5}})", SEPARATOR))
        .expect("port pattern")
});

/// 最终过滤：http(s)://host(:port)?，host 为域名、IPv4 或 IPv6 字面量
pub static FINAL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^https?://((?:\d{1,3}\.){3}\d{1,3}|\[[0-9a-fA-F:]+\]|[A-Za-z0-9][A-Za-z0-9.-]*)(:\d{1,5})?/?$",
    )
    .expect("final url pattern")
});

/// url 是否命中黑名单关键词（不区分大小写）
pub fn is_denylisted(url: &str) -> bool {
    let lower = url.to_lowercase();
    URL_DENYLIST.iter().any(|kw| lower.contains(kw))
}

/// 标题是否属于通用标题
pub fn is_generic_title(title: &str) -> bool {
    GENERIC_TITLES.contains(&title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_address_matches_every_label_class() {
        let lines = [
            "当前线路：https://current.example.com",
            "主线路：line.example.com",
            "服务器：https://server.example.com",
            "地址|https://addr.example.com:9000",
            "主机名： host.example.com",
            "IP线路: https://192.168.1.100:8920",
            "域名国内线路：domain-cn.example.com",
            "直连地址：direct.example.com:9000",
            "CDN加速线路：https://cdn-hk.example.com:443",
        ];
        for line in lines {
            assert!(
                LABELED_ADDRESS_RE.is_match(line),
                "应当匹配标签地址行: {}",
                line
            );
        }
    }

    #[test]
    fn test_labeled_address_captures_label_and_value() {
        let caps = LABELED_ADDRESS_RE
            .captures("联通线路|https://unicom.example.com")
            .unwrap();
        assert_eq!(caps[1].trim(), "联通线路");
        assert_eq!(&caps[2], "https://unicom.example.com");
    }

    #[test]
    fn test_standalone_requires_whole_line() {
        assert!(STANDALONE_ADDRESS_RE.is_match("emby.example.com:8096"));
        assert!(STANDALONE_ADDRESS_RE.is_match("https://emby.example.com/"));
        assert!(STANDALONE_ADDRESS_RE.is_match("192.168.1.50"));
        assert!(STANDALONE_ADDRESS_RE.is_match("[2001:db8::1]:8920"));
        // 带备注或路径的行不算裸地址
        assert!(!STANDALONE_ADDRESS_RE.is_match("https://t.me/embychannel"));
        assert!(!STANDALONE_ADDRESS_RE.is_match("https://emby.example.com:8096/（备注）"));
        // 没有点的裸词不算域名
        assert!(!STANDALONE_ADDRESS_RE.is_match("localhost"));
    }

    #[test]
    fn test_port_line_variants() {
        for line in ["端口：8096", "http端口: 8920", "https 端口： 443", "端口|9001"] {
            let caps = PORT_RE.captures(line).unwrap();
            assert!(caps[1].len() >= 2, "端口号应被捕获: {}", line);
        }
        // 正文里顺带提到端口号、但没有分隔符的行不算端口行
        assert!(!PORT_RE.is_match("请注意 http端口是80 https端口443"));
    }

    #[test]
    fn test_denylist_case_insensitive() {
        assert!(is_denylisted("https://WIKI.example.com"));
        assert!(is_denylisted("https://t.me/embychannel"));
        assert!(is_denylisted("https://faka.example.com:443"));
        assert!(!is_denylisted("https://emby.example.com"));
    }

    #[test]
    fn test_generic_titles() {
        assert!(is_generic_title("线路"));
        assert!(is_generic_title("服务器"));
        assert!(!is_generic_title("IP线路"));
    }
}
