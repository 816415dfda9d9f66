//! 节点名称过滤：关键词黑名单优先，其余按正则白名单保留

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Include,
    Blocked,
    NotMatched,
}

#[derive(Debug, Clone)]
pub struct NameFilter {
    allow: Regex,
    block: Vec<String>,
}

impl NameFilter {
    pub fn new(allow: &str, block: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            allow: Regex::new(allow)?,
            block: block
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }

    /// 解析 `|` 分隔的关键词，如 `rate|x1|1x`
    pub fn parse_keywords(keywords: &str) -> Vec<String> {
        keywords
            .split('|')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn check(&self, name: &str) -> FilterDecision {
        if !self.block.is_empty() {
            let lower = name.to_lowercase();
            if self.block.iter().any(|k| lower.contains(k.as_str())) {
                return FilterDecision::Blocked;
            }
        }

        if self.allow.is_match(name) {
            FilterDecision::Include
        } else {
            FilterDecision::NotMatched
        }
    }
}
