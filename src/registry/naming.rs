//! 重名节点的去重命名

/// 重名后缀标记，后接从 1 开始的序号
pub const DUPLICATE_MARKER: &str = "-重名";

/// 返回一个未被占用的名称：候选名未占用时原样返回，否则依次尝试 `候选名-重名1`、`候选名-重名2` ...
pub fn unique_name<F>(candidate: &str, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !is_taken(candidate) {
        return candidate.to_string();
    }

    let mut counter = 1usize;
    loop {
        let name = format!("{}{}{}", candidate, DUPLICATE_MARKER, counter);
        if !is_taken(&name) {
            return name;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_free_name_is_kept() {
        let taken: HashSet<String> = HashSet::new();
        assert_eq!(unique_name("HK", |n| taken.contains(n)), "HK");
    }

    #[test]
    fn test_suffix_increments_until_free() {
        let taken: HashSet<String> = ["HK", "HK-重名1", "HK-重名2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(unique_name("HK", |n| taken.contains(n)), "HK-重名3");
    }

    #[test]
    fn test_deterministic() {
        let taken: HashSet<String> = ["JP".to_string()].into_iter().collect();
        let first = unique_name("JP", |n| taken.contains(n));
        let second = unique_name("JP", |n| taken.contains(n));
        assert_eq!(first, "JP-重名1");
        assert_eq!(first, second);
    }
}
