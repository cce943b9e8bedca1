use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tokio::fs;

use crate::error::ConfigError;

/// 分类文件结构（只读取需要的部分）
#[derive(Debug, Deserialize)]
struct CategoriesFile {
    #[serde(default)]
    url_patterns: UrlPatterns,
}

#[derive(Debug, Default, Deserialize)]
struct UrlPatterns {
    #[serde(default)]
    categories: Vec<CategoryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryEntry {
    Info { url: String },
    Other(serde_json::Value),
}

/// 从分类 URL 中取出分类名（`/quizzes/` 之后的第一段）
pub fn category_from_url(url: &str) -> Option<String> {
    let re = Regex::new(r"/quizzes/([A-Za-z0-9_\-]+)").ok()?;
    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 去重并保留首次出现的顺序
pub fn dedup_preserving_order(categories: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    categories
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// 从分类文件加载全部分类
pub async fn load_categories(path: &Path) -> Result<Vec<String>, ConfigError> {
    let display = path.display().to_string();

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::CategoriesUnavailable {
            path: display.clone(),
            reason: e.to_string(),
        })?;

    let file: CategoriesFile =
        serde_json::from_str(&content).map_err(|e| ConfigError::CategoriesUnavailable {
            path: display.clone(),
            reason: e.to_string(),
        })?;

    let categories: Vec<String> = file
        .url_patterns
        .categories
        .iter()
        .filter_map(|entry| match entry {
            CategoryEntry::Info { url } => category_from_url(url),
            CategoryEntry::Other(_) => None,
        })
        .collect();

    let categories = dedup_preserving_order(categories);
    if categories.is_empty() {
        return Err(ConfigError::CategoriesUnavailable {
            path: display,
            reason: "文件中没有分类 URL".to_string(),
        });
    }

    tracing::info!("✓ 从 {} 加载了 {} 个分类", path.display(), categories.len());
    Ok(categories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_category_segment() {
        assert_eq!(
            category_from_url("https://www.funtrivia.com/quizzes/movies/horror.html").as_deref(),
            Some("movies")
        );
        assert_eq!(category_from_url("https://www.funtrivia.com/en/"), None);
    }

    #[tokio::test]
    async fn loads_and_dedups_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_categories.json");
        std::fs::write(
            &path,
            r#"{
                "url_patterns": {
                    "categories": [
                        {"url": "https://www.funtrivia.com/quizzes/movies/a.html"},
                        {"url": "https://www.funtrivia.com/quizzes/music/b.html"},
                        {"url": "https://www.funtrivia.com/quizzes/movies/c.html"},
                        "junk"
                    ]
                },
                "raw_domains": {"movies": 10}
            }"#,
        )
        .unwrap();

        let categories = load_categories(&path).await.unwrap();
        assert_eq!(categories, vec!["movies".to_string(), "music".to_string()]);
    }

    #[tokio::test]
    async fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_categories(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, ConfigError::CategoriesUnavailable { .. }));
    }
}
