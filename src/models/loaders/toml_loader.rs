use crate::error::{AppResult, FileError};
use crate::models::dimension::{DimensionConfig, DimensionSpec};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载维度配置并校验
pub async fn load_dimension_specs(toml_file_path: &Path) -> AppResult<Vec<DimensionSpec>> {
    let path_str = toml_file_path.display().to_string();

    if !toml_file_path.exists() {
        return Err(FileError::NotFound { path: path_str }.into());
    }

    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| FileError::ReadFailed {
            path: path_str.clone(),
            source: Box::new(e),
        })?;

    let specs = parse_dimension_specs(&content).map_err(|e| FileError::TomlParseFailed {
        path: path_str,
        source: Box::new(e),
    })?;

    tracing::info!("成功加载 {} 个评估维度", specs.len());
    Ok(specs)
}

/// 解析 TOML 文本中的维度配置
pub fn parse_dimension_specs(content: &str) -> Result<Vec<DimensionSpec>, DimensionParseError> {
    let config: DimensionConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config.dimensions)
}

/// 维度配置解析失败
#[derive(Debug, thiserror::Error)]
pub enum DimensionParseError {
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] crate::error::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[dimensions]]
key = "logic"
display_name = "逻辑性"
weight = 1.0
full_score = 10.0
selection_prompt_template = "选择章节：{toc}"
assessment_prompt_template = "评估：{content}"

[[dimensions]]
key = "innovation"
display_name = "创新性"
weight = 2
full_score = 10
selection_prompt_template = "选择章节：{toc}"
assessment_prompt_template = "评估：{content}"
"#;

    #[test]
    fn test_parse_dimension_specs() {
        let specs = parse_dimension_specs(SAMPLE).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].key, "innovation");
        assert_eq!(specs[1].weight, 2.0);
    }

    #[test]
    fn test_parse_rejects_negative_weight() {
        let content = SAMPLE.replace("weight = 2", "weight = -1");
        assert!(matches!(
            parse_dimension_specs(&content),
            Err(DimensionParseError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = load_dimension_specs(Path::new("definitely/missing/dimensions.toml")).await;
        assert!(matches!(
            result,
            Err(crate::error::AppError::File(FileError::NotFound { .. }))
        ));
    }
}
