use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 调用错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 模型响应解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),
    /// 评估流程错误
    #[error("评估错误: {0}")]
    Evaluation(#[from] EvaluationError),
    /// 任务状态存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 请求构建失败
    #[error("LLM 请求构建失败 (模型: {model}): {message}")]
    RequestBuildFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 模型响应不符合预期结构
#[derive(Debug, Error)]
pub enum ParseError {
    /// 响应中找不到 JSON
    #[error("响应中没有可解析的 JSON ({context}): {preview}")]
    NoJson { context: String, preview: String },
    /// JSON 结构不匹配
    #[error("响应结构不匹配 ({context}): {message}")]
    InvalidShape { context: String, message: String },
    /// 分数超出范围
    #[error("分数 {score} 超出范围 [0, {full_score}]")]
    ScoreOutOfRange { score: f64, full_score: f64 },
    /// 章节选择为空
    #[error("章节选择结果为空")]
    EmptySelection,
}

/// 评估流程错误
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// 没有任何维度评估成功
    #[error("所有 {attempted} 个维度均评估失败，无法计算总分")]
    NoDimensionSucceeded { attempted: usize },
    /// 权重之和为 0
    #[error("有效维度的权重之和为 0，无法计算加权平均")]
    ZeroWeight,
    /// 汇总响应无法解析
    #[error("问题汇总响应无法解析: {0}")]
    AggregationParse(String),
    /// 章节无法匹配
    #[error("章节无法匹配: {title}")]
    ResolutionMiss { title: String },
}

/// 任务状态存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读取失败
    #[error("读取任务状态失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入任务状态失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("任务状态序列化失败 ({document_id}): {source}")]
    Serialization {
        document_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 维度配置无效
    #[error("维度配置无效 ({key}): {reason}")]
    InvalidDimension { key: String, reason: String },
    /// 没有配置任何维度
    #[error("维度配置为空")]
    NoDimensions,
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(ParseError::InvalidShape {
            context: "json".to_string(),
            message: err.to_string(),
        })
    }
}

impl From<tokio::sync::AcquireError> for AppError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        AppError::Other(format!("并发许可获取失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl ParseError {
    /// 创建 NoJson 错误，响应只保留前 80 个字符
    pub fn no_json(context: impl Into<String>, raw: &str) -> Self {
        ParseError::NoJson {
            context: context.into(),
            preview: crate::utils::logging::truncate_text(raw, 80),
        }
    }

    /// 创建结构不匹配错误
    pub fn invalid_shape(context: impl Into<String>, message: impl Into<String>) -> Self {
        ParseError::InvalidShape {
            context: context.into(),
            message: message.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_is_chinese_and_nested() {
        let err: AppError = EvaluationError::NoDimensionSucceeded { attempted: 2 }.into();
        assert_eq!(
            err.to_string(),
            "评估错误: 所有 2 个维度均评估失败，无法计算总分"
        );
    }

    #[test]
    fn test_resolution_miss_names_title() {
        let err = EvaluationError::ResolutionMiss {
            title: "第九章 展望".to_string(),
        };
        assert_eq!(err.to_string(), "章节无法匹配: 第九章 展望");
    }

    #[test]
    fn test_no_json_truncates_preview() {
        let raw = "无".repeat(200);
        let err = ParseError::no_json("selection", &raw);
        match err {
            ParseError::NoJson { preview, .. } => {
                assert_eq!(preview.chars().count(), 83);
                assert!(preview.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
