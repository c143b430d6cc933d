/// 程序配置
///
/// 启动时构建一次，之后以 `&Config` 传给各层构造函数，由构造函数取出所需字段，不存在全局可变状态。
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的文档数量
    pub max_concurrent_documents: usize,
    /// 维度评估并发上限
    pub dimension_workers: usize,
    /// 分章节问题扫描并发上限
    pub section_workers: usize,
    /// 转换后文档所在目录（每个子目录一个文档）
    pub input_folder: String,
    /// 任务状态存储目录
    pub job_store_dir: String,
    /// 维度配置文件
    pub dimensions_file: String,
    /// 额外排除的一级标题关键字
    pub excluded_headings: Vec<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    /// 章节选择与内容评估使用的模型
    pub llm_model_name: String,
    /// 分章节问题扫描使用的模型（调用量大，一般用更快的模型）
    pub llm_scan_model_name: String,
    /// 幻觉核查使用的模型
    pub llm_verify_model_name: String,
    pub llm_max_tokens: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_documents: 2,
            dimension_workers: 4,
            section_workers: 16,
            input_folder: "converted".to_string(),
            job_store_dir: "job_store".to_string(),
            dimensions_file: "config/dimensions.toml".to_string(),
            excluded_headings: Vec::new(),
            verbose_logging: false,
            output_log_file: "evaluation.log".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_scan_model_name: "gpt-4o-mini".to_string(),
            llm_verify_model_name: "gpt-4o".to_string(),
            llm_max_tokens: 4096,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_documents: std::env::var("MAX_CONCURRENT_DOCUMENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_documents),
            dimension_workers: std::env::var("DIMENSION_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.dimension_workers),
            section_workers: std::env::var("SECTION_WORKERS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.section_workers),
            input_folder: std::env::var("INPUT_FOLDER").unwrap_or(default.input_folder),
            job_store_dir: std::env::var("JOB_STORE_DIR").unwrap_or(default.job_store_dir),
            dimensions_file: std::env::var("DIMENSIONS_FILE").unwrap_or(default.dimensions_file),
            excluded_headings: std::env::var("EXCLUDED_HEADINGS").map(|v| split_list(&v)).unwrap_or(default.excluded_headings),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_scan_model_name: std::env::var("LLM_SCAN_MODEL_NAME").unwrap_or(default.llm_scan_model_name),
            llm_verify_model_name: std::env::var("LLM_VERIFY_MODEL_NAME").unwrap_or(default.llm_verify_model_name),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_tokens),
        }
    }
}

/// 逗号分隔（兼容中文逗号）的列表
fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_ceilings() {
        let config = Config::default();
        assert_eq!(config.dimension_workers, 4);
        assert_eq!(config.section_workers, 16);
    }

    #[test]
    fn test_split_list_accepts_both_commas() {
        assert_eq!(
            split_list("附录, 作者简介，攻读学位期间发表的论文,"),
            vec!["附录", "作者简介", "攻读学位期间发表的论文"]
        );
    }
}
