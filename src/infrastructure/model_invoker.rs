//! 模型调用器 - 基础设施层
//!
//! 只暴露"给定提示词和模型，返回文本"的能力；不重试、不限流，
//! 重试与并发控制由调用方（workflow / orchestrator）负责。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;

/// 模型调用接口
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// 发送提示词，返回模型输出文本
    async fn invoke(&self, prompt: &str, model_id: &str) -> Result<String, LlmError>;
}

const SYSTEM_MESSAGE: &str = "你是一位严谨的学位论文评审专家。请严格依据提供的论文内容作答，\
                              不要编造原文中不存在的信息。需要 JSON 时只输出 JSON。";

/// 基于 OpenAI 兼容接口的模型调用器
pub struct OpenAiInvoker {
    client: Client<OpenAIConfig>,
    max_tokens: u32,
}

impl OpenAiInvoker {
    /// 创建新的调用器
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            max_tokens: config.llm_max_tokens,
        }
    }

    fn build_messages(
        &self,
        prompt: &str,
        model_id: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let build_failed = |e: async_openai::error::OpenAIError| LlmError::RequestBuildFailed {
            model: model_id.to_string(),
            message: e.to_string(),
        };

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_MESSAGE)
            .build()
            .map_err(build_failed)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(build_failed)?;

        Ok(vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ])
    }
}

#[async_trait]
impl ModelInvoker for OpenAiInvoker {
    async fn invoke(&self, prompt: &str, model_id: &str) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", model_id);
        debug!("提示词长度: {} 字符", prompt.chars().count());

        let messages = self.build_messages(prompt, model_id)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model_id)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(|e| LlmError::RequestBuildFailed {
                model: model_id.to_string(),
                message: e.to_string(),
            })?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: model_id.to_string(),
                source: Box::new(e),
            }
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: model_id.to_string(),
            })?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试真实 LLM 调用
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_invoke_real_api -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_invoke_real_api() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env();
        let invoker = OpenAiInvoker::new(&config);

        let result = invoker
            .invoke("请只回复 JSON：{\"ok\": true}", &config.llm_model_name)
            .await;

        match result {
            Ok(response) => {
                println!("LLM 响应: {}", response);
                assert!(!response.is_empty());
            }
            Err(e) => panic!("LLM 调用失败: {}", e),
        }
    }

    #[test]
    fn test_build_messages_has_system_and_user() {
        let invoker = OpenAiInvoker::new(&Config::default());
        let messages = invoker.build_messages("评估第一章", "gpt-4o").unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }
}
