// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// 发送给模型的最大字符数
const MAX_INPUT_CHARS: usize = 10_000;

/// 文本分析协作者
///
/// 接收抽取到的正文，返回可读性、情感、关键词、主题与洞察。
/// 它是可选的增强步骤，失败不能影响抓取结果。
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Value>;
}

/// 基于 OpenAI 兼容接口的文本分析器
///
/// # 配置
///
/// - `api_key` - API密钥
/// - `model` - 模型名称
/// - `api_base_url` - API基础URL，请求发往 `{api_base_url}/chat/completions`
pub struct LlmTextAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base_url: String,
}

impl LlmTextAnalyzer {
    pub fn new(
        api_key: String,
        model: String,
        api_base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build analysis HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn prompt(text: &str) -> String {
        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        format!(
            "Analyze the following article text. Return ONLY a JSON object with the keys \
            \"readability\" (object with \"score\" 0-100 and \"level\"), \
            \"sentiment\" (object with \"label\" and \"score\" between -1 and 1), \
            \"keywords\" (array of strings), \"topics\" (array of strings) and \
            \"insights\" (array of short strings). No markdown formatting. Text: {}",
            truncated
        )
    }
}

#[async_trait]
impl TextAnalyzer for LlmTextAnalyzer {
    /// 调用模型分析文本
    ///
    /// # 错误
    ///
    /// * 接口返回非成功状态
    /// * 返回内容不是合法JSON
    async fn analyze(&self, text: &str) -> Result<Value> {
        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a content analysis assistant. You output only valid JSON."
                },
                {
                    "role": "user",
                    "content": Self::prompt(text)
                }
            ],
            "temperature": 0.0
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to analysis API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Analysis API returned error: {} - {}",
                status,
                error_text
            ));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse analysis API response")?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid response format from analysis API"))?;

        let clean_content = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```");

        serde_json::from_str::<Value>(clean_content).context("Failed to parse analysis JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_truncates_on_char_boundary() {
        let text = "日".repeat(MAX_INPUT_CHARS + 50);
        let prompt = LlmTextAnalyzer::prompt(&text);
        assert_eq!(prompt.matches('日').count(), MAX_INPUT_CHARS);
    }
}
