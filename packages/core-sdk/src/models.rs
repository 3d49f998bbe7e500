use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/**
 * \brief 上游补全服务配置。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /** \brief 补全接口完整地址 */
    pub url: String,
    /** \brief Bearer 凭据 */
    pub api_key: String,
    /** \brief 模型名 */
    pub model: String,
    /** \brief 单次请求超时（毫秒） */
    pub timeout_ms: u64,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/**
 * \brief 单次补全调用的采样参数；为空时不写入请求体。
 */
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/**
 * \brief 携带 goal 字段的请求体；缺失或 null 时视为空串。
 */
#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    #[serde(default)]
    pub goal: Option<String>,
}

impl GoalRequest {
    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or("")
    }
}

/**
 * \brief 追问阶段。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpPhase {
    Secondary,
    Tertiary,
}

#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    #[serde(default)]
    pub goal: Option<String>,
    /** \brief 问题 -> 回答 */
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    pub phase: FollowUpPhase,
}

impl FollowUpRequest {
    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Serialize)]
pub struct ParaphraseResponse {
    pub result: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/**
 * \brief 完整计划请求；context 为附加信息键值，值可为任意 JSON。
 */
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl PlanRequest {
    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub title: String,
    pub description: String,
    pub subtasks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub title: String,
    pub description: String,
    pub tasks: Vec<PlanTask>,
}

/**
 * \brief 分阶段计划；fallback 为 true 表示模型回复不可用，返回的是固定模板。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub summary: String,
    pub phases: Vec<PlanPhase>,
    #[serde(default)]
    pub estimated_timeline: String,
    #[serde(default)]
    pub minimum_timeline: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

/**
 * \brief 概览请求：目标 + 既有问答。
 */
#[derive(Debug, Deserialize)]
pub struct OverviewRequest {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

impl OverviewRequest {
    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewStep {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub steps: Vec<OverviewStep>,
}

/**
 * \brief 时间线请求：overview 为上一步生成的概览，可缺省。
 */
#[derive(Debug, Deserialize)]
pub struct TimelineRequest {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    #[serde(default)]
    pub overview: Option<Overview>,
}

impl TimelineRequest {
    pub fn goal(&self) -> &str {
        self.goal.as_deref().unwrap_or("")
    }
}

/**
 * \brief 周数估计，满足 minimum <= suggested <= maximum。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub suggested_weeks: u32,
    pub minimum_weeks: u32,
    pub maximum_weeks: u32,
    pub reasoning: String,
}
