use std::any::Any;

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, get_service, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
};

use crate::{
    config::{AllowedOrigins, AppConfig},
    error::{ApiError, EMPTY_ANSWERS, EMPTY_GOAL},
    llm::CompletionClient,
    models::{
        ErrorResponse, FollowUpRequest, GoalRequest, Overview, OverviewRequest, ParaphraseResponse,
        Plan, PlanRequest, QuestionsResponse, SummaryResponse, Timeline, TimelineRequest,
    },
    prompts::{self, SummaryReply},
    telemetry,
};

/**
 * \brief 路由共享状态：只读的上游客户端（内部连接池）。
 */
#[derive(Clone)]
pub struct AppState {
    client: CompletionClient,
}

/**
 * \brief 启动 HTTP 服务，直到监听失败或进程退出。
 */
pub async fn run(config: AppConfig) -> Result<()> {
    telemetry::init(config.telemetry_enabled, config.log_dir.clone());
    let app = build_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("bind {} failed", config.addr))?;
    println!("Server listening on http://{}", config.addr);
    telemetry::log_event(
        "server",
        &format!(
            "listening addr={} model={} timeout_ms={}",
            config.addr, config.upstream.model, config.upstream.timeout_ms
        ),
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 按配置组装路由、跨域策略与可选的静态前端。
 */
pub fn build_app(config: &AppConfig) -> Result<Router> {
    let client =
        CompletionClient::new(config.upstream.clone()).context("build upstream client failed")?;
    let cors = cors_layer(&config.allowed_origins)?;

    let api = Router::new()
        .route("/api/paraphrase", post(paraphrase))
        .route("/api/summarize-goal", post(summarize_goal))
        .route("/api/get-questions", post(get_questions))
        .route(
            "/api/generate-follow-up-questions",
            post(generate_follow_up_questions),
        )
        .route("/api/generate-plan", post(generate_plan))
        .route("/api/generate-overview", post(generate_overview))
        .route("/api/generate-timeline", post(generate_timeline))
        .route("/api/health", get(health))
        .method_not_allowed_fallback(method_not_allowed);

    let app = match &config.ui_dir {
        Some(dir) => {
            api.fallback_service(get_service(
                ServeDir::new(dir).append_index_html_on_directories(true),
            ))
        }
        None => api.fallback(not_found),
    };

    Ok(app
        .with_state(AppState { client })
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors))
}

fn cors_layer(origins: &AllowedOrigins) -> Result<CorsLayer> {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(list) => {
            let values = list
                .iter()
                .map(|o| {
                    HeaderValue::from_str(o).with_context(|| format!("invalid origin {}", o))
                })
                .collect::<Result<Vec<_>>>()?;
            AllowOrigin::list(values)
        }
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]))
}

fn require_goal(raw: &str) -> Result<&str, ApiError> {
    let goal = raw.trim();
    if goal.is_empty() {
        return Err(ApiError::Validation(EMPTY_GOAL));
    }
    Ok(goal)
}

/**
 * \brief 改写接口：POST /api/paraphrase {"goal": "..."}
 */
async fn paraphrase(
    State(state): State<AppState>,
    payload: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<ParaphraseResponse>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    telemetry::log_event("server.paraphrase", &format!("goal_len={}", goal.len()));

    let (messages, options) = prompts::paraphrase(goal);
    let result = state.client.chat_once(&messages, options).await?;
    Ok(Json(ParaphraseResponse { result }))
}

/**
 * \brief 目标摘要：POST /api/summarize-goal
 */
async fn summarize_goal(
    State(state): State<AppState>,
    payload: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    telemetry::log_event("server.summarize", &format!("goal_len={}", goal.len()));

    let (messages, options) = prompts::summarize_goal(goal);
    let reply = state.client.chat_once(&messages, options).await?;
    match prompts::parse_summary(&reply) {
        Some(SummaryReply::Summary(summary)) => Ok(Json(SummaryResponse { summary })),
        Some(SummaryReply::Unclear) => Err(ApiError::UnclearGoal),
        None => Err(ApiError::UnexpectedReply(reply)),
    }
}

/**
 * \brief 澄清问题：POST /api/get-questions
 */
async fn get_questions(
    State(state): State<AppState>,
    payload: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    telemetry::log_event("server.questions", &format!("goal_len={}", goal.len()));

    let (messages, options) = prompts::clarifying_questions(goal);
    let reply = state.client.chat_once(&messages, options).await?;
    let questions = prompts::parse_questions(&reply, prompts::CLARIFYING_QUESTION_COUNT)
        .ok_or(ApiError::UnexpectedReply(reply))?;
    Ok(Json(QuestionsResponse { questions }))
}

/**
 * \brief 追问接口：POST /api/generate-follow-up-questions
 * 模型回复无法解析时退回固定问题。
 */
async fn generate_follow_up_questions(
    State(state): State<AppState>,
    payload: Result<Json<FollowUpRequest>, JsonRejection>,
) -> Result<Json<QuestionsResponse>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    if payload.answers.is_empty() {
        return Err(ApiError::Validation(EMPTY_ANSWERS));
    }
    telemetry::log_event(
        "server.follow_up",
        &format!(
            "phase={:?} goal_len={} answers={}",
            payload.phase,
            goal.len(),
            payload.answers.len()
        ),
    );

    let (messages, options) = prompts::follow_up_questions(goal, &payload.answers, payload.phase);
    let reply = state.client.chat_once(&messages, options).await?;
    let questions = match prompts::parse_questions(&reply, prompts::FOLLOW_UP_QUESTION_COUNT) {
        Some(questions) => questions,
        None => {
            telemetry::log_event(
                "server.follow_up",
                &format!("unparsable reply, using fallback: {}", reply),
            );
            prompts::fallback_follow_up_questions(payload.phase)
        }
    };
    Ok(Json(QuestionsResponse { questions }))
}

/**
 * \brief 完整计划：POST /api/generate-plan {"goal": "...", "context": {...}}
 * 模型回复不符合结构时返回固定计划，并带 fallback: true。
 */
async fn generate_plan(
    State(state): State<AppState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<Plan>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    telemetry::log_event(
        "server.plan",
        &format!("goal_len={} context={}", goal.len(), payload.context.len()),
    );

    let (messages, options) = prompts::generate_plan(goal, &payload.context);
    let reply = state.client.chat_once(&messages, options).await?;
    let plan = match prompts::parse_plan(&reply) {
        Some(plan) => plan,
        None => {
            telemetry::log_event(
                "server.plan",
                &format!("unparsable reply, using fallback: {}", reply),
            );
            prompts::fallback_plan(goal)
        }
    };
    Ok(Json(plan))
}

/**
 * \brief 概览：POST /api/generate-overview {"goal": "...", "answers": {...}}
 */
async fn generate_overview(
    State(state): State<AppState>,
    payload: Result<Json<OverviewRequest>, JsonRejection>,
) -> Result<Json<Overview>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    telemetry::log_event(
        "server.overview",
        &format!("goal_len={} answers={}", goal.len(), payload.answers.len()),
    );

    let (messages, options) = prompts::generate_overview(goal, &payload.answers);
    let reply = state.client.chat_once(&messages, options).await?;
    let overview = prompts::parse_overview(&reply).unwrap_or_else(|| {
        telemetry::log_event(
            "server.overview",
            &format!("unparsable reply, using fallback: {}", reply),
        );
        prompts::fallback_overview()
    });
    Ok(Json(overview))
}

/**
 * \brief 时间线：POST /api/generate-timeline {"goal": "...", "answers": {...}, "overview": {...}}
 */
async fn generate_timeline(
    State(state): State<AppState>,
    payload: Result<Json<TimelineRequest>, JsonRejection>,
) -> Result<Json<Timeline>, ApiError> {
    let Json(payload) = payload?;
    let goal = require_goal(payload.goal())?;
    telemetry::log_event("server.timeline", &format!("goal_len={}", goal.len()));

    let (messages, options) =
        prompts::generate_timeline(goal, &payload.answers, payload.overview.as_ref());
    let reply = state.client.chat_once(&messages, options).await?;
    let timeline = prompts::parse_timeline(&reply).unwrap_or_else(|| {
        telemetry::log_event(
            "server.timeline",
            &format!("unparsable reply, using fallback: {}", reply),
        );
        prompts::fallback_timeline()
    });
    Ok(Json(timeline))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "model": state.client.model()
    }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "route not found".to_string(),
        }),
    )
        .into_response()
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse {
            error: "method not allowed".to_string(),
        }),
    )
        .into_response()
}

/**
 * \brief 处理函数 panic 时返回 JSON 500，而不是断开连接。
 */
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(anyhow!("handler panicked: {}", detail)).into_response()
}
