use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{
    CompletionOptions, FollowUpPhase, Message, Overview, OverviewStep, Plan, PlanPhase, PlanTask,
    Timeline,
};

pub const CLARIFYING_QUESTION_COUNT: usize = 5;
pub const FOLLOW_UP_QUESTION_COUNT: usize = 3;

/**
 * \brief 改写任务：单条 user 消息，不附带采样参数。
 */
pub fn paraphrase(goal: &str) -> (Vec<Message>, CompletionOptions) {
    (
        vec![Message::user(format!("Paraphrase the following: {}", goal))],
        CompletionOptions::default(),
    )
}

/**
 * \brief 目标摘要任务。
 */
pub fn summarize_goal(goal: &str) -> (Vec<Message>, CompletionOptions) {
    let prompt = format!(
        "Restate the goal below in plain, everyday words so that anyone can follow it. \
Keep it short.\n\nGoal: {goal}\n\n\
Reply with JSON only, shaped as {{\"summary\": \"...\"}}.\n\
If the goal is too vague to restate, reply with JSON only: {{\"error\": 400}}"
    );
    (
        vec![
            Message::system(
                "You restate goals in simple language. Reply with valid JSON only, \
exactly in the requested shape.",
            ),
            Message::user(prompt),
        ],
        CompletionOptions {
            temperature: Some(0.2),
            max_tokens: Some(100),
        },
    )
}

// 按目标类型提示该问哪些方面
const DOMAIN_GUIDANCE: &str = "What to ask about, by kind of goal:\n\
CREATIVE PROJECTS: style or look, who it is for (themselves, display, a gift), \
materials or medium, size, how complex it should be.\n\
EVENTS / PLANNING: the occasion, how many people, kind of venue and location, \
budget, theme or atmosphere.\n\
SKILL LEARNING: level they want to reach, what they will use the skill for, \
how they like to learn, time they can commit, experience so far.\n\
BUSINESS / CAREER: industry, role or company, timeline and urgency, how success \
is measured, where they stand today, deal-breakers.\n\
HEALTH / FITNESS: measurable outcomes, medical considerations, how it fits their \
routine, activities they enjoy, current baseline.\n\
FINANCIAL: target amount and date, what the money is for, risk tolerance, \
current situation.";

/**
 * \brief 澄清问题任务：要求恰好 5 个问题。
 */
pub fn clarifying_questions(goal: &str) -> (Vec<Message>, CompletionOptions) {
    let prompt = format!(
        "GOAL: \"{goal}\"\n\n\
Turn this possibly vague goal into a well-defined objective by asking the person \
{count} questions. Together the questions should pin down:\n\
- the exact kind or style of result they want\n\
- must-haves versus nice-to-haves\n\
- the context the result will be used in\n\
- what done and successful look like\n\
- what they already have to start from\n\n\
Rules:\n\
- ask about WHAT they want, not HOW to get there\n\
- one thing per question\n\
- no bracketed lists of examples\n\
- conversational wording\n\n\
{guidance}\n\n\
Reply with a JSON array of exactly {count} strings and nothing else.",
        count = CLARIFYING_QUESTION_COUNT,
        guidance = DOMAIN_GUIDANCE
    );
    (
        vec![
            Message::system(format!(
                "You help people clarify projects. Reply with valid JSON only: an array of \
exactly {} questions.",
                CLARIFYING_QUESTION_COUNT
            )),
            Message::user(prompt),
        ],
        CompletionOptions {
            temperature: Some(0.3),
            max_tokens: Some(500),
        },
    )
}

/**
 * \brief 追问任务：根据既有问答生成 3 个后续问题。
 */
pub fn follow_up_questions(
    goal: &str,
    answers: &BTreeMap<String, String>,
    phase: FollowUpPhase,
) -> (Vec<Message>, CompletionOptions) {
    let transcript = transcript(answers);

    let focus = match phase {
        FollowUpPhase::Secondary => {
            "- dig into specifics the answers mention\n\
- uncover constraints, preferences and the person's situation\n\
- be more targeted than general intake questions"
        }
        FollowUpPhase::Tertiary => {
            "- surface likely obstacles and edge cases\n\
- explore ways to optimise the approach\n\
- help anticipate challenges so the final plan holds up"
        }
    };

    let prompt = format!(
        "Goal: {goal}\n\nAnswers so far:\n{transcript}\n\n\
Write {count} follow-up questions that:\n{focus}\n\n\
Reply with a JSON array of exactly {count} strings and nothing else.",
        count = FOLLOW_UP_QUESTION_COUNT
    );
    (
        vec![
            Message::system(format!(
                "You write targeted follow-up questions. Reply with valid JSON only: an array \
of exactly {} questions.",
                FOLLOW_UP_QUESTION_COUNT
            )),
            Message::user(prompt),
        ],
        CompletionOptions {
            temperature: Some(0.7),
            max_tokens: Some(500),
        },
    )
}

/**
 * \brief 把问答渲染为 "Q: ..\nA: .." 段落，跳过空回答。
 */
fn transcript(answers: &BTreeMap<String, String>) -> String {
    answers
        .iter()
        .filter(|(_, a)| !a.trim().is_empty())
        .map(|(q, a)| format!("Q: {}\nA: {}", q, a))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_context(context: &BTreeMap<String, Value>) -> String {
    context
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null | Value::Bool(false) => return None,
                Value::String(s) if s.trim().is_empty() => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some(format!("{}: {}", key, text))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/**
 * \brief 完整计划任务：3 个阶段，每阶段 4-5 个任务，每任务 3-4 个子任务。
 */
pub fn generate_plan(
    goal: &str,
    context: &BTreeMap<String, Value>,
) -> (Vec<Message>, CompletionOptions) {
    let context = render_context(context);
    let prompt = format!(
        "Goal: {goal}\nAdditional context:\n{context}\n\n\
Build an actionable plan for this goal. Reply with ONLY this JSON object, no markdown \
and no extra text:\n\
{{\n\
  \"summary\": \"one sentence on what the person wants to achieve\",\n\
  \"phases\": [\n\
    {{\n\
      \"title\": \"phase name\",\n\
      \"description\": \"why this phase matters\",\n\
      \"tasks\": [\n\
        {{\"title\": \"task name\", \"description\": \"what to do\", \"subtasks\": [\"step\", \"step\", \"step\"]}}\n\
      ]\n\
    }}\n\
  ],\n\
  \"estimated_timeline\": \"X weeks/months\",\n\
  \"minimum_timeline\": \"Y weeks/months\"\n\
}}\n\n\
Requirements:\n\
- exactly 3 phases\n\
- 4 to 5 tasks per phase\n\
- 3 to 4 concrete subtasks per task\n\
- specific and actionable, never vague\n\
- realistic timelines"
    );
    (
        vec![
            Message::system(
                "You create structured, actionable plans. Reply with valid JSON only, exactly \
in the requested shape, with no markdown or commentary.",
            ),
            Message::user(prompt),
        ],
        CompletionOptions {
            temperature: Some(0.3),
            max_tokens: Some(2000),
        },
    )
}

/**
 * \brief 概览任务：4-6 个高层步骤及其理由。
 */
pub fn generate_overview(
    goal: &str,
    answers: &BTreeMap<String, String>,
) -> (Vec<Message>, CompletionOptions) {
    let transcript = transcript(answers);
    let prompt = format!(
        "Goal: {goal}\n\nWhat the person told us:\n{transcript}\n\n\
List the 4 to 6 main steps needed to reach this goal, in logical order, in plain and \
encouraging language. Each step gets a short title saying what needs doing and a 2-3 \
sentence description of why it matters. Stay high level: the what and the why, not \
the how.\n\n\
Reply with ONLY this JSON:\n\
{{\"steps\": [{{\"title\": \"...\", \"description\": \"...\"}}]}}"
    );
    (
        vec![
            Message::system(
                "You write clear, high-level overviews of what it takes to reach a goal. \
Reply with valid JSON only, exactly in the requested shape.",
            ),
            Message::user(prompt),
        ],
        CompletionOptions {
            temperature: Some(0.4),
            max_tokens: Some(1000),
        },
    )
}

/**
 * \brief 时间线任务：估计建议 / 最短 / 最长周数。
 */
pub fn generate_timeline(
    goal: &str,
    answers: &BTreeMap<String, String>,
    overview: Option<&Overview>,
) -> (Vec<Message>, CompletionOptions) {
    let transcript = transcript(answers);
    let steps = overview
        .map(|o| {
            o.steps
                .iter()
                .enumerate()
                .map(|(i, step)| format!("{}. {}", i + 1, step.title))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();
    let prompt = format!(
        "Goal: {goal}\n\nWhat the person told us:\n{transcript}\n\nPlanned steps:\n{steps}\n\n\
Estimate a realistic timeline, weighing how complex the goal is, the person's time \
and experience, the steps above, and a pace that avoids burnout.\n\n\
Reply with ONLY this JSON:\n\
{{\"suggested_weeks\": 8, \"minimum_weeks\": 4, \"maximum_weeks\": 16, \"reasoning\": \"...\"}}\n\n\
- suggested_weeks: recommended timeline for steady progress\n\
- minimum_weeks: working very intensively (5-7 hours a day)\n\
- maximum_weeks: a relaxed pace (1-2 hours a day)\n\
- reasoning: one or two sentences"
    );
    (
        vec![
            Message::system(
                "You give realistic timeline estimates for goals. Reply with valid JSON only, \
exactly in the requested shape.",
            ),
            Message::user(prompt),
        ],
        CompletionOptions {
            temperature: Some(0.3),
            max_tokens: Some(500),
        },
    )
}

/**
 * \brief 解析不出问题时使用的固定追问。
 */
pub fn fallback_follow_up_questions(phase: FollowUpPhase) -> Vec<String> {
    let items: [&str; FOLLOW_UP_QUESTION_COUNT] = match phase {
        FollowUpPhase::Secondary => [
            "What specific challenges do you expect to run into?",
            "What resources or support can you rely on right now?",
            "How will you tell that you are making progress?",
        ],
        FollowUpPhase::Tertiary => [
            "What would you do if you hit a major setback?",
            "How will you keep yourself motivated when things get hard?",
            "What could make this plan fail, and how could we prevent it?",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

/**
 * \brief 摘要回复的解析结果。
 */
#[derive(Debug, PartialEq, Eq)]
pub enum SummaryReply {
    Summary(String),
    /** \brief 模型认为目标过于模糊 */
    Unclear,
}

/**
 * \brief 解析摘要回复；无法识别时返回 None。
 */
pub fn parse_summary(reply: &str) -> Option<SummaryReply> {
    let cleaned = strip_code_fences(reply);
    let v: Value = serde_json::from_str(outermost(&cleaned, '{', '}')?).ok()?;
    if v.get("error").and_then(|e| e.as_i64()) == Some(400) {
        return Some(SummaryReply::Unclear);
    }
    let summary = v.get("summary")?.as_str()?.trim();
    if summary.is_empty() {
        return None;
    }
    Some(SummaryReply::Summary(summary.to_string()))
}

/**
 * \brief 解析问题数组，要求恰好 expected 个非空字符串。
 */
pub fn parse_questions(reply: &str, expected: usize) -> Option<Vec<String>> {
    let cleaned = strip_code_fences(reply);
    let v: Value = serde_json::from_str(outermost(&cleaned, '[', ']')?).ok()?;
    let arr = v.as_array()?;
    if arr.len() != expected {
        return None;
    }
    arr.iter()
        .map(|item| {
            item.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
        .collect()
}

/**
 * \brief 解析计划回复：至少一个阶段，每个阶段与任务都要有标题、说明。
 */
pub fn parse_plan(reply: &str) -> Option<Plan> {
    let cleaned = strip_code_fences(reply);
    let mut plan: Plan = serde_json::from_str(outermost(&cleaned, '{', '}')?).ok()?;
    if plan.phases.is_empty() {
        return None;
    }
    let complete = plan.phases.iter().all(|phase| {
        !phase.title.trim().is_empty()
            && !phase.description.trim().is_empty()
            && phase
                .tasks
                .iter()
                .all(|task| !task.title.trim().is_empty() && !task.description.trim().is_empty())
    });
    if !complete {
        return None;
    }
    plan.fallback = false;
    Some(plan)
}

/**
 * \brief 解析概览回复：至少一个步骤，标题与说明均非空。
 */
pub fn parse_overview(reply: &str) -> Option<Overview> {
    let cleaned = strip_code_fences(reply);
    let overview: Overview = serde_json::from_str(outermost(&cleaned, '{', '}')?).ok()?;
    if overview.steps.is_empty()
        || overview
            .steps
            .iter()
            .any(|step| step.title.trim().is_empty() || step.description.trim().is_empty())
    {
        return None;
    }
    Some(overview)
}

/**
 * \brief 解析时间线回复并修正区间，保证 minimum <= suggested <= maximum。
 */
pub fn parse_timeline(reply: &str) -> Option<Timeline> {
    let cleaned = strip_code_fences(reply);
    let mut timeline: Timeline = serde_json::from_str(outermost(&cleaned, '{', '}')?).ok()?;
    if timeline.reasoning.trim().is_empty() || timeline.suggested_weeks == 0 {
        return None;
    }
    if timeline.minimum_weeks > timeline.suggested_weeks {
        timeline.minimum_weeks = timeline.suggested_weeks.saturating_sub(2).max(1);
    }
    if timeline.maximum_weeks < timeline.suggested_weeks {
        timeline.maximum_weeks = timeline.suggested_weeks.saturating_mul(2);
    }
    Some(timeline)
}

fn task(title: &str, description: &str, subtasks: [&str; 4]) -> PlanTask {
    PlanTask {
        title: title.to_string(),
        description: description.to_string(),
        subtasks: subtasks.iter().map(|s| s.to_string()).collect(),
    }
}

/**
 * \brief 模型回复不可用时的通用三阶段计划，fallback 置为 true。
 */
pub fn fallback_plan(goal: &str) -> Plan {
    Plan {
        summary: format!("An actionable plan for: {}", goal),
        phases: vec![
            PlanPhase {
                title: "Plan and prepare".to_string(),
                description: "Lay the groundwork before starting.".to_string(),
                tasks: vec![
                    task(
                        "Set clear objectives",
                        "Decide exactly what a finished result looks like.",
                        [
                            "Write the goal down in one sentence",
                            "Split it into measurable milestones",
                            "Pick a realistic deadline",
                            "Choose how progress will be tracked",
                        ],
                    ),
                    task(
                        "Collect what you need",
                        "Line up the tools, knowledge and support required.",
                        [
                            "List the resources required",
                            "Look for guides or mentors",
                            "Set a budget if one is needed",
                            "Get your workspace ready",
                        ],
                    ),
                ],
            },
            PlanPhase {
                title: "Get started".to_string(),
                description: "Build momentum with the first concrete steps.".to_string(),
                tasks: vec![task(
                    "Go for quick wins",
                    "Begin with small tasks that are easy to finish.",
                    [
                        "Do the first small step today",
                        "Mark each completed task",
                        "Notice what works",
                        "Adjust the approach as needed",
                    ],
                )],
            },
            PlanPhase {
                title: "Keep going".to_string(),
                description: "Turn early progress into lasting habits.".to_string(),
                tasks: vec![task(
                    "Build a routine",
                    "Make regular practice part of the week.",
                    [
                        "Block out time on a fixed schedule",
                        "Set reminders",
                        "Review progress every week",
                        "Celebrate milestones",
                    ],
                )],
            },
        ],
        estimated_timeline: "4-8 weeks".to_string(),
        minimum_timeline: "2-3 weeks".to_string(),
        fallback: true,
    }
}

/**
 * \brief 模型回复不可用时的四步概览。
 */
pub fn fallback_overview() -> Overview {
    let steps = [
        (
            "Plan and prepare",
            "Work out what success looks like and what you need to get there. A clear starting \
point makes every later step easier.",
        ),
        (
            "Build the basics",
            "Learn the core knowledge and skills the goal depends on. Solid foundations keep \
progress steady later on.",
        ),
        (
            "Act consistently",
            "Put regular time into the work and keep moving forward. Small, steady effort adds \
up to real results.",
        ),
        (
            "Review and adjust",
            "Check your progress now and then and change course where needed. Staying flexible \
keeps you on track when things shift.",
        ),
    ];
    Overview {
        steps: steps
            .iter()
            .map(|(title, description)| OverviewStep {
                title: title.to_string(),
                description: description.to_string(),
            })
            .collect(),
    }
}

/**
 * \brief 模型回复不可用时的默认周数。
 */
pub fn fallback_timeline() -> Timeline {
    Timeline {
        suggested_weeks: 8,
        minimum_weeks: 4,
        maximum_weeks: 16,
        reasoning: "A typical goal of this size fits this range, leaving room for steady \
progress at a pace you can keep up."
            .to_string(),
    }
}

fn strip_code_fences(reply: &str) -> String {
    reply
        .trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
