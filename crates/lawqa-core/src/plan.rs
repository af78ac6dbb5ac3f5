//! Plans and tasks produced by the planner and filled in by the execution loop.

use serde::{Deserialize, Serialize};

/// One unit of synthesised work.
///
/// Terminal once `result` is set (success) or the execution loop gives up
/// (`result` stays `None`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub instruction: String,
    #[serde(default)]
    pub dependent_task_ids: Vec<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instruction: instruction.into(),
            ..Default::default()
        }
    }

    pub fn is_done(&self) -> bool {
        self.result.is_some()
    }
}

/// A single planner step as returned by the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: serde_json::Value,
    pub description: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub output: Option<String>,
}

/// Planner response: `{plan, steps[]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
    pub plan: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl PlanDraft {
    /// Render the steps as the instruction the code synthesiser works from.
    pub fn render_steps(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            let id = match &step.id {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!("步骤{id}:\n{}\n", step.description));
            if let Some(tool) = &step.tool {
                out.push_str(&format!("工具: {tool}\n"));
            }
            if !step.params.is_null() {
                out.push_str(&format!("参数: {}\n", step.params));
            }
            if let Some(output) = &step.output {
                out.push_str(&format!("输出: {output}\n"));
            }
            out.push('\n');
        }
        if out.is_empty() {
            out = self.plan.clone();
        }
        out.trim_end().to_string()
    }

    /// The whole draft becomes one task: generated code covers every step and
    /// prints each step's output.
    pub fn into_plan(self, question: impl Into<String>) -> Plan {
        let instruction = self.render_steps();
        Plan {
            question: question.into(),
            overview: self.plan,
            tasks: vec![Task::new("1", instruction)],
        }
    }
}

/// Ordered list of tasks for one question. The task list never changes shape;
/// only task fields are filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub question: String,
    pub overview: String,
    pub tasks: Vec<Task>,
}

impl Plan {
    /// Results of the tasks `task` depends on, in dependency order.
    pub fn dependency_results(&self, task: &Task) -> Vec<(&str, &str)> {
        task.dependent_task_ids
            .iter()
            .filter_map(|id| self.tasks.iter().find(|t| &t.id == id))
            .filter_map(|t| t.result.as_deref().map(|r| (t.id.as_str(), r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PlanDraft {
        serde_json::from_str(
            r#"{
                "plan": "查询公司注册地址所在城市",
                "steps": [
                    {"id": 1, "description": "使用 get_company_info 获取注册地址", "tool": "get_company_info", "params": {"value": "航天机电"}, "output": "注册地址"},
                    {"id": "2", "description": "使用 get_address_info 查询城市"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn draft_renders_all_steps() {
        let rendered = draft().render_steps();
        assert!(rendered.starts_with("步骤1:\n使用 get_company_info"));
        assert!(rendered.contains("工具: get_company_info"));
        assert!(rendered.contains("步骤2:\n使用 get_address_info"));
        assert!(!rendered.ends_with('\n'));
    }

    #[test]
    fn draft_without_steps_uses_overview() {
        let d = PlanDraft {
            plan: "直接回答".into(),
            steps: vec![],
        };
        assert_eq!(d.render_steps(), "直接回答");
    }

    #[test]
    fn into_plan_makes_single_task() {
        let plan = draft().into_plan("航天机电在哪个城市？");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].id, "1");
        assert!(!plan.tasks[0].is_done());
        assert!(plan.tasks[0].dependent_task_ids.is_empty());
    }

    #[test]
    fn dependency_results_skip_unfinished() {
        let mut plan = Plan::default();
        let mut a = Task::new("a", "first");
        a.result = Some("ok".into());
        let b = Task::new("b", "second");
        let mut c = Task::new("c", "third");
        c.dependent_task_ids = vec!["a".into(), "b".into(), "missing".into()];
        plan.tasks = vec![a, b, c.clone()];
        assert_eq!(plan.dependency_results(&c), vec![("a", "ok")]);
    }
}
