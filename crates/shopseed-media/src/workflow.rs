use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::errors::{MediaError, Result};
use crate::subject::ImageSubject;

/// Default node holding the text prompt in the bundled workflows.
pub const DEFAULT_PROMPT_NODE: &str = "74";

const USER_WORKFLOW: &str = include_str!("../workflows/user.json");
const PRODUCT_WORKFLOW: &str = include_str!("../workflows/product.json");

/// Image-generation workflow with a prompt slot at
/// `input.workflow.<node>.inputs.string`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    body: Value,
    prompt_node: String,
}

impl WorkflowTemplate {
    pub fn new(body: Value, prompt_node: impl Into<String>) -> Self {
        Self {
            body,
            prompt_node: prompt_node.into(),
        }
    }

    pub fn load(path: &Path, prompt_node: impl Into<String>) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| MediaError::Template(format!("{}: {err}", path.display())))?;
        let body = serde_json::from_str(&text)
            .map_err(|err| MediaError::Template(format!("{}: {err}", path.display())))?;
        Ok(Self::new(body, prompt_node))
    }

    /// Workflow shipped with the crate for `subject`.
    pub fn bundled(subject: ImageSubject) -> Result<Self> {
        let text = match subject {
            ImageSubject::User => USER_WORKFLOW,
            ImageSubject::Product => PRODUCT_WORKFLOW,
        };
        let body = serde_json::from_str(text)
            .map_err(|err| MediaError::Template(format!("bundled {subject} workflow: {err}")))?;
        Ok(Self::new(body, DEFAULT_PROMPT_NODE))
    }

    pub fn prompt_node(&self) -> &str {
        &self.prompt_node
    }

    /// Copy of the template with `prompt` placed in the prompt node.
    ///
    /// A template without the node is returned unchanged.
    pub fn render(&self, prompt: &str) -> Value {
        let mut body = self.body.clone();
        let slot = body
            .pointer_mut(&format!("/input/workflow/{}/inputs", self.prompt_node))
            .and_then(Value::as_object_mut)
            .filter(|inputs| inputs.contains_key("string"));
        match slot {
            Some(inputs) => {
                inputs.insert("string".to_string(), Value::String(prompt.to_string()));
            }
            None => warn!(
                event = "workflow_prompt_node_missing",
                node = %self.prompt_node,
                "sending workflow unchanged"
            ),
        }
        body
    }
}

/// Ask the job to report back to `callback_url` instead of being polled.
pub fn attach_callback(body: &mut Value, callback_url: &str, entity_id: i64) {
    if !body.is_object() {
        *body = Value::Object(Default::default());
    }
    if let Some(root) = body.as_object_mut() {
        let input = root
            .entry("input")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(input) = input.as_object_mut() {
            input.insert("callbackUrl".to_string(), Value::from(callback_url));
            input.insert("entityId".to_string(), Value::from(entity_id));
        }
    }
}
