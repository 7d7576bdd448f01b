use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Function tool advertised to the voice agent
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
pub struct SessionSettings {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub instructions: String,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: &'static str,
}

/// First message on the data channel
#[derive(Debug, Serialize)]
pub struct SessionUpdate {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub session: SessionSettings,
}

impl SessionUpdate {
    pub fn new(instructions: impl Into<String>, tools: Vec<ToolDefinition>) -> Self {
        Self {
            kind: "session.update",
            session: SessionSettings {
                kind: "realtime",
                instructions: instructions.into(),
                tools,
                tool_choice: "auto",
            },
        }
    }
}

/// Server events the relay reacts to; everything else is ignored
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallDone {
        call_id: String,
        name: String,
        arguments: String,
    },
    #[serde(other)]
    Other,
}

pub fn function_call_output(call_id: &str, output: &Value) -> Value {
    json!({
        "type": "conversation.item.create",
        "item": {
            "type": "function_call_output",
            "call_id": call_id,
            "output": output.to_string(),
        }
    })
}

pub fn response_create() -> Value {
    json!({ "type": "response.create" })
}
