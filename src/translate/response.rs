use super::types::{
    ChatCompletion, CompletionChoice, CompletionMessage, UpstreamChoice,
    UpstreamErrorResponse, UpstreamMessage, UpstreamResponse,
};
use chrono::Utc;

/// Separator between reasoning and answer in merged content.
pub const REASONING_SEPARATOR: &str = "\n\n";

/// Translate an upstream completion into the client-facing envelope.
/// `original_model` is the model name the client asked for.
pub fn to_completion(resp: &UpstreamResponse, original_model: &str) -> ChatCompletion {
    ChatCompletion {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion".to_string(),
        created: Utc::now().timestamp(),
        model: original_model.to_string(),
        choices: resp.choices.iter().map(translate_choice).collect(),
        usage: resp.usage.unwrap_or_default(),
    }
}

fn translate_choice(choice: &UpstreamChoice) -> CompletionChoice {
    CompletionChoice {
        index: choice.index,
        message: CompletionMessage {
            role: choice.message.role.clone(),
            content: merge_reasoning(&choice.message),
        },
        finish_reason: choice.finish_reason.clone(),
    }
}

/// Fold `reasoning_content` in front of `content`.
pub fn merge_reasoning(message: &UpstreamMessage) -> String {
    let content = message.content.as_deref().unwrap_or_default();
    match message.reasoning_content.as_deref() {
        Some(reasoning) => format!("{reasoning}{REASONING_SEPARATOR}{content}"),
        None => content.to_string(),
    }
}

/// Extract `error.message` from an upstream error body, if it has one.
pub fn upstream_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<UpstreamErrorResponse>(body)
        .ok()
        .and_then(|e| e.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::types::Usage;

    fn message(content: Option<&str>, reasoning: Option<&str>) -> UpstreamMessage {
        UpstreamMessage {
            role: "assistant".to_string(),
            content: content.map(str::to_string),
            reasoning_content: reasoning.map(str::to_string),
        }
    }

    fn response(choices: Vec<UpstreamMessage>, usage: Option<Usage>) -> UpstreamResponse {
        UpstreamResponse {
            choices: choices
                .into_iter()
                .enumerate()
                .map(|(i, message)| UpstreamChoice {
                    index: i as u64,
                    message,
                    finish_reason: Some("stop".to_string()),
                })
                .collect(),
            usage,
        }
    }

    #[test]
    fn test_reasoning_is_prepended() {
        let merged = merge_reasoning(&message(Some("answer"), Some("think")));
        assert_eq!(merged, "think\n\nanswer");
    }

    #[test]
    fn test_content_unchanged_without_reasoning() {
        assert_eq!(merge_reasoning(&message(Some("answer"), None)), "answer");
        assert_eq!(merge_reasoning(&message(None, None)), "");
    }

    #[test]
    fn test_envelope_uses_original_model() {
        let usage = Usage {
            prompt_tokens: 3,
            completion_tokens: 5,
            total_tokens: 8,
        };
        let resp = response(vec![message(Some("hello"), Some("hmm"))], Some(usage));

        let out = to_completion(&resp, "gpt-4o");
        assert_eq!(out.model, "gpt-4o");
        assert_eq!(out.object, "chat.completion");
        assert!(out.id.starts_with("chatcmpl-"));
        assert_eq!(out.usage, usage);
        assert_eq!(out.choices[0].message.content, "hmm\n\nhello");
        assert_eq!(out.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_every_choice_translated_in_order() {
        let resp = response(
            vec![message(Some("a"), None), message(Some("b"), Some("r"))],
            None,
        );

        let out = to_completion(&resp, "x");
        assert_eq!(out.choices.len(), 2);
        assert_eq!(out.choices[1].index, 1);
        assert_eq!(out.choices[1].message.content, "r\n\nb");
        assert_eq!(out.usage, Usage::default());
    }

    #[test]
    fn test_reasoning_field_not_exposed() {
        let resp = response(vec![message(Some("a"), Some("r"))], None);
        let json = serde_json::to_value(to_completion(&resp, "x")).unwrap();
        assert!(json["choices"][0]["message"].get("reasoning_content").is_none());
        assert_eq!(json["usage"]["total_tokens"], 0);
    }

    #[test]
    fn test_upstream_error_message_extracted() {
        let body = r#"{"error":{"message":"rate limited","type":"requests","code":"429"}}"#;
        assert_eq!(upstream_error_message(body).as_deref(), Some("rate limited"));
    }

    #[test]
    fn test_upstream_error_message_absent() {
        assert_eq!(upstream_error_message("<html>bad gateway</html>"), None);
        assert_eq!(upstream_error_message(r#"{"error":{}}"#), None);
        assert_eq!(upstream_error_message(r#"{"detail":"nope"}"#), None);
    }
}
