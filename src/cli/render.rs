use crate::core::message::Message;
use crate::core::segments::build_segments;
use crate::core::transcript::Transcript;
use crate::ui::blocks::{render_message, RenderOptions};

/// Final markup for a complete assistant message.
pub fn render_text(text: &str, options: &RenderOptions) -> String {
    render_message(&Message::assistant(text), options)
}

pub fn segments_json(text: &str) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&build_segments(text))
}

/// Render every message of a saved transcript, one wrapper per message.
pub fn replay_transcript(json: &str, options: &RenderOptions) -> Result<String, serde_json::Error> {
    let transcript = Transcript::from_json(json)?;
    let rendered: Vec<String> = transcript
        .messages()
        .map(|message| {
            format!(
                "<div class=\"message {}\">{}</div>",
                message.role.as_str(),
                render_message(message, options)
            )
        })
        .collect();
    Ok(rendered.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_options() -> RenderOptions {
        RenderOptions {
            syntax: false,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn segments_serialize_as_tagged_blocks() {
        let json = segments_json("✅ did X\nhello").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "segments": [{ "tool_call": "✅ did X" }, { "thinking": ["hello"] }],
                "divider_at": null
            })
        );
    }

    #[test]
    fn replay_renders_each_role() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi <there>"));
        transcript.push(Message::assistant("## 回复：\nhello"));
        let json = transcript.to_json().unwrap();

        let html = replay_transcript(&json, &plain_options()).unwrap();
        assert_eq!(
            html,
            "<div class=\"message user\"><div class=\"user-message\">hi &lt;there&gt;</div></div>\n\
             <div class=\"message assistant\"><hr class=\"response-divider\"><p>hello</p>\n</div>"
        );
    }

    #[test]
    fn replay_rejects_malformed_json() {
        assert!(replay_transcript("{\"entries\": 3}", &plain_options()).is_err());
    }

    #[test]
    fn render_text_matches_final_pipeline() {
        let html = render_text("## 思考过程：\nplan\n---\nanswer", &plain_options());
        assert!(html.contains("<div class=\"thinking-process-content\"><p>plan</p>\n</div>"));
        assert!(html.ends_with("<hr class=\"response-divider\"><p>answer</p>\n"));
    }
}
