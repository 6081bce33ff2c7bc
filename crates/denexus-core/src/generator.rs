//! Grounded answer generation: context + query → prompt → completion.

use std::sync::Arc;

use crate::completion::{ChatMessage, CompletionClient, CompletionError};

pub const DEFAULT_INSTRUCTIONS: &str = "You are an assistant designed to answer questions related to cybersecurity. \
Please, only answer the question with the context provided. If the context \
does not provide the answer to the user question, just say 'I don't know'.";

pub struct Generator {
    client: Arc<dyn CompletionClient>,
    model: String,
    instructions: String,
}

impl Generator {
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }

    /// Replace the grounding instructions placed at the top of the system turn.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The two turns sent for `query`: system (instructions + context) and user (query verbatim).
    pub fn build_messages(&self, query: &str, context: &[String]) -> Vec<ChatMessage> {
        // A JSON array keeps passage boundaries unambiguous.
        let context_list = serde_json::to_string(context).unwrap_or_else(|_| "[]".to_string());
        vec![
            ChatMessage::system(format!(
                "{}\n\nContext:\n{}",
                self.instructions, context_list
            )),
            ChatMessage::user(query),
        ]
    }

    /// The model's answer to `query` given `context`. The first choice is returned unmodified.
    pub async fn answer(&self, query: &str, context: &[String]) -> Result<String, CompletionError> {
        let messages = self.build_messages(query, context);
        tracing::debug!(
            model = %self.model,
            passages = context.len(),
            "requesting completion"
        );
        let choices = self.client.complete(&self.model, &messages).await?;
        choices.into_iter().next().ok_or(CompletionError::NoChoices)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::completion::Role;

    struct Scripted {
        reply: Result<Vec<String>, fn() -> CompletionError>,
        seen: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    }

    impl Scripted {
        fn replying(choices: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(choices.iter().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(err: fn() -> CompletionError) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(err),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for Scripted {
        async fn complete(
            &self,
            model: &str,
            messages: &[ChatMessage],
        ) -> Result<Vec<String>, CompletionError> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            match &self.reply {
                Ok(choices) => Ok(choices.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    #[test]
    fn prompt_has_two_turns() {
        let g = Generator::new(Scripted::replying(&[]), "m");
        let msgs = g.build_messages("What happened?", &["a \"quoted\" passage".to_string()]);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert!(msgs[0].content.starts_with(DEFAULT_INSTRUCTIONS));
        assert!(msgs[0]
            .content
            .ends_with("Context:\n[\"a \\\"quoted\\\" passage\"]"));
        assert_eq!(msgs[1], ChatMessage::user("What happened?"));
    }

    #[tokio::test]
    async fn returns_first_choice_verbatim() {
        let client = Scripted::replying(&["  first answer \n", "second"]);
        let g = Generator::new(client.clone(), "llama-test");
        let out = g.answer("q", &[]).await.unwrap();
        assert_eq!(out, "  first answer \n");
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "llama-test");
    }

    #[tokio::test]
    async fn no_choices_is_an_error() {
        let g = Generator::new(Scripted::replying(&[]), "m");
        assert!(matches!(
            g.answer("q", &[]).await,
            Err(CompletionError::NoChoices)
        ));
    }

    #[tokio::test]
    async fn service_errors_propagate() {
        let g = Generator::new(Scripted::failing(|| CompletionError::Timeout), "m");
        assert!(matches!(
            g.answer("q", &[]).await,
            Err(CompletionError::Timeout)
        ));
    }

    #[test]
    fn custom_instructions() {
        let g = Generator::new(Scripted::replying(&[]), "m").with_instructions("Be terse.");
        let msgs = g.build_messages("q", &[]);
        assert_eq!(msgs[0].content, "Be terse.\n\nContext:\n[]");
    }
}
