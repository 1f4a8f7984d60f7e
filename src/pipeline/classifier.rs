//! Email classifier: inference with a keyword fallback.
//!
//! Flow per request:
//! 1. Clean the text and extract signal tokens
//! 2. Compute the keyword heuristic (kept as the fallback answer)
//! 3. One inference call, bounded by a hard timeout
//! 4. Decode the reply tolerantly; any failure in 3 or 4 yields the heuristic
//!
//! The only error returned to callers is empty content after cleaning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{InputError, LlmError};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::lexicon::Lexicon;
use crate::pipeline::normalizer::{clean_text, extract_signals_with};
use crate::pipeline::rules::HeuristicRules;
use crate::pipeline::types::{
    Category, ClassificationResult, FallbackReason, Judgement, Verdict,
};

/// Temperature for classification (near-deterministic).
const CLASSIFY_TEMPERATURE: f32 = 0.2;

/// Hard deadline for the inference round trip.
const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Max tokens for the classification reply.
const CLASSIFY_MAX_TOKENS: u32 = 512;

/// Characters of cleaned text and of signals embedded in the prompt.
const PROMPT_CHAR_LIMIT: usize = 6000;

/// Confidence used when the model omits it.
const DEFAULT_CONFIDENCE: f64 = 0.6;

/// Tuning knobs for the inference call.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub temperature: f32,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub prompt_char_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            temperature: CLASSIFY_TEMPERATURE,
            timeout: CLASSIFY_TIMEOUT,
            max_tokens: CLASSIFY_MAX_TOKENS,
            prompt_char_limit: PROMPT_CHAR_LIMIT,
        }
    }
}

/// Classifies one email per call. Holds no per-request state, so a single
/// instance is shared by all concurrent requests.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    lexicon: Lexicon,
    rules: HeuristicRules,
    config: ClassifierConfig,
}

impl Classifier {
    /// Create a classifier with the built-in word tables.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self::with_lexicon(llm, Lexicon::default(), ClassifierConfig::default())
    }

    pub fn with_lexicon(
        llm: Arc<dyn LlmProvider>,
        lexicon: Lexicon,
        config: ClassifierConfig,
    ) -> Self {
        let rules = HeuristicRules::from_lexicon(&lexicon);
        Self {
            llm,
            lexicon,
            rules,
            config,
        }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Classify raw email text. `filename` is echoed into the metadata.
    pub async fn classify(
        &self,
        raw: &str,
        filename: Option<String>,
    ) -> Result<ClassificationResult, InputError> {
        let started = Instant::now();

        let cleaned = clean_text(raw)?;
        let signals = extract_signals_with(&cleaned, &self.lexicon);
        let likely_productive = self.rules.is_likely_productive(&signals);
        debug!(
            text_chars = cleaned.chars().count(),
            signal_chars = signals.chars().count(),
            likely_productive,
            "Text normalized"
        );

        let verdict = self.infer(&cleaned, &signals, likely_productive).await;

        let result = ClassificationResult::new(
            verdict,
            started.elapsed(),
            cleaned.chars().count(),
            signals.chars().count(),
            filename,
        );

        info!(
            category = %result.category,
            confidence = result.confidence,
            source = result.metadata.source.label(),
            processing_time = result.processing_time,
            "Email classified"
        );
        Ok(result)
    }

    /// Single inference attempt, falling back to the heuristic on any failure.
    pub async fn infer(&self, cleaned: &str, signals: &str, likely_productive: bool) -> Verdict {
        let request = self.build_request(cleaned, signals);

        let reply = match self.call_llm(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Inference unavailable, using heuristic");
                return Verdict::Heuristic {
                    judgement: self.rules.judgement(likely_productive),
                    reason: FallbackReason::Unavailable(e.to_string()),
                };
            }
        };

        match decode_judgement(&reply) {
            Ok(judgement) => Verdict::Inference(judgement),
            Err(e) => {
                warn!(
                    raw_response = %reply.chars().take(200).collect::<String>(),
                    error = %e,
                    "Failed to decode inference reply, using heuristic"
                );
                Verdict::Heuristic {
                    judgement: self.rules.judgement(likely_productive),
                    reason: FallbackReason::Undecodable(e),
                }
            }
        }
    }

    fn build_request(&self, cleaned: &str, signals: &str) -> CompletionRequest {
        let limit = self.config.prompt_char_limit;
        CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(cleaned, signals, limit)),
        ])
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .with_json_output()
        .with_timeout(self.config.timeout)
    }

    /// The provider enforces the timeout too; this bounds providers that don't.
    async fn call_llm(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let timeout = self.config.timeout;
        match tokio::time::timeout(timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout,
            }),
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt() -> String {
    "Você é um assistente de triagem de e-mails corporativos do setor financeiro.\n\
     Classifique cada e-mail como \"Produtivo\" (exige ação ou resposta) ou \
     \"Improdutivo\" (não exige).\n\n\
     Responda SOMENTE com um objeto JSON estrito:\n\
     {\"category\": \"Produtivo\" | \"Improdutivo\", \"confidence\": 0.0-1.0, \
     \"suggested_response\": \"resposta curta e educada em pt-BR\"}\n\n\
     A resposta sugerida deve ser útil e prática. Sem código e sem Markdown."
        .to_string()
}

fn build_user_prompt(cleaned: &str, signals: &str, limit: usize) -> String {
    let original: String = cleaned.chars().take(limit).collect();
    let signals: String = signals.chars().take(limit).collect();

    let mut prompt = String::with_capacity(original.len() + signals.len() + 512);
    prompt.push_str("E-MAIL ORIGINAL:\n\n");
    prompt.push_str(&original);
    prompt.push_str("\n\nINDÍCIOS PRÉ-PROCESSADOS (contexto para o classificador):\n\n");
    prompt.push_str(&signals);
    prompt.push_str(
        "\n\nRegras:\n\
         - Pedido de status de chamado, suporte ou ação -> Produtivo.\n\
         - Apenas felicitação, agradecimento ou corrente -> Improdutivo.\n\
         - confidence: número de 0 a 1, nunca string.\n\
         - suggested_response: em pt-BR, tom profissional e objetivo.\n",
    );
    prompt
}

// ── Reply decoding ──────────────────────────────────────────────────

/// Raw reply shape. `null` and missing fields both deserialize to `None`.
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_confidence")]
    confidence: Option<f64>,
    #[serde(default)]
    suggested_response: Option<String>,
}

/// Models sometimes quote the number.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn lenient_confidence<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => Ok(Some(n)),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("confidence is not numeric: '{s}'"))),
    }
}

/// Decode the model reply into a fully populated judgement.
///
/// Missing fields get defaults (category Unproductive, confidence 0.6, empty
/// reply) and confidence is clamped to `[0, 1]`. Wrongly typed fields,
/// unknown labels and non-JSON replies are errors.
pub fn decode_judgement(raw: &str) -> Result<Judgement, String> {
    let json_str = extract_json_object(raw);
    let value: Value =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    // Derived structs also accept arrays positionally.
    if !value.is_object() {
        return Err("reply is not a JSON object".to_string());
    }
    let response: ClassifyResponse =
        serde_json::from_value(value).map_err(|e| format!("unexpected reply shape: {e}"))?;

    let category = match response.category {
        None => Category::Unproductive,
        Some(label) => Category::from_label(&label)
            .ok_or_else(|| format!("unknown category label: '{label}'"))?,
    };

    let confidence = response.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    if !confidence.is_finite() {
        return Err(format!("confidence is not finite: {confidence}"));
    }

    Ok(Judgement {
        category,
        confidence: confidence.clamp(0.0, 1.0),
        suggested_response: response
            .suggested_response
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    })
}

/// Extract a JSON object from model output (handles markdown wrapping and
/// surrounding prose).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let after = &trimmed[start + fence.len()..];
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('{') {
                    return inner.to_string();
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::llm::provider::{CompletionResponse, FinishReason};
    use crate::pipeline::lexicon::{PRODUCTIVE_REPLY, UNPRODUCTIVE_REPLY};
    use crate::pipeline::types::Source;

    // ── Mock providers ──────────────────────────────────────────────

    /// Returns a fixed reply and records the last request.
    struct MockLlm {
        response: String,
        last_request: Mutex<Option<CompletionRequest>>,
    }

    impl MockLlm {
        fn new(response: &str) -> Arc<Self> {
            Arc::new(Self {
                response: response.into(),
                last_request: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        fn model_name(&self) -> &str {
            "mock-classifier"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            *self.last_request.lock().unwrap() = Some(request);
            Ok(CompletionResponse {
                content: self.response.clone(),
                input_tokens: 100,
                output_tokens: 50,
                finish_reason: FinishReason::Stop,
                response_id: None,
            })
        }
    }

    /// Always fails, like an unreachable service.
    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "failing".into(),
                reason: "connection refused".into(),
            })
        }
    }

    /// Never answers within the deadline.
    struct HangingLlm;

    #[async_trait]
    impl LlmProvider for HangingLlm {
        fn model_name(&self) -> &str {
            "hanging"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("timeout should fire first")
        }
    }

    fn failing_classifier() -> Classifier {
        Classifier::new(Arc::new(FailingLlm))
    }

    // ── Decode tests ────────────────────────────────────────────────

    #[test]
    fn decode_full_reply() {
        let raw = r#"{"category": "Produtivo", "confidence": 0.92, "suggested_response": "  Vou verificar.  "}"#;
        let j = decode_judgement(raw).unwrap();
        assert_eq!(j.category, Category::Productive);
        assert!((j.confidence - 0.92).abs() < 1e-9);
        assert_eq!(j.suggested_response, "Vou verificar.");
    }

    #[test]
    fn decode_missing_fields_get_defaults() {
        let j = decode_judgement("{}").unwrap();
        assert_eq!(j.category, Category::Unproductive);
        assert_eq!(j.confidence, 0.6);
        assert_eq!(j.suggested_response, "");
    }

    #[test]
    fn decode_clamps_confidence_high() {
        let j = decode_judgement(r#"{"category": "Productive", "confidence": 1.5}"#).unwrap();
        assert_eq!(j.confidence, 1.0);
    }

    #[test]
    fn decode_clamps_confidence_low() {
        let j = decode_judgement(r#"{"category": "Productive", "confidence": -0.2}"#).unwrap();
        assert_eq!(j.confidence, 0.0);
    }

    #[test]
    fn decode_accepts_numeric_string_confidence() {
        let j = decode_judgement(r#"{"confidence": " 0.75 "}"#).unwrap();
        assert!((j.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn decode_rejects_non_numeric_confidence() {
        assert!(decode_judgement(r#"{"confidence": "high"}"#).is_err());
        assert!(decode_judgement(r#"{"confidence": "NaN"}"#).is_err());
        assert!(decode_judgement(r#"{"confidence": [1]}"#).is_err());
        assert!(decode_judgement(r#"{"confidence": true}"#).is_err());
    }

    #[test]
    fn decode_rejects_unknown_category() {
        assert!(decode_judgement(r#"{"category": "Spam"}"#).is_err());
        assert!(decode_judgement(r#"{"category": 1}"#).is_err());
    }

    #[test]
    fn decode_treats_null_as_missing() {
        let raw = r#"{"category": null, "confidence": null, "suggested_response": null}"#;
        let j = decode_judgement(raw).unwrap();
        assert_eq!(j.category, Category::Unproductive);
        assert_eq!(j.confidence, 0.6);
        assert_eq!(j.suggested_response, "");
    }

    #[test]
    fn decode_rejects_non_string_reply() {
        assert!(decode_judgement(r#"{"suggested_response": 42}"#).is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_judgement("not json at all").is_err());
        assert!(decode_judgement("[1, 2, 3]").is_err());
    }

    #[test]
    fn decode_markdown_wrapped_reply() {
        let raw = "Aqui está:\n```json\n{\"category\": \"Improdutivo\", \"confidence\": 0.8}\n```";
        let j = decode_judgement(raw).unwrap();
        assert_eq!(j.category, Category::Unproductive);
    }

    #[test]
    fn decode_reply_with_surrounding_text() {
        let raw = "Result: {\"category\": \"productive\"} done.";
        assert_eq!(decode_judgement(raw).unwrap().category, Category::Productive);
    }

    #[test]
    fn extract_json_from_plain_fence() {
        let input = "```\n{\"category\": \"x\"}\n```";
        assert_eq!(extract_json_object(input), "{\"category\": \"x\"}");
    }

    // ── Prompt tests ────────────────────────────────────────────────

    #[test]
    fn system_prompt_describes_json_shape() {
        let prompt = build_system_prompt();
        assert!(prompt.contains("category"));
        assert!(prompt.contains("confidence"));
        assert!(prompt.contains("suggested_response"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn user_prompt_truncates_text_and_signals() {
        let long_text = "ж".repeat(7000);
        let long_signals = "ψ".repeat(7000);
        let prompt = build_user_prompt(&long_text, &long_signals, 6000);
        assert_eq!(prompt.matches('ж').count(), 6000);
        assert_eq!(prompt.matches('ψ').count(), 6000);
        assert!(prompt.contains("Regras"));
    }

    // ── Classifier tests ────────────────────────────────────────────

    #[tokio::test]
    async fn request_is_json_mode_low_temperature_with_timeout() {
        let llm = MockLlm::new(r#"{"category": "Produtivo", "confidence": 0.9, "suggested_response": "Ok"}"#);
        let classifier = Classifier::new(llm.clone());

        classifier
            .classify("Qual o status do chamado?", None)
            .await
            .unwrap();

        let request = llm.last_request.lock().unwrap().clone().unwrap();
        assert!(request.json_output);
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[1].content.contains("Qual o status do chamado?"));
        assert!(request.messages[1].content.contains("status chamado"));
    }

    #[tokio::test]
    async fn inference_reply_is_used() {
        let llm = MockLlm::new(r#"{"category": "Produtivo", "confidence": 0.9, "suggested_response": "Vou verificar."}"#);
        let classifier = Classifier::new(llm);

        let result = classifier.classify("Bom dia, tudo bem?", None).await.unwrap();
        assert_eq!(result.category, Category::Productive);
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert_eq!(result.suggested_response, "Vou verificar.");
        assert_eq!(result.metadata.source, Source::Inference);
    }

    #[tokio::test]
    async fn inference_confidence_clamped() {
        let classifier = Classifier::new(MockLlm::new(r#"{"category": "Produtivo", "confidence": 1.5}"#));
        let result = classifier.classify("texto", None).await.unwrap();
        assert_eq!(result.confidence, 1.0);

        let classifier = Classifier::new(MockLlm::new(r#"{"category": "Produtivo", "confidence": -0.2}"#));
        let result = classifier.classify("texto", None).await.unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn service_failure_falls_back_unproductive() {
        let result = failing_classifier()
            .classify("Bom dia! Feliz aniversário.", None)
            .await
            .unwrap();
        assert_eq!(result.category, Category::Unproductive);
        assert_eq!(result.confidence, 0.55);
        assert_eq!(result.suggested_response, UNPRODUCTIVE_REPLY);
        assert_eq!(result.metadata.source, Source::FallbackHeuristic);
    }

    #[tokio::test]
    async fn service_failure_falls_back_productive_on_keywords() {
        let result = failing_classifier()
            .classify("Preciso de atualização do chamado #123 urgente", None)
            .await
            .unwrap();
        assert_eq!(result.category, Category::Productive);
        assert_eq!(result.confidence, 0.65);
        assert_eq!(result.suggested_response, PRODUCTIVE_REPLY);
        assert_eq!(result.metadata.source, Source::FallbackHeuristic);
    }

    #[tokio::test]
    async fn garbage_reply_falls_back_with_same_tag() {
        let classifier = Classifier::new(MockLlm::new("I think this is productive!"));
        let result = classifier.classify("Status of ticket 9?", None).await.unwrap();
        assert_eq!(result.category, Category::Productive);
        assert_eq!(result.confidence, 0.65);
        assert_eq!(result.metadata.source, Source::FallbackHeuristic);
    }

    #[tokio::test]
    async fn verdict_records_fallback_reason() {
        let classifier = Classifier::new(MockLlm::new("nope"));
        let verdict = classifier.infer("x", "", false).await;
        assert!(matches!(
            verdict,
            Verdict::Heuristic {
                reason: FallbackReason::Undecodable(_),
                ..
            }
        ));

        let verdict = failing_classifier().infer("x", "", false).await;
        assert!(matches!(
            verdict,
            Verdict::Heuristic {
                reason: FallbackReason::Unavailable(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn hanging_service_times_out_into_fallback() {
        let config = ClassifierConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let classifier = Classifier::with_lexicon(Arc::new(HangingLlm), Lexicon::default(), config);

        let started = Instant::now();
        let result = classifier.classify("thanks a lot", None).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.metadata.source, Source::FallbackHeuristic);
        assert_eq!(result.category, Category::Unproductive);
    }

    #[tokio::test]
    async fn empty_after_cleaning_is_client_error() {
        let err = failing_classifier().classify("  <br/>\r\n ", None).await.unwrap_err();
        assert_eq!(err, InputError::EmptyAfterCleaning);
    }

    #[tokio::test]
    async fn metadata_lengths_and_filename() {
        let result = failing_classifier()
            .classify("Muito obrigado pela ajuda!", Some("thanks.txt".into()))
            .await
            .unwrap();
        assert_eq!(result.metadata.text_length, "Muito obrigado pela ajuda!".chars().count());
        assert_eq!(result.metadata.processed_length, "muito obrigado pela ajuda".len());
        assert_eq!(result.metadata.filename.as_deref(), Some("thanks.txt"));
        assert!(result.processing_time >= 0.0);
    }

    #[tokio::test]
    async fn custom_lexicon_changes_fallback() {
        let lexicon = Lexicon::empty().with_keywords(&["boleto"]);
        let classifier =
            Classifier::with_lexicon(Arc::new(FailingLlm), lexicon, ClassifierConfig::default());
        let result = classifier.classify("Segue o boleto", None).await.unwrap();
        assert_eq!(result.category, Category::Productive);
    }
}
