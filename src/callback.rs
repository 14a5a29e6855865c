use async_trait::async_trait;
use url::Url;

use crate::error::CallbackError;
use crate::params::{RefinedParameters, CALL_ID};
use crate::results::{HandlerFailure, HandlerResult, HandlerSuccess, StepOutcome};

/// Delivers an outbound callback URL. Fire-and-forget: nothing is read back.
#[async_trait]
pub trait CallbackSender: Send + Sync {
    async fn send(&self, url: &Url) -> Result<(), CallbackError>;
}

/// GET for http(s) callbacks; any other scheme goes to the OS URL launcher.
pub struct SystemCallbackSender {
    client: reqwest::Client,
}

impl SystemCallbackSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SystemCallbackSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallbackSender for SystemCallbackSender {
    async fn send(&self, url: &Url) -> Result<(), CallbackError> {
        match url.scheme() {
            "http" | "https" => {
                self.client
                    .get(url.clone())
                    .send()
                    .await?
                    .error_for_status()?;
            }
            _ => {
                let target = url.to_string();
                tokio::task::spawn_blocking(move || open::that(target)).await??;
            }
        }
        Ok(())
    }
}

fn common_pairs(params: &RefinedParameters) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Some(call_id) = params.call_id() {
        pairs.push((CALL_ID.to_string(), call_id.to_string()));
    }
    if params.debug_mode() {
        for (key, value) in &params.input {
            pairs.push((format!("input-{}", key), value.clone()));
        }
    }
    pairs
}

// The query serializer adds a `?` as soon as it is opened, so only open it
// when there is something to append
fn with_pairs(template: &Url, pairs: Vec<(String, String)>) -> Url {
    let mut url = template.clone();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}

/// Success callback: the caller's template plus the flattened payload.
pub fn success_url(template: &Url, success: &HandlerSuccess, params: &RefinedParameters) -> Url {
    let mut pairs = success.payload.callback_pairs();
    pairs.extend(common_pairs(params));
    with_pairs(template, pairs)
}

/// Error callback: the caller's template plus `errorCode` and `errorMessage`.
pub fn error_url(template: &Url, failure: &HandlerFailure, params: &RefinedParameters) -> Url {
    let mut pairs = vec![
        ("errorCode".to_string(), failure.code.to_string()),
        ("errorMessage".to_string(), failure.message.clone()),
    ];
    pairs.extend(common_pairs(params));
    with_pairs(template, pairs)
}

// Scheme, host and path only; query strings may carry note content
fn describe(url: &Url) -> String {
    format!("{}://{}{}", url.scheme(), url.host_str().unwrap_or(""), url.path())
}

/// Send `x-success` or `x-error` for this result when the caller asked for it.
pub async fn maybe_send_callback(
    sender: &dyn CallbackSender,
    result: &HandlerResult,
    params: &RefinedParameters,
) -> StepOutcome {
    let url = match result {
        HandlerResult::Success(success) => match params.x_success() {
            Some(template) => success_url(template, success, params),
            None => return StepOutcome::Skipped("No success callback requested".to_string()),
        },
        HandlerResult::Failure(failure) => match params.x_error() {
            Some(template) => error_url(template, failure, params),
            None => return StepOutcome::Skipped("No error callback requested".to_string()),
        },
    };

    match sender.send(&url).await {
        Ok(()) => {
            tracing::debug!("Sent callback to {}", describe(&url));
            StepOutcome::Done(format!("Sent callback to {}", describe(&url)))
        }
        Err(e) => {
            tracing::warn!("Callback to {} failed: {}", describe(&url), e);
            StepOutcome::Failed(format!("Callback to {} failed: {}", describe(&url), e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::params::{FieldValue, RawParameters};
    use crate::results::SuccessPayload;
    use crate::testing::RecordingSender;
    use std::collections::BTreeMap;

    fn params(pairs: &[(&str, FieldValue)]) -> RefinedParameters {
        let input: RawParameters = pairs
            .iter()
            .map(|(k, _)| (k.to_string(), "raw".to_string()))
            .collect();
        RefinedParameters {
            input,
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            targeting: None,
        }
    }

    fn url(s: &str) -> FieldValue {
        FieldValue::Url(Url::parse(s).unwrap())
    }

    fn ok() -> HandlerResult {
        HandlerResult::Success(HandlerSuccess::processed(
            SuccessPayload::Text("done".into()),
            "a.md",
        ))
    }

    fn failed() -> HandlerResult {
        HandlerResult::Failure(HandlerFailure::new(ErrorCode::NotFound, "note not found"))
    }

    fn query(url: &Url) -> BTreeMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[tokio::test]
    async fn test_no_callback_requested() {
        let sender = RecordingSender::new();
        let outcome = maybe_send_callback(&sender, &ok(), &params(&[])).await;
        assert!(outcome.is_skipped());
        assert!(sender.sent().is_empty());

        let outcome = maybe_send_callback(&sender, &failed(), &params(&[])).await;
        assert!(outcome.is_skipped());
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_success_only_uses_x_success() {
        let sender = RecordingSender::new();
        let p = params(&[("x-error", url("https://example.com/err"))]);
        let outcome = maybe_send_callback(&sender, &ok(), &p).await;
        assert!(outcome.is_skipped());
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_success_callback_carries_payload() {
        let sender = RecordingSender::new();
        let p = params(&[
            ("x-success", url("shortcuts://callback?keep=1")),
            ("call-id", FieldValue::Text("c-9".into())),
        ]);
        let outcome = maybe_send_callback(&sender, &ok(), &p).await;
        assert!(outcome.is_done(), "{:?}", outcome);

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        let q = query(&sent[0]);
        assert_eq!(q["keep"], "1");
        assert_eq!(q["result-message"], "done");
        assert_eq!(q["call-id"], "c-9");
        assert!(!q.keys().any(|k| k.starts_with("input-")));
    }

    #[tokio::test]
    async fn test_error_callback_carries_code_and_message() {
        let sender = RecordingSender::new();
        let p = params(&[
            ("x-success", url("https://example.com/ok")),
            ("x-error", url("https://example.com/err")),
        ]);
        let outcome = maybe_send_callback(&sender, &failed(), &p).await;
        assert!(outcome.is_done());

        let sent = sender.sent();
        assert_eq!(sent[0].path(), "/err");
        let q = query(&sent[0]);
        assert_eq!(q["errorCode"], "404");
        assert_eq!(q["errorMessage"], "note not found");
    }

    #[tokio::test]
    async fn test_empty_payload_leaves_template_untouched() {
        let sender = RecordingSender::new();
        let empty = HandlerResult::Success(HandlerSuccess::new(SuccessPayload::Empty));
        for template in ["https://example.com/ok", "https://example.com/ok?keep=1"] {
            let p = params(&[("x-success", url(template))]);
            maybe_send_callback(&sender, &empty, &p).await;
        }

        let sent = sender.sent();
        assert_eq!(sent[0].as_str(), "https://example.com/ok");
        assert_eq!(sent[0].query(), None);
        assert_eq!(sent[1].as_str(), "https://example.com/ok?keep=1");
    }

    #[tokio::test]
    async fn test_debug_mode_echoes_input() {
        let sender = RecordingSender::new();
        let p = params(&[
            ("x-success", url("https://example.com/ok")),
            ("debug-mode", FieldValue::Flag(true)),
        ]);
        maybe_send_callback(&sender, &ok(), &p).await;
        let q = query(&sender.sent()[0]);
        assert_eq!(q["input-debug-mode"], "raw");
        assert_eq!(q["input-x-success"], "raw");
    }

    #[tokio::test]
    async fn test_delivery_failure_is_reported_not_raised() {
        let sender = RecordingSender::failing();
        let p = params(&[("x-success", url("https://example.com/ok?secret=1"))]);
        let outcome = maybe_send_callback(&sender, &ok(), &p).await;
        assert!(outcome.is_failed());
        assert!(outcome.message().contains("https://example.com/ok"));
        assert!(!outcome.message().contains("secret"));
        assert_eq!(sender.sent().len(), 1);
    }
}
