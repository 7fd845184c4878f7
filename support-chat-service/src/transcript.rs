//! Consumer-side reconstruction of a streamed assistant reply.
//!
//! The widget (or a test harness) feeds raw `text/event-stream` bytes into a
//! [`PatchDecoder`] and applies the resulting patches to the session context:
//! each delta extends the open assistant turn in place, so the transcript is
//! visibly built up incrementally rather than revealed at the end.

use serde::Deserialize;

use dialogue_flow::Context;

use crate::relay::{DONE_SENTINEL, UPSTREAM_ERROR_MESSAGE};
use crate::sse::{EventStreamBuffer, data_payloads};

/// One incremental change to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptPatch {
    /// Text to append to the open assistant turn.
    Delta(String),
    /// The turn is complete and sealed.
    Done,
    /// The stream failed; carries the user-facing message.
    Error(String),
}

#[derive(Deserialize)]
struct FramePayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Decodes outbound relay frames into [`TranscriptPatch`]es.
#[derive(Debug, Default)]
pub struct PatchDecoder {
    buffer: EventStreamBuffer,
}

impl PatchDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of stream bytes; returns the patches completed by it.
    /// Malformed frame payloads are skipped, not fatal.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<TranscriptPatch> {
        self.buffer.extend(chunk);

        let mut patches = Vec::new();
        while let Some(block) = self.buffer.next_block() {
            for payload in data_payloads(&block) {
                if payload == DONE_SENTINEL {
                    patches.push(TranscriptPatch::Done);
                    continue;
                }
                match serde_json::from_str::<FramePayload>(payload) {
                    Ok(FramePayload {
                        text: Some(text), ..
                    }) => patches.push(TranscriptPatch::Delta(text)),
                    Ok(FramePayload {
                        error: Some(error), ..
                    }) => patches.push(TranscriptPatch::Error(error)),
                    _ => {}
                }
            }
        }
        patches
    }
}

/// Apply one patch to the session transcript.
pub async fn apply_patch(context: &Context, patch: &TranscriptPatch) {
    match patch {
        TranscriptPatch::Delta(text) => context.extend_last_assistant_message(text).await,
        TranscriptPatch::Done => {}
        TranscriptPatch::Error(_) => {
            // If nothing was streamed before the failure the open turn would
            // stay empty; fill it with the generic apology instead.
            let messages = context.get_last_messages(1).await;
            let open_turn_empty = messages
                .last()
                .map(|m| m.content.is_empty())
                .unwrap_or(true);
            if open_turn_empty {
                context
                    .extend_last_assistant_message(UPSTREAM_ERROR_MESSAGE)
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_then_sentinel_decode_in_order() {
        let mut decoder = PatchDecoder::new();
        let patches = decoder.push(
            b"data: {\"text\":\"Bon\"}\n\ndata: {\"text\":\"jour\"}\n\ndata: [DONE]\n\n",
        );

        assert_eq!(
            patches,
            vec![
                TranscriptPatch::Delta("Bon".to_string()),
                TranscriptPatch::Delta("jour".to_string()),
                TranscriptPatch::Done,
            ]
        );
    }

    #[test]
    fn malformed_payloads_are_skipped_without_aborting() {
        let mut decoder = PatchDecoder::new();
        let patches = decoder.push(
            b"data: {\"text\":\"Bon\"}\n\ndata: {not json}\n\ndata: {\"text\":\"jour\"}\n\ndata: [DONE]\n\n",
        );

        assert_eq!(
            patches,
            vec![
                TranscriptPatch::Delta("Bon".to_string()),
                TranscriptPatch::Delta("jour".to_string()),
                TranscriptPatch::Done,
            ]
        );
    }

    #[tokio::test]
    async fn transcript_is_built_incrementally_into_one_turn() {
        let context = Context::new();
        context.add_user_message("Bonjour !").await;

        let mut decoder = PatchDecoder::new();
        let mut updates = 0;
        // Chunk boundaries deliberately split frames mid-payload.
        for chunk in [
            b"data: {\"text\":\"Bon\"}\n\nda".as_slice(),
            b"ta: {\"text\":\"jour\"}\n\ndata: [DONE]\n\n".as_slice(),
        ] {
            for patch in decoder.push(chunk) {
                apply_patch(&context, &patch).await;
                if matches!(patch, TranscriptPatch::Delta(_)) {
                    updates += 1;
                    // Intermediate state must be visible after the first delta.
                    if updates == 1 {
                        let messages = context.get_all_messages().await;
                        assert_eq!(messages.last().unwrap().content, "Bon");
                    }
                }
            }
        }

        assert!(updates >= 2);
        let messages = context.get_all_messages().await;
        // Exactly one assistant turn, with the fully accumulated text.
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.last().unwrap().content, "Bonjour");
    }

    #[tokio::test]
    async fn error_before_any_delta_fills_the_open_turn_with_apology() {
        let context = Context::new();
        context.add_user_message("Bonjour !").await;
        context.extend_last_assistant_message("").await;

        let mut decoder = PatchDecoder::new();
        for patch in decoder.push(b"data: {\"error\":\"oups\"}\n\n") {
            apply_patch(&context, &patch).await;
        }

        let messages = context.get_all_messages().await;
        assert_eq!(messages.last().unwrap().content, UPSTREAM_ERROR_MESSAGE);
    }
}
