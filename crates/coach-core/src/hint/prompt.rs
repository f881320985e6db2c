//! Structured prompt assembly for [`super::LlmHintService`].

use crate::ocr::OcrSnapshot;

fn join(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| t.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Five enumerated sections (role, rules, context-weighting, output
/// contract, quality bar), followed by the live transcript and the four
/// OCR lists (`recent`, `first`, `last`, `unique`).
#[must_use]
pub fn build_prompt(transcript: &str, ocr: &OcrSnapshot) -> String {
    let unique = ocr.unique();
    format!(
        "1. ROLE\n\
         You are a live meeting coach. You watch a running transcript and on-screen\n\
         context and surface one short, concrete piece of coaching.\n\n\
         2. HARD RULES\n\
         - Never invent facts not grounded in the transcript or OCR context.\n\
         - The answer is at most 22 words; the follow-up is at most 16 words.\n\
         - Output nothing else beyond the JSON object described below.\n\n\
         3. CONTEXT WEIGHTING\n\
         Prefer the live transcript over OCR context. Within OCR context, prefer\n\
         the most recent frame over the first or last frame of the segment.\n\n\
         4. OUTPUT CONTRACT\n\
         Respond with a single JSON object: {{\"answer\": string, \"followUp\": string}}.\n\
         Optionally wrap it in a ```json code fence.\n\n\
         5. QUALITY BAR\n\
         Good answer: \"Acknowledge the budget constraint before proposing scope.\"\n\
         Good follow-up: \"Ask: 'What's the hard deadline?'\"\n\n\
         TRANSCRIPT\n\
         {transcript}\n\n\
         Recent OCR tokens: {recent}\n\
         First frame tokens: {first}\n\
         Last frame tokens: {last}\n\
         Unique context tokens: {unique}\n",
        recent = join(&ocr.recent),
        first = join(&ocr.first),
        last = join(&ocr.last),
        unique = join(&unique),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_ocr_sections_in_scenario_shape() {
        let mut store = crate::ocr::OcrStore::new();
        store.update(
            vec!["Q4".into(), "Revenue".into(), "$2.1M".into()],
            true,
            false,
        );
        store.update(vec!["Next".into(), "Steps".into()], false, true);
        let snapshot = store.snapshot();

        let prompt = build_prompt("we should discuss the roadmap", &snapshot);

        assert!(prompt.contains("Recent OCR tokens: next, steps"));
        assert!(prompt.contains("First frame tokens: q4, revenue, $2.1m"));
        assert!(prompt.contains("Last frame tokens: next, steps"));
        assert!(prompt.contains("Unique context tokens: next, steps, q4, revenue, $2.1m"));
        assert!(prompt.contains("we should discuss the roadmap"));
    }
}
