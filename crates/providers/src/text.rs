//! Post-processing of raw model output.

/// End-of-turn marker of the Phi-3 instruct format; also the stop sequence.
pub const END_OF_TURN: &str = "<|end|>";

const ASSISTANT_MARKER: &str = "<|assistant|>\n";

/// Strip an echoed prompt and trailing special tokens from a completion.
///
/// Some servers echo the prompt back; the answer is whatever follows the last
/// open assistant marker. Leading whitespace is kept; callers trim the final
/// answer.
pub fn clean_completion(raw: &str) -> String {
    let answer = match raw.rfind(ASSISTANT_MARKER) {
        Some(pos) => &raw[pos + ASSISTANT_MARKER.len()..],
        None => raw,
    };

    let mut answer = answer;
    loop {
        let stripped = answer
            .trim_end_matches(char::is_whitespace)
            .trim_end_matches(END_OF_TURN)
            .trim_end_matches("<|endoftext|>")
            .trim_end_matches("</s>");
        if stripped.len() == answer.len() {
            break;
        }
        answer = stripped;
    }
    answer.to_string()
}
