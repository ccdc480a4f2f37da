//! Instruction prompt sent to the model for every analysis.

use super::report::CATEGORY_KEYS;

const SCORING_RULES: &str = "For each category, provide two scores and a single reason:
1. `ai_score`: an integer from 0-100 giving your direct assessment of how offensive the text is.
2. `potential_score`: an integer from 0-100 giving how offensive the text *could be perceived* by the most sensitive audience for that category.
3. `reason`: one explanation covering both scores.";

const SPECIFIC_INTEGERS: &str = "When generating every score and probability, use highly specific integers. \
Do not round or default to multiples of 5 or 10 (use values like 27, 83, 91 rather than 25, 80, 90).";

const STRICT_OUTPUT: &str = "Return ONLY the JSON object. Do not wrap it in markdown code fences, \
do not add commentary before or after it. The entire output must be a single, valid JSON object.";

/// Render the analysis prompt with `text` embedded verbatim.
pub fn build_prompt(text: &str) -> String {
    let categories = CATEGORY_KEYS
        .iter()
        .map(|key| format!("\"{key}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Analyze the following text for multiple categories of offense.
{scoring_rules}

Text: \"{text}\"

Return the response as a JSON object with the keys {categories}.
Each of those keys maps to an object containing `ai_score`, `potential_score`, and `reason`.

Also include a key named \"other_minorities\": an array of objects, each with \"group\", `ai_score`, `potential_score`, and `reason` keys.
Do not include \"LGBTQ+\" in \"other_minorities\"; it is already covered by \"homophobia\".

Include a key named \"shaming_line\" with a short, witty line shaming the user based on the scores. It should get more intense as the scores rise.

Add two more top-level keys:
1. \"probability_beaten_up\": an integer from 0-100 for the probability of the user being physically assaulted in public for saying this.
2. \"probability_cancelled\": an integer from 0-100 for the probability of the user being \"cancelled\" on social media for saying this.

For the history feature, add:
1. \"history_summary\": a one-to-ten word summary of what you think of the text.
2. \"conversational_reception_score\": an integer from 0-100 for how well the text would be received in a typical conversation (100 is very well, 0 is very poorly).

Finally, add \"problematic_words\": an array of the exact words or short phrases from the text that drove the scores (an empty array if none).

{specific_integers}

{strict_output}",
        scoring_rules = SCORING_RULES,
        text = text,
        categories = categories,
        specific_integers = SPECIFIC_INTEGERS,
        strict_output = STRICT_OUTPUT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prompt_embeds_text_in_quotes() {
        let prompt = build_prompt("you people are the worst");
        assert!(prompt.contains("Text: \"you people are the worst\""));
    }

    #[test]
    fn prompt_lists_every_field() {
        let prompt = build_prompt("hello");
        for key in CATEGORY_KEYS {
            assert!(prompt.contains(&format!("\"{key}\"")), "missing {key}");
        }
        for key in [
            "other_minorities",
            "shaming_line",
            "probability_beaten_up",
            "probability_cancelled",
            "history_summary",
            "conversational_reception_score",
            "problematic_words",
            "ai_score",
            "potential_score",
        ] {
            assert!(prompt.contains(key), "missing {key}");
        }
    }

    #[test]
    fn prompt_forbids_fences_and_round_numbers() {
        let prompt = build_prompt("hello");
        assert!(prompt.contains("markdown code fences"));
        assert!(prompt.contains("multiples of 5 or 10"));
        assert!(prompt.contains("LGBTQ+"));
    }

    #[test]
    fn prompt_keeps_tricky_text_intact() {
        let text = "He said \"{text}\" and {categories}\n```json\n{}\n```\t\\n 🙃 ünïcödé";
        let prompt = build_prompt(text);
        assert!(prompt.contains(text));
    }

    proptest! {
        #[test]
        fn prompt_contains_any_text_verbatim(text in any::<String>()) {
            let prompt = build_prompt(&text);
            prop_assert!(prompt.contains(&text));
        }
    }
}
