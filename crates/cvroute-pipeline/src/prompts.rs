//! Prompt templates for the extraction and reconciliation calls.

use cvroute_core::{FieldSchema, Language};

/// System prompt for field extraction.
pub const EXTRACTION_SYSTEM: &str = "You extract candidate details from résumé text. \
Respond with a single JSON object and nothing else. Use exactly the keys listed, in \
the order listed. Use null for any field the text does not state; never guess. \
Fields marked (list) may be JSON arrays of strings.";

/// System prompt for deriving a province from a locality.
pub const PROVINCE_SYSTEM: &str = "You identify the South African province that contains \
a given location. Answer with the province name only, for example \"Gauteng\". If the \
location is not in South Africa or cannot be placed, answer \"Unknown\".";

/// System prompt for the name-based language estimate.
pub const NAME_LANGUAGE_SYSTEM: &str = "You predict the most likely native language of \
a South African person from their full name.";

/// System prompt for the province-based language estimate.
pub const PROVINCE_LANGUAGE_SYSTEM: &str = "You name the dominant home language spoken \
in a South African province.";

/// System prompt for arbitration between two disagreeing estimates.
pub const ARBITRATION_SYSTEM: &str = "You arbitrate between two disagreeing estimates of \
a person's native language and choose the more likely one.";

fn language_instruction() -> String {
    format!(
        "Answer with exactly one of: {}. If there is no reasonable basis, answer \"Unknown\".",
        Language::prompt_list()
    )
}

/// User prompt for field extraction.
pub fn extraction_prompt(schema: &FieldSchema, text: &str) -> String {
    let fields = schema
        .fields()
        .iter()
        .map(|f| {
            let list = if f.multi_value { " (list)" } else { "" };
            format!("- {}{}: {}", f.key, list, f.description)
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Fields:\n{}\n\nRésumé text:\n<<<\n{}\n>>>",
        fields, text
    )
}

/// User prompt for province derivation.
pub fn province_prompt(location: &str) -> String {
    format!("Location: {}", location)
}

/// User prompt for the name-based estimate.
pub fn name_language_prompt(name: &str) -> String {
    format!("Full name: {}\n\n{}", name, language_instruction())
}

/// User prompt for the province-based estimate.
pub fn province_language_prompt(province: &str) -> String {
    format!("Province: {}\n\n{}", province, language_instruction())
}

/// User prompt for arbitration.
pub fn arbitration_prompt(
    name: Option<&str>,
    province: Option<&str>,
    name_estimate: Language,
    province_estimate: Language,
) -> String {
    format!(
        "Person: {}\nResidence: {}\nName-based estimate: {}\nProvince-based estimate: {}\n\n\
Answer with exactly one language name, normally one of the two estimates.",
        name.unwrap_or("not stated"),
        province.unwrap_or("not stated"),
        name_estimate,
        province_estimate
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_prompt_lists_fields_in_order() {
        let schema = FieldSchema::standard();
        let prompt = extraction_prompt(&schema, "Thabo Nkosi");
        let name_at = prompt.find("- name:").unwrap();
        let email_at = prompt.find("- email:").unwrap();
        assert!(name_at < email_at);
        assert!(prompt.contains("- qualification (list):"));
        assert!(prompt.ends_with("Thabo Nkosi\n>>>"));
    }

    #[test]
    fn test_language_prompts_constrain_answers() {
        let prompt = name_language_prompt("Thabo Nkosi");
        assert!(prompt.contains("isiZulu"));
        assert!(prompt.contains("Tshivenda"));
        assert!(province_language_prompt("Limpopo").starts_with("Province: Limpopo"));
    }

    #[test]
    fn test_arbitration_prompt_presents_both_signals() {
        let prompt = arbitration_prompt(
            Some("Thabo Nkosi"),
            Some("Western Cape"),
            Language::IsiZulu,
            Language::Afrikaans,
        );
        assert!(prompt.contains("Name-based estimate: isiZulu"));
        assert!(prompt.contains("Province-based estimate: Afrikaans"));
        assert!(!prompt.contains("Full name:"));
    }
}
