/// Topic label used when no rule matches.
pub const DEFAULT_TOPIC: &str = "General";

/// Ordered classification rules: the first rule with a matching keyword wins.
/// Keywords are matched as substrings of the lowercased question.
const TOPIC_RULES: &[(&[&str], &str)] = &[
    (&["marine", "military", "veteran", "navy"], "Military/Service"),
    (&["family", "wife", "husband", "children", "kids"], "Family"),
    (&["current role", "current company", "day job"], "Current Role"),
    (&["healthcare", "health care"], "Healthcare"),
    (&["playbook", "transform", "strategy"], "Leadership Playbook"),
    (&["award", "recognition", "finalist"], "Awards/Recognition"),
    (&["ai", "llm", "technology", "cloud", "devops"], "Technology/AI"),
    (&["leadership", "manage", "team"], "Leadership Style"),
    (&["book", "read"], "Books/Learning"),
    (&["career", "experience", "background"], "Career Journey"),
    (&["contact", "email", "phone", "hire"], "Contact/Hiring"),
];

/// Classify a free-text question into exactly one topic label.
pub fn detect_topic(question: &str) -> &'static str {
    let q = question.to_lowercase();
    for (keywords, label) in TOPIC_RULES {
        if keywords.iter().any(|k| q.contains(k)) {
            return label;
        }
    }
    DEFAULT_TOPIC
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_topic_basic() {
        assert_eq!(detect_topic("Tell me about your Marine Corps days"), "Military/Service");
        assert_eq!(detect_topic("How many kids do you have?"), "Family");
        assert_eq!(detect_topic("What books do you recommend?"), "Books/Learning");
        assert_eq!(detect_topic("How can I contact you?"), "Contact/Hiring");
    }

    #[test]
    fn test_detect_topic_first_match_wins() {
        // Mentions both military and family; the military rule comes first.
        assert_eq!(detect_topic("Did your military career affect your family?"), "Military/Service");
    }

    #[test]
    fn test_detect_topic_case_insensitive() {
        assert_eq!(detect_topic("WHAT IS YOUR AI STRATEGY"), "Leadership Playbook");
        assert_eq!(detect_topic("thoughts on LLM tooling?"), "Technology/AI");
    }

    #[test]
    fn test_detect_topic_default() {
        assert_eq!(detect_topic("what's your favorite color?"), DEFAULT_TOPIC);
        assert_eq!(detect_topic(""), DEFAULT_TOPIC);
    }
}
