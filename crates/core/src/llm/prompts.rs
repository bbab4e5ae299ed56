pub const SYSTEM_PROMPT: &str = "You are a financial analyst and stock strategist.";

/// Posts scraped for one tracked account.
#[derive(Debug, Clone, Default)]
pub struct AccountPosts {
    pub account: String,
    pub posts: Vec<String>,
}

pub fn feud_prompt(first: &AccountPosts, second: &AccountPosts) -> String {
    format!(
        "{a} and {b} posted these messages today:\n\n\
{a}:\n{a_posts}\n\n\
{b}:\n{b_posts}\n\n\
Summarize the main conflict or debate between them in 1-2 sentences.",
        a = first.account,
        b = second.account,
        a_posts = render_posts(&first.posts),
        b_posts = render_posts(&second.posts),
    )
}

pub fn recommendation_prompt(summary: &str, feedback: &str) -> String {
    let schema = [
        "[",
        "  {",
        "    \"ticker\": \"TSLA\",",
        "    \"action\": \"BUY\",",
        "    \"reason\": \"Elon is defending EVs while Trump criticizes them, increasing attention on Tesla.\"",
        "  }",
        "]",
    ]
    .join("\n");

    format!(
        "Given this feud summary:\n\"\"\"{summary}\"\"\"\n\n\
Track record of earlier suggestions:\n{feedback}\n\n\
Suggest 2-3 publicly traded companies whose stock might be impacted.\n\
For each, explain briefly why and suggest BUY, SELL, or HOLD.\n\
Respond with JSON only, in this format:\n{schema}"
    )
}

fn render_posts(posts: &[String]) -> String {
    if posts.is_empty() {
        return "(no posts found)".to_string();
    }
    posts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feud_prompt_names_both_accounts() {
        let a = AccountPosts {
            account: "elonmusk".to_string(),
            posts: vec!["EVs rule".to_string(), "Mars soon".to_string()],
        };
        let b = AccountPosts {
            account: "realDonaldTrump".to_string(),
            posts: vec![],
        };
        let p = feud_prompt(&a, &b);
        assert!(p.contains("elonmusk:\nEVs rule\nMars soon"));
        assert!(p.contains("realDonaldTrump:\n(no posts found)"));
    }

    #[test]
    fn recommendation_prompt_embeds_feedback_verbatim() {
        let p = recommendation_prompt("They argue about EVs.", "Accuracy: 50.00%.");
        assert!(p.contains("\"\"\"They argue about EVs.\"\"\""));
        assert!(p.contains("Accuracy: 50.00%."));
        assert!(p.contains("\"ticker\": \"TSLA\""));
    }
}
