//! Instruction template and prompt composition.
//!
//! Every request starts with the same instruction template; the user's
//! free-form "additional information" is appended after a single space.
//! Callers can override the template via
//! [`crate::config::AnalyzerConfig::template`]; the constant here is used only
//! when no override is provided.

/// Default instruction template for nutritional analysis of a food photo.
pub const NUTRITION_PROMPT: &str = r#"
You are an expert in nutrition where you need to see the food items from the image
and calculate the total calories, also provide the details of every food item with calories intake
is below format

1. Item 1 - no of calories - protein contained in grams protein
2. Item 2 - no of calories - protein contained in grams protein
----
----
Finally, you can also mention whether the food is healthy or not and also mention the percentage split of ratio
of carbohydrates, fats, fiber, sugar, and other things required in a diet.
"#;

/// Join the template and the user's text with exactly one space.
///
/// The user text is passed through verbatim: no trimming, escaping or
/// truncation. An empty `user_text` leaves a single trailing space.
pub fn compose_prompt(template: &str, user_text: &str) -> String {
    let mut prompt = String::with_capacity(template.len() + 1 + user_text.len());
    prompt.push_str(template);
    prompt.push(' ');
    prompt.push_str(user_text);
    prompt
}
