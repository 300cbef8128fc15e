pub fn build_line_prompt(chunk_text: &str) -> String {
    format!(
        r#"Extract all subject-predicate-object triples from the following text.

RULES:
- One triple per line
- Format: (subject, predicate, object)
- Quote a field with double quotes if it contains a comma
- Use the entity names exactly as written in the text
- Output ONLY the triples, no numbering, no explanations

TEXT:
{}

TRIPLES:"#,
        chunk_text
    )
}

pub fn build_json_prompt(chunk_text: &str) -> String {
    format!(
        r#"Extract all factual subject-predicate-object triples from the following text.

SCHEMA:
{{
  "triples": [
    {{"subject": "EntityName", "relation": "verb phrase", "object": "EntityName"}}
  ]
}}

RULES:
- Use the entity names exactly as written in the text
- Relations should be short verb phrases: "manages", "works at", "founded", etc.
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{}

JSON OUTPUT:"#,
        chunk_text
    )
}

pub fn build_retry_prompt(invalid_json: &str) -> String {
    format!(
        r#"The following JSON is invalid:

{}

Fix this JSON. Output only valid JSON with no markdown formatting, no code blocks, no explanations. Just the raw JSON object."#,
        invalid_json
    )
}
