/// "Stuff" prompt: every retrieved chunk goes into one context block.
pub fn qa_prompt(context: &str, question: &str) -> String {
    format!(
        r#"You are a helpful AI assistant. Use the following context to answer the question at the end.
{context}
Question: {question}
Answer in a concise manner."#
    )
}

pub fn join_context<'a, I>(chunks: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    chunks
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
