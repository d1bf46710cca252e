//! Prompt templates sent to the completion model.

pub fn refine(question: &str) -> String {
    format!(
        "I have a RAG system for answering questions about a knowledge base of documents.\n\
Given the following user question, break it down into discrete searchable queries that capture the user's intention.\n\
The queries are used in a cosine similarity search over a vector index, so keep them short and concise.\n\
Phrase the queries as statements rather than questions.\n\
If the question is complex, break it down into multiple queries.\n\
Do not produce multiple queries that capture the same information.\n\
\n\
IMPORTANT: Return only a valid JSON array of strings, and nothing else.\n\
For example: [\"query one\", \"query two\"]\n\
\n\
User question: {question}\n\
\n\
Searchable queries:"
    )
}

pub fn general(question: &str) -> String {
    format!(
        "The user asked a question but no relevant documents were found in the knowledge base.\n\
Give a brief, general answer based on your own knowledge, and tell the user that none of their documents were used to answer it.\n\
\n\
Question: {question}\n\
\n\
Answer:"
    )
}

pub fn grounded(context: &str, question: &str) -> String {
    format!(
        "Answer the question using the context below. Cite the context with its reference markers \
([Ref1], [Ref2], ...) at the point where you use the information.\n\
Prefer the context over your own knowledge. If the context does not cover part of the question, \
say so and answer that part from general knowledge.\n\
Answer in one to three paragraphs.\n\
\n\
-------------------------\n\
Context:\n\
{context}\n\
-------------------------\n\
Question: {question}\n\
-------------------------\n\
Answer:"
    )
}
