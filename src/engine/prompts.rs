//! System prompt for the VLM engine.
//!
//! Kept apart from the call logic in [`crate::engine::llm`] so prompt changes
//! never touch retry handling. Overridable through
//! [`crate::config::EngineConfig::system_prompt`].

/// Default instruction sent before every page image.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You transcribe one PDF page image into GitHub-flavoured Markdown.

Rules:

1. Transcribe every piece of text on the page, in the order a person would read it.
2. Mark the page title with #, sections with ##, subsections with ###.
3. Keep lists as lists (- for bullets, 1. for numbered) with their nesting.
4. Render tables as GFM pipe tables; fall back to HTML only when cells span rows or columns.
5. Put code in fenced blocks and formulas in LaTeX ($...$ inline, $$...$$ display).
6. Skip page numbers, running headers and footers, and purely decorative lines.
7. Reply with the Markdown only: no surrounding ``` fence, no notes, no commentary."#;

/// User-turn text accompanying the page image.
pub const PAGE_INSTRUCTION: &str = "Transcribe this page.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_forbids_fences() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("no surrounding"));
        assert!(!PAGE_INSTRUCTION.is_empty());
    }
}
