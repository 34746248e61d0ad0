//! Sentence/paragraph chunking for persona text.

/// Splits text into sentence-sized chunks.
///
/// A chunk ends after a terminator (`.`, `!`, `?`, `;` by default) that is
/// followed by whitespace or the end of a paragraph, and at every blank-line
/// paragraph break. Whitespace inside a chunk is collapsed to single spaces.
/// Pure and deterministic.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    terminators: Vec<char>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            terminators: vec!['.', '!', '?', ';'],
        }
    }
}

impl TextSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom set of sentence terminators.
    pub fn with_terminators(terminators: impl IntoIterator<Item = char>) -> Self {
        Self {
            terminators: terminators.into_iter().collect(),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for paragraph in paragraphs(text) {
            self.split_sentences(&paragraph, &mut chunks);
        }
        chunks
    }

    fn split_sentences(&self, paragraph: &str, out: &mut Vec<String>) {
        let mut current = String::new();
        let mut chars = paragraph.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            let at_boundary = chars.peek().is_none_or(|next| next.is_whitespace());
            if self.terminators.contains(&c) && at_boundary {
                push_normalized(&current, out);
                current.clear();
            }
        }
        push_normalized(&current, out);
    }
}

/// Group lines into paragraphs separated by blank lines.
fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

fn push_normalized(chunk: &str, out: &mut Vec<String>) {
    let normalized = chunk.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        out.push(normalized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_sentences() {
        let chunks = TextSplitter::new().split("Hello world. This is a test.");
        assert_eq!(chunks, vec!["Hello world.", "This is a test."]);
    }

    #[test]
    fn test_empty_input() {
        assert!(TextSplitter::new().split("").is_empty());
        assert!(TextSplitter::new().split("  \n\n \t").is_empty());
    }

    #[test]
    fn test_no_terminator_is_single_chunk() {
        let chunks = TextSplitter::new().split("  a persona   without punctuation ");
        assert_eq!(chunks, vec!["a persona without punctuation"]);
    }

    #[test]
    fn test_paragraph_breaks_split() {
        let text = "I grew up by the sea\n\n  I now live   in the mountains";
        let chunks = TextSplitter::new().split(text);
        assert_eq!(
            chunks,
            vec!["I grew up by the sea", "I now live in the mountains"]
        );
    }

    #[test]
    fn test_single_newline_does_not_split() {
        let chunks = TextSplitter::new().split("A line\ncontinues here.");
        assert_eq!(chunks, vec!["A line continues here."]);
    }

    #[test]
    fn test_mixed_terminators() {
        let chunks = TextSplitter::new().split("Really? Yes! I think so; maybe.");
        assert_eq!(chunks, vec!["Really?", "Yes!", "I think so;", "maybe."]);
    }

    #[test]
    fn test_terminator_inside_token_does_not_split() {
        let chunks = TextSplitter::new().split("Version 2.5 shipped. Nice.");
        assert_eq!(chunks, vec!["Version 2.5 shipped.", "Nice."]);
    }

    #[test]
    fn test_custom_terminators() {
        let chunks = TextSplitter::with_terminators(['.']).split("One; two. Three");
        assert_eq!(chunks, vec!["One; two.", "Three"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha. Beta!\n\nGamma?";
        let splitter = TextSplitter::new();
        assert_eq!(splitter.split(text), splitter.split(text));
    }
}
