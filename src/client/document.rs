//! Abstract document of replaceable text nodes.

/// One text node as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub id: usize,
    pub text: String,
}

/// A document the client can walk and overlay with translations.
pub trait Document {
    /// Text nodes in document order.
    fn text_nodes(&self) -> Vec<TextNode>;

    /// Replace node `id` with an original-over-translation block.
    /// Returns false if the node does not exist.
    fn replace_with_bilingual(&mut self, id: usize, original: &str, translation: &str) -> bool;
}

/// Line-oriented in-memory document; each line is a text node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDocument {
    nodes: Vec<String>,
}

impl MemoryDocument {
    pub fn from_lines(text: &str) -> Self {
        Self {
            nodes: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn render(&self) -> String {
        self.nodes.join("\n")
    }
}

impl Document for MemoryDocument {
    fn text_nodes(&self) -> Vec<TextNode> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(id, text)| TextNode {
                id,
                text: text.clone(),
            })
            .collect()
    }

    fn replace_with_bilingual(&mut self, id: usize, original: &str, translation: &str) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                *node = format!("{original}\n{translation}");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_become_nodes() {
        let doc = MemoryDocument::from_lines("Title\n\nBody text");
        let nodes = doc.text_nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[2], TextNode { id: 2, text: "Body text".into() });
        assert_eq!(doc.render(), "Title\n\nBody text");
    }

    #[test]
    fn bilingual_replacement_renders_two_lines() {
        let mut doc = MemoryDocument::from_lines("Hello\n123");
        assert!(doc.replace_with_bilingual(0, "Hello", "你好"));
        assert!(!doc.replace_with_bilingual(5, "x", "y"));
        assert_eq!(doc.render(), "Hello\n你好\n123");
    }
}
