//! Nested JSON form of a tree, read and written without recursion
//!
//! The document shape is `{ "id", "data", "parentId", "children": [...] }`.
//! Structure is walked with explicit stacks so depth is bounded by memory
//! only. Leaf values (ids, property maps) go through serde_json.

use crate::model::{Node, NodeData, NodeId};
use crate::{Error, Result};
use serde::de::{Error as _, IgnoredAny};
use std::sync::Arc;

// === Writing ===

/// Serialize a subtree
///
/// Compact output matches `serde_json::to_string` of the node, pretty output
/// matches `serde_json::to_string_pretty`.
pub(crate) fn write(root: &Node, pretty: bool) -> String {
    enum Step<'n> {
        Open { node: &'n Node, indent: usize, comma: bool },
        Close { indent: usize },
    }

    let mut w = Writer {
        out: String::new(),
        pretty,
    };
    let mut stack = vec![Step::Open {
        node: root,
        indent: 0,
        comma: false,
    }];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open {
                node,
                indent,
                comma,
            } => {
                if comma {
                    w.out.push(',');
                }
                if indent > 0 {
                    w.newline(indent);
                }

                w.out.push('{');
                w.key("id", indent + 1, true);
                encode_str(&mut w.out, node.id.as_str());
                w.key("data", indent + 1, false);
                w.data(&node.data, indent + 1);
                w.key("parentId", indent + 1, false);
                match &node.parent_id {
                    Some(parent_id) => encode_str(&mut w.out, parent_id.as_str()),
                    None => w.out.push_str("null"),
                }
                w.key("children", indent + 1, false);
                w.out.push('[');

                if node.children.is_empty() {
                    w.out.push(']');
                    w.newline(indent);
                    w.out.push('}');
                } else {
                    stack.push(Step::Close { indent });
                    stack.extend(node.children.iter().enumerate().rev().map(|(i, child)| {
                        Step::Open {
                            node: child,
                            indent: indent + 2,
                            comma: i > 0,
                        }
                    }));
                }
            }
            Step::Close { indent } => {
                w.newline(indent + 1);
                w.out.push(']');
                w.newline(indent);
                w.out.push('}');
            }
        }
    }

    w.out
}

/// Compact JSON text of a property map, as used for content fingerprints
pub(crate) fn encode_data(data: &NodeData) -> String {
    let mut w = Writer {
        out: String::new(),
        pretty: false,
    };
    w.data(data, 0);
    w.out
}

struct Writer {
    out: String,
    pretty: bool,
}

impl Writer {
    fn newline(&mut self, indent: usize) {
        if self.pretty {
            self.out.push('\n');
            for _ in 0..indent {
                self.out.push_str("  ");
            }
        }
    }

    fn key(&mut self, key: &str, indent: usize, first: bool) {
        if !first {
            self.out.push(',');
        }
        self.newline(indent);
        encode_str(&mut self.out, key);
        self.out.push(':');
        if self.pretty {
            self.out.push(' ');
        }
    }

    fn data(&mut self, data: &NodeData, indent: usize) {
        if data.is_empty() {
            self.out.push_str("{}");
            return;
        }

        self.out.push('{');
        for (i, (key, values)) in data.iter().enumerate() {
            self.key(key, indent + 1, i == 0);
            if values.is_empty() {
                self.out.push_str("[]");
                continue;
            }
            self.out.push('[');
            for (j, value) in values.iter().enumerate() {
                if j > 0 {
                    self.out.push(',');
                }
                self.newline(indent + 2);
                encode_str(&mut self.out, value);
            }
            self.newline(indent + 1);
            self.out.push(']');
        }
        self.newline(indent);
        self.out.push('}');
    }
}

/// Quote and escape a string the way serde_json does
fn encode_str(out: &mut String, value: &str) {
    const HEX: &[u8; 16] = b"0123456789abcdef";

    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let byte = c as u32 as usize;
                out.push_str("\\u00");
                out.push(HEX[byte >> 4] as char);
                out.push(HEX[byte & 0xf] as char);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

// === Reading ===

/// Parse a document into its root node
///
/// Parent ids are derived from the nesting; any `parentId` in the input is
/// ignored. Empty properties are dropped.
pub(crate) fn read(json: &str) -> Result<Node> {
    let mut reader = Reader { src: json, pos: 0 };
    let mut frames: Vec<Frame> = Vec::new();

    reader.expect(b'{')?;
    frames.push(Frame::default());
    let mut state = State::ObjectStart;

    loop {
        state = match state {
            State::ObjectStart | State::ObjectNext => {
                let first = matches!(state, State::ObjectStart);
                match reader.peek() {
                    Some(b'}') => {
                        reader.pos += 1;
                        let node = frames
                            .pop()
                            .ok_or_else(|| reader.error("unbalanced object"))?
                            .finish(&reader)?;

                        match frames.last_mut() {
                            Some(parent) => {
                                parent.children.push(Arc::new(node));
                                State::ChildrenNext
                            }
                            None => {
                                if reader.peek().is_some() {
                                    return Err(reader.error("trailing characters"));
                                }
                                return Ok(node);
                            }
                        }
                    }
                    Some(b',') if !first => {
                        reader.pos += 1;
                        reader.field(&mut frames)?
                    }
                    Some(b'"') if first => reader.field(&mut frames)?,
                    _ => return Err(reader.error("expected `,` or `}`")),
                }
            }
            State::ChildrenStart | State::ChildrenNext => {
                let first = matches!(state, State::ChildrenStart);
                match reader.peek() {
                    Some(b']') => {
                        reader.pos += 1;
                        State::ObjectNext
                    }
                    Some(b',') if !first => {
                        reader.pos += 1;
                        reader.expect(b'{')?;
                        frames.push(Frame::default());
                        State::ObjectStart
                    }
                    Some(b'{') if first => {
                        reader.pos += 1;
                        frames.push(Frame::default());
                        State::ObjectStart
                    }
                    _ => return Err(reader.error("expected child object")),
                }
            }
        };
    }
}

/// What the reader expects next
enum State {
    /// First key or `}`
    ObjectStart,
    /// `,` or `}`
    ObjectNext,
    /// First child or `]`
    ChildrenStart,
    /// `,` or `]`
    ChildrenNext,
}

/// A node whose object is still open
#[derive(Default)]
struct Frame {
    id: Option<NodeId>,
    data: NodeData,
    children: Vec<Arc<Node>>,
}

impl Frame {
    fn finish(self, reader: &Reader<'_>) -> Result<Node> {
        let Some(id) = self.id else {
            return Err(reader.error("missing field `id`"));
        };

        let mut data = self.data;
        data.retain(|_, values| !values.is_empty());

        let mut node = Node::new(id, data, None);
        node.children = self.children;
        for child in &mut node.children {
            if let Some(child) = Arc::get_mut(child) {
                child.parent_id = Some(node.id.clone());
            }
        }

        Ok(node)
    }
}

struct Reader<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Reader<'s> {
    fn error(&self, msg: &str) -> Error {
        Error::Json(serde_json::Error::custom(format!(
            "{} at byte {}",
            msg, self.pos
        )))
    }

    fn skip_ws(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    /// Next non-whitespace byte, not consumed
    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.src.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", byte as char)))
        }
    }

    fn skip_string(&mut self) -> Result<()> {
        let src: &'s str = self.src;
        let bytes = src.as_bytes();
        self.pos += 1;
        while let Some(&byte) = bytes.get(self.pos) {
            match byte {
                b'\\' => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error("unterminated string"))
    }

    /// Source text of the next value, with nesting skipped by bracket count
    fn value(&mut self) -> Result<&'s str> {
        self.skip_ws();
        let src: &'s str = self.src;
        let bytes = src.as_bytes();
        let start = self.pos;
        let mut depth = 0usize;

        loop {
            let Some(&byte) = bytes.get(self.pos) else {
                return Err(self.error("unexpected end of input"));
            };
            match byte {
                b'"' => self.skip_string()?,
                b'{' | b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' | b']' if depth > 0 => {
                    depth -= 1;
                    self.pos += 1;
                }
                b'}' | b']' => break,
                b',' if depth == 0 => break,
                _ if depth == 0 && byte.is_ascii_whitespace() => break,
                _ => self.pos += 1,
            }
            if depth == 0 && matches!(byte, b'"' | b'}' | b']') {
                break;
            }
        }

        if self.pos == start {
            return Err(self.error("expected value"));
        }
        Ok(&src[start..self.pos])
    }

    /// Read one `"key": value` pair into the innermost frame
    fn field(&mut self, frames: &mut [Frame]) -> Result<State> {
        if self.peek() != Some(b'"') {
            return Err(self.error("expected key"));
        }
        let key: String = serde_json::from_str(self.value()?)?;
        self.expect(b':')?;

        let frame = frames
            .last_mut()
            .ok_or_else(|| self.error("field outside object"))?;
        match key.as_str() {
            "id" => frame.id = Some(serde_json::from_str(self.value()?)?),
            "data" => frame.data = serde_json::from_str(self.value()?)?,
            "children" => {
                self.expect(b'[')?;
                return Ok(State::ChildrenStart);
            }
            _ => {
                serde_json::from_str::<IgnoredAny>(self.value()?)?;
            }
        }

        Ok(State::ObjectNext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        let data = |key: &str, value: &str| NodeData::from([(key.to_string(), vec![value.to_string()])]);
        let mut leaf = Node::new("2", data("W", "q\"d\n\u{1}"), Some(NodeId::from("1")));
        leaf.data.insert("C".to_string(), vec!["a\\b".to_string(), "\t".to_string()]);
        let mut middle = Node::new("1", data("B", "dd"), Some(NodeId::from("0")));
        middle.children.push(Arc::new(leaf));
        middle.children.push(Arc::new(Node::new("3", NodeData::new(), Some(NodeId::from("1")))));
        let mut root = Node::new("0", NodeData::new(), None);
        root.children.push(Arc::new(middle));
        root
    }

    #[test]
    fn test_write_matches_serde_json() {
        let root = sample();
        assert_eq!(write(&root, false), serde_json::to_string(&root).unwrap());
        assert_eq!(write(&root, true), serde_json::to_string_pretty(&root).unwrap());
    }

    #[test]
    fn test_encode_data_matches_serde_json() {
        let data = sample().children[0].children[0].data.clone();
        assert_eq!(encode_data(&data), serde_json::to_string(&data).unwrap());
        assert_eq!(encode_data(&NodeData::new()), "{}");
    }

    #[test]
    fn test_read_back_written_text() {
        let root = sample();
        assert_eq!(read(&write(&root, true)).unwrap(), root);
    }

    #[test]
    fn test_read_ignores_unknown_fields() {
        let json = r#"{"id":"0","extra":{"a":[1,"}",null]},"children":[{"id":"1","parentId":"x","data":{"B":["dd"],"E":[]}}]}"#;
        let root = read(json).unwrap();

        let child = &root.children[0];
        assert_eq!(child.parent_id, Some(NodeId::from("0")));
        assert_eq!(child.data, NodeData::from([("B".to_string(), vec!["dd".to_string()])]));
    }

    #[test]
    fn test_read_rejects_malformed() {
        for json in [
            r#"{"data":{}}"#,
            r#"{"id":"0"} x"#,
            r#"{"id":"0"#,
            r#"{"id":"0","children":[{"id":"1"}"#,
            r#"{"id":"0","children":[1]}"#,
            r#"{"id":"0",}"#,
            r#"["id"]"#,
        ] {
            assert!(matches!(read(json), Err(Error::Json(_))), "accepted {}", json);
        }
    }
}
