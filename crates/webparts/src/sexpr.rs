//! S-expression reader and writer for LibrePCB files.
//!
//! Grammar:
//!   sexpr  = '(' atom_or_sexpr* ')'
//!   atom   = string | symbol
//!   string = '"' ([^"\\] | '\\' any)* '"'
//!   symbol = [^ \t\n\r()"]+

/// Widest list written on a single line.
const INLINE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum SExpr {
    List(Vec<SExpr>),
    /// Bare token: keyword, number, UUID.
    Atom(String),
    /// Quoted string.
    Str(String),
}

impl SExpr {
    /// `(tag items...)`
    pub fn list(tag: &str, items: impl IntoIterator<Item = SExpr>) -> SExpr {
        let mut v = vec![SExpr::Atom(tag.to_string())];
        v.extend(items);
        SExpr::List(v)
    }

    pub fn atom(s: impl Into<String>) -> SExpr {
        SExpr::Atom(s.into())
    }

    pub fn string(s: impl Into<String>) -> SExpr {
        SExpr::Str(s.into())
    }

    pub fn bool(b: bool) -> SExpr {
        SExpr::Atom(if b { "true" } else { "false" }.to_string())
    }

    /// Get the first atom in a list (the "tag" or "name").
    pub fn tag(&self) -> Option<&str> {
        match self {
            SExpr::List(items) => items.first().and_then(|item| match item {
                SExpr::Atom(s) => Some(s.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Get list children (everything after the tag).
    pub fn children(&self) -> &[SExpr] {
        match self {
            SExpr::List(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// Find a child list with the given tag.
    pub fn find(&self, tag: &str) -> Option<&SExpr> {
        self.children().iter().find(|c| c.tag() == Some(tag))
    }

    /// Get the value of a simple (tag value) node.
    pub fn value(&self, tag: &str) -> Option<&str> {
        self.find(tag).and_then(|node| node.atom_at(0))
    }

    /// Text of an atom or a string.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom(s) | SExpr::Str(s) => Some(s.as_str()),
            SExpr::List(_) => None,
        }
    }

    /// Get the nth atom child (0-indexed from children, i.e., after the tag).
    pub fn atom_at(&self, index: usize) -> Option<&str> {
        self.children().get(index).and_then(|v| v.as_atom())
    }

    // ─── Writing ─────────────────────────────────────────────────────

    /// Render as a document: the root is always broken over lines and the
    /// text ends with a newline.
    pub fn to_document(&self) -> String {
        let mut out = String::new();
        match self {
            SExpr::List(_) => self.write_block(&mut out, 0),
            _ => self.write_flat(&mut out),
        }
        out.push('\n');
        out
    }

    fn write_flat(&self, out: &mut String) {
        match self {
            SExpr::Atom(s) => out.push_str(s),
            SExpr::Str(s) => {
                out.push('"');
                for c in s.chars() {
                    match c {
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            SExpr::List(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_flat(out);
                }
                out.push(')');
            }
        }
    }

    fn flat_len(&self) -> usize {
        let mut s = String::new();
        self.write_flat(&mut s);
        s.len()
    }

    /// Lists without grandchildren that fit the width stay on one line.
    fn is_inline(&self, indent: usize) -> bool {
        let SExpr::List(items) = self else {
            return true;
        };
        let nested = items
            .iter()
            .any(|i| matches!(i, SExpr::List(sub) if sub.iter().any(|s| matches!(s, SExpr::List(_)))));
        !nested && indent + self.flat_len() <= INLINE_WIDTH
    }

    fn write_block(&self, out: &mut String, indent: usize) {
        let SExpr::List(items) = self else {
            self.write_flat(out);
            return;
        };
        out.push('(');
        let head = items
            .iter()
            .take_while(|i| !matches!(i, SExpr::List(_)))
            .count();
        for (i, item) in items[..head].iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            item.write_flat(out);
        }
        for item in &items[head..] {
            out.push('\n');
            out.push_str(&" ".repeat(indent + 1));
            if item.is_inline(indent + 1) {
                item.write_flat(out);
            } else {
                item.write_block(out, indent + 1);
            }
        }
        out.push('\n');
        out.push_str(&" ".repeat(indent));
        out.push(')');
    }
}

/// Fixed three-decimal number with trailing zeros trimmed, keeping one decimal.
pub fn format_number(v: f64) -> String {
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0');
    let s = if s.ends_with('.') {
        format!("{s}0")
    } else {
        s.to_string()
    };
    if s == "-0.0" {
        "0.0".to_string()
    } else {
        s
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn parse_string(&mut self) -> String {
        // Skip opening quote
        self.pos += 1;
        let mut bytes = Vec::new();
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'n') => bytes.push(b'\n'),
                        Some(c) => bytes.push(c),
                        None => break,
                    }
                    self.pos += 1;
                }
                c => {
                    bytes.push(c);
                    self.pos += 1;
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn parse_symbol(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' | b'(' | b')' | b'"' => break,
                _ => self.pos += 1,
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn parse_sexpr(&mut self) -> Option<SExpr> {
        self.skip_whitespace();
        match self.peek()? {
            b'(' => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    match self.peek() {
                        Some(b')') => {
                            self.pos += 1;
                            break;
                        }
                        None => break,
                        _ => {
                            if let Some(expr) = self.parse_sexpr() {
                                items.push(expr);
                            }
                        }
                    }
                }
                Some(SExpr::List(items))
            }
            b'"' => Some(SExpr::Str(self.parse_string())),
            b')' => None,
            _ => Some(SExpr::Atom(self.parse_symbol())),
        }
    }
}

/// Parse an S-expression from bytes.
pub fn parse(input: &[u8]) -> Result<SExpr, String> {
    let mut parser = Parser::new(input);
    parser
        .parse_sexpr()
        .ok_or_else(|| "empty input".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_list() {
        let result = parse(b"(hello world)").unwrap();
        assert_eq!(result.tag(), Some("hello"));
        assert_eq!(result.atom_at(0), Some("world"));
    }

    #[test]
    fn test_nested() {
        let result = parse(b"(a (b 1) (c 2))").unwrap();
        assert_eq!(result.tag(), Some("a"));
        assert_eq!(result.value("b"), Some("1"));
        assert_eq!(result.value("c"), Some("2"));
    }

    #[test]
    fn test_string_with_escapes() {
        let result = parse(br#"(value "say \"hi\" \\ ok")"#).unwrap();
        assert_eq!(result.atom_at(0), Some(r#"say "hi" \ ok"#));
        assert!(matches!(result.children()[0], SExpr::Str(_)));
    }

    #[test]
    fn test_find_returns_first_match() {
        let result = parse(b"(root (pad 1 \"A\") (pad 2 \"B\") (name \"x\"))").unwrap();
        assert_eq!(result.find("pad").and_then(|p| p.atom_at(0)), Some("1"));
        assert_eq!(result.value("name"), Some("x"));
        assert!(result.find("hole").is_none());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.54), "2.54");
        assert_eq!(format_number(0.0), "0.0");
        assert_eq!(format_number(-0.0), "0.0");
        assert_eq!(format_number(-0.0001), "0.0");
        assert_eq!(format_number(-1.27), "-1.27");
        assert_eq!(format_number(10.0), "10.0");
        assert_eq!(format_number(1.23456), "1.235");
    }

    #[test]
    fn test_document_layout() {
        let doc = SExpr::list(
            "librepcb_symbol",
            [
                SExpr::atom("1234"),
                SExpr::list("name", [SExpr::string("A \"B\"")]),
                SExpr::list(
                    "polygon",
                    [
                        SExpr::atom("5678"),
                        SExpr::list("layer", [SExpr::atom("sym_outlines")]),
                        SExpr::list(
                            "vertex",
                            [SExpr::list("position", [SExpr::atom("0.0"), SExpr::atom("1.0")])],
                        ),
                    ],
                ),
            ],
        );
        let text = doc.to_document();
        assert_eq!(
            text,
            "(librepcb_symbol 1234\n (name \"A \\\"B\\\"\")\n (polygon 5678\n  (layer sym_outlines)\n  (vertex (position 0.0 1.0))\n )\n)\n"
        );
    }

    #[test]
    fn test_write_then_read() {
        let doc = SExpr::list(
            "librepcb_device",
            [
                SExpr::atom("abcd"),
                SExpr::list("name", [SExpr::string("x\ny")]),
            ],
        );
        let back = parse(doc.to_document().as_bytes()).unwrap();
        assert_eq!(back, doc);
    }
}
