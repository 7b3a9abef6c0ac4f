//! Indented source text builder

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct CodeWriter {
    text: String,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if !line.is_empty() {
            for _ in 0..self.depth {
                self.text.push_str(INDENT);
            }
            self.text.push_str(line);
        }
        self.text.push('\n');
    }

    pub fn blank(&mut self) {
        self.text.push('\n');
    }

    /// Write `header` and open a brace block
    pub fn open(&mut self, header: impl AsRef<str>) {
        let header = header.as_ref();
        if header.is_empty() {
            self.line("{");
        } else {
            self.line(format!("{} {{", header));
        }
        self.depth += 1;
    }

    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Close a block with custom text, e.g. `};`
    pub fn close_with(&mut self, closing: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(closing);
    }

    pub fn finish(self) -> String {
        self.text
    }
}
