//! Plain ASCII table renderer.
//!
//! ```text
//! +Github-----+---------------------+
//! | project   | problem(s)          |
//! +-----------+---------------------+
//! | dde-dock  | project not found   |
//! +-----------+---------------------+
//! | dde-api   | branch (x) not found|
//! |           | branch (y) not found|
//! +-----------+---------------------+
//! ```
//!
//! Cells may span several lines. The title is drawn into the top border when
//! it fits.

#[derive(Debug, Clone, Default)]
pub struct AsciiTable {
    pub title: Option<String>,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Draw a separator between body rows, not only under the header.
    pub inner_row_border: bool,
}

impl AsciiTable {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_inner_row_border(mut self) -> Self {
        self.inner_row_border = true;
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0)
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0; self.column_count()];
        for row in std::iter::once(&self.header).chain(self.rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                for line in cell_lines(cell) {
                    widths[i] = widths[i].max(line.chars().count());
                }
            }
        }
        widths
    }

    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let border = border_line(&widths);

        let mut out = String::new();
        out.push_str(&self.top_border(&border));
        out.push('\n');
        push_row(&mut out, &self.header, &widths);
        out.push_str(&border);
        out.push('\n');

        for (i, row) in self.rows.iter().enumerate() {
            push_row(&mut out, row, &widths);
            if self.inner_row_border && i + 1 < self.rows.len() {
                out.push_str(&border);
                out.push('\n');
            }
        }
        if !self.rows.is_empty() {
            out.push_str(&border);
            out.push('\n');
        }
        out
    }

    fn top_border(&self, border: &str) -> String {
        let Some(title) = self.title.as_deref() else {
            return border.to_string();
        };
        let border_len = border.chars().count();
        let title_len = title.chars().count();
        if title_len + 2 > border_len {
            return border.to_string();
        }
        let mut top = String::from("+");
        top.push_str(title);
        top.extend(border.chars().skip(1 + title_len));
        top
    }
}

/// Lines of a cell; a trailing newline does not add an empty line.
fn cell_lines(cell: &str) -> Vec<&str> {
    let lines: Vec<&str> = cell.lines().collect();
    if lines.is_empty() {
        vec![""]
    } else {
        lines
    }
}

fn border_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.push_str(&"-".repeat(w + 2));
        line.push('+');
    }
    line
}

fn push_row(out: &mut String, row: &[String], widths: &[usize]) {
    let cells: Vec<Vec<&str>> = (0..widths.len())
        .map(|i| row.get(i).map(|c| cell_lines(c)).unwrap_or_else(|| vec![""]))
        .collect();
    let height = cells.iter().map(Vec::len).max().unwrap_or(1);

    for line_no in 0..height {
        out.push('|');
        for (col, width) in widths.iter().enumerate() {
            let text = cells[col].get(line_no).copied().unwrap_or("");
            let pad = width - text.chars().count();
            out.push(' ');
            out.push_str(text);
            out.push_str(&" ".repeat(pad));
            out.push_str(" |");
        }
        out.push('\n');
    }
}
